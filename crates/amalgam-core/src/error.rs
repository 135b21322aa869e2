//! Error types for registration, classification and dispatch.

use thiserror::Error;

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while registering a command or handler.
///
/// Registration validates eagerly: a trigger that cannot ever match, or an
/// answer that cannot be sent, is rejected before it reaches a store.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The command pattern was empty or whitespace-only.
    #[error("command pattern must not be blank")]
    BlankPattern,

    /// The command pattern failed to compile.
    #[error("invalid command pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The compile error.
        source: regex::Error,
    },

    /// A peer scope must be a positive id.
    #[error("peer id must be positive, got {0}")]
    InvalidPeerId(i64),

    /// A sticker trigger must carry a positive id.
    #[error("sticker id must be positive, got {0}")]
    InvalidStickerId(i64),

    /// A fixed answer was empty or whitespace-only.
    #[error("answer text must not be blank")]
    BlankAnswer,

    /// The variant set for a random answer was empty.
    #[error("answer set must not be empty")]
    EmptyAnswerSet,
}

// =============================================================================
// Classification Errors
// =============================================================================

/// A service action kind this crate does not recognize.
///
/// Raised by classification; unknown actions are never downgraded to plain
/// messages.
#[derive(Debug, Clone, Error)]
#[error("unrecognized chat action kind `{kind}`")]
pub struct UnknownActionKind {
    /// The raw platform string.
    pub kind: String,
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Per-event dispatch failures.
///
/// These never tear down the poll loop; they are reported through the bot's
/// dispatch-error hook and the loop moves on to the next event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message could not be classified.
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionKind),

    /// The selected handler returned an error.
    #[error("handler failed: {0}")]
    Handler(anyhow::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
