//! Runtime error types.

use thiserror::Error;

use amalgam_core::ClientError;

/// Errors that end a poll loop before or instead of a clean shutdown.
///
/// Event-scoped failures never surface here; they are routed to the bot's
/// dispatch error hook. See [`GroupBot::run`](crate::bot::GroupBot::run).
#[derive(Error, Debug)]
pub enum BotError {
    /// [`run`](crate::bot::GroupBot::run) was called before
    /// [`configure`](crate::bot::GroupBot::configure).
    #[error("long poll is not configured, call configure() first")]
    NotConfigured,

    /// The shutdown token was already cancelled when the loop was started.
    #[error("cancelled before polling started")]
    Cancelled,

    /// Session acquisition failed, either at startup or after an expiry.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for bot operations.
pub type BotResult<T> = Result<T, BotError>;
