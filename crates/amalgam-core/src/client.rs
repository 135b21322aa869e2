//! Transport capability consumed by the poll loop.
//!
//! [`GroupClient`] is the seam between this crate and the platform API.
//! Implementations talk HTTP (or anything else) and map wire responses to
//! the types here; the poll loop owns recovery and cursor bookkeeping.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::event::GroupEvent;

/// Credentials and cursor for one long-poll session.
#[derive(Debug, Clone, Deserialize)]
pub struct PollSession {
    /// Server URL to poll.
    pub server: String,
    /// Session key presented on every fetch.
    pub key: String,
    /// Opaque batch cursor.
    pub ts: String,
}

/// One fetched batch of updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBatch {
    /// Updates in arrival order. May be empty.
    #[serde(default)]
    pub updates: Vec<GroupEvent>,
    /// Cursor to resume from once this batch is processed.
    #[serde(default)]
    pub ts: String,
}

/// Errors surfaced by a [`GroupClient`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The session key is no longer valid.
    ///
    /// The poll loop reacts by acquiring a fresh session; implementations
    /// must map the platform's key-expiry signal to this variant for that
    /// recovery to happen.
    #[error("long poll session key expired")]
    SessionExpired,

    /// The platform rejected the call.
    #[error("api error {code}: {message}")]
    Api {
        /// Platform error code.
        code: i64,
        /// Platform error description.
        message: String,
    },

    /// Connection-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Capability trait for the platform transport.
#[async_trait]
pub trait GroupClient: Send + Sync {
    /// Opens a long-poll session for the community.
    async fn acquire_session(&self, group_id: u64) -> ClientResult<PollSession>;

    /// Fetches the next batch of updates.
    ///
    /// The server may hold the request up to `wait` seconds before
    /// answering with an empty batch.
    async fn fetch_batch(&self, session: &PollSession, wait: u32) -> ClientResult<EventBatch>;

    /// Sends a plain text message to a peer.
    ///
    /// `dedupe_id` guards against double sends on transport retries; callers
    /// pass a fresh random value per logical send.
    async fn send_text(&self, peer_id: i64, text: &str, dedupe_id: i64) -> ClientResult<()>;
}

/// A shared client trait object.
pub type BoxedClient = Arc<dyn GroupClient>;
