//! # Amalgam Core
//!
//! The routing engine of the Amalgam bot framework.
//!
//! This crate provides the building blocks for turning raw group events into
//! handler invocations: the wire model, the event classifier, and the
//! command routing table.
//!
//! ## Routing Model
//!
//! Every incoming message is classified into exactly one [`EventKind`], in a
//! fixed precedence order:
//!
//! 1. a chat service action (invites, kicks, pins, ...)
//! 2. a forward
//! 3. a reply
//! 4. an attached location
//! 5. the first recognized attachment (sticker, photo, voice note, video,
//!    audio, document, poll)
//! 6. a plain text message otherwise
//!
//! [`Commands`] then resolves at most one handler for that kind:
//!
//! ```text
//! ┌─────────────┐     ┌──────────┐     ┌──────────┐     ┌─────────┐
//! │ GroupEvent  │────▶│ classify │────▶│ Commands │────▶│ handler │
//! │ (long poll) │     │          │     │ (lookup) │     │ (async) │
//! └─────────────┘     └──────────┘     └──────────┘     └─────────┘
//! ```
//!
//! Text, reply and forward commands are regex triggers, optionally scoped to
//! one peer; sticker commands are keyed by sticker id. Everything else is a
//! single handler slot per kind. See [`Commands`] for the precedence rules
//! within a category.
//!
//! ## Example
//!
//! ```rust,ignore
//! use amalgam_core::{BoxedClient, Commands, Message, answer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn echo(
//!     client: BoxedClient,
//!     message: Arc<Message>,
//!     _token: CancellationToken,
//! ) -> anyhow::Result<()> {
//!     client
//!         .send_text(message.peer_id, &message.text, rand::random())
//!         .await?;
//!     Ok(())
//! }
//!
//! let commands = Commands::new();
//! commands.on_text("^ping$", answer("pong"))?;
//! commands.on_text("^echo", echo)?;
//! commands.on_sticker(9046, answer("nice sticker"))?;
//!
//! // Inside the poll loop, for each message:
//! commands.dispatch(client, message, token).await?;
//! ```

pub mod classify;
pub mod client;
pub mod commands;
pub mod error;
pub mod event;
pub mod handler;

// Re-export the wire model
pub use event::{
    Attachment, Audio, AudioMessage, ChatAction, Coordinates, Document, Geo, GroupEvent, Message,
    MessageEnvelope, Photo, Poll, Sticker, Video,
};

// Re-export classification
pub use classify::{EventKind, classify};

// Re-export the client seam
pub use client::{BoxedClient, ClientError, ClientResult, EventBatch, GroupClient, PollSession};

// Re-export routing
pub use commands::{Commands, Pattern, PatternOptions, StickerTrigger};
pub use handler::{Answer, EventHandler, FnMarker, IntoEventHandler, OneOf, answer, answer_one_of};

// Re-export errors
pub use error::{
    DispatchError, DispatchResult, RegistrationError, RegistrationResult, UnknownActionKind,
};
