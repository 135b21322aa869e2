//! # Amalgam
//!
//! A fluent, long-poll driven bot framework for VK communities.
//!
//! ## Overview
//!
//! Amalgam turns a community's Bots Long Poll stream into handler
//! invocations. Registration reads like a routing table: regex-triggered
//! text commands, sticker commands, one handler per attachment kind and
//! per chat service action, plus per-category fallbacks. The runtime
//! recovers expired sessions, isolates handler failures per event and
//! shuts down on a cancellation token.
//!
//! ```text
//! ┌────────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐
//! │ Long poll  │────▶│ GroupBot │────▶│ Commands │────▶│ handlers │
//! │ (client)   │     │ (loop)   │     │ (router) │     │ (async)  │
//! └────────────┘     └──────────┘     └──────────┘     └──────────┘
//! ```
//!
//! - **GroupClient**: the transport seam; sessions, batches, sending
//! - **GroupBot**: the poll loop with its error boundaries
//! - **Commands**: classification and handler resolution
//! - **Handlers**: user async functions, or [`answer`]/[`answer_one_of`]
//!   sugar
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amalgam::prelude::*;
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
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     LoggingBuilder::new().init();
//!
//!     let bot = GroupBot::new(client);
//!     bot.configure(LongPollConfig::load()?)?;
//!     bot.commands().on_text("^ping$", answer("pong"))?;
//!     bot.commands().on_text("^echo ", echo)?;
//!
//!     bot.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub use amalgam_core as core;
pub use amalgam_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use amalgam::prelude::*;
/// ```
pub mod prelude {
    // Runtime - entry point and configuration
    pub use amalgam_runtime::{BotError, GroupBot, LoggingBuilder, LongPollConfig};

    // Registration surface
    pub use amalgam_core::{Commands, Pattern, StickerTrigger, answer, answer_one_of};

    // Types handlers work with
    pub use amalgam_core::{
        BoxedClient, ClientError, DispatchError, EventBatch, GroupClient, Message, PollSession,
    };

    // Shutdown signalling, re-exported so bots need no direct tokio-util dep
    pub use tokio_util::sync::CancellationToken;
}
