//! # Amalgam Runtime
//!
//! The long poll runtime for the Amalgam bot framework.
//!
//! This crate provides:
//! - Bot assembly and the poll loop (`GroupBot`)
//! - Long poll configuration (`LongPollConfig`, figment-backed)
//! - Logging setup (`LoggingBuilder`)
//!
//! # Example
//!
//! ```rust,ignore
//! use amalgam_runtime::{GroupBot, LoggingBuilder, LongPollConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     LoggingBuilder::new().init();
//!
//!     let bot = GroupBot::new(client);
//!     bot.configure(LongPollConfig::load()?)?;
//!     bot.commands().on_text("^ping$", answer("pong"))?;
//!
//!     let shutdown = CancellationToken::new();
//!     tokio::spawn({
//!         let shutdown = shutdown.clone();
//!         async move {
//!             let _ = tokio::signal::ctrl_c().await;
//!             shutdown.cancel();
//!         }
//!     });
//!
//!     bot.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use bot::{ClientErrorHook, DispatchErrorHook, GroupBot};
pub use config::{ConfigError, ConfigResult, DEFAULT_WAIT, LongPollConfig, MAX_WAIT};
pub use error::{BotError, BotResult};
pub use logging::LoggingBuilder;

// Re-export tracing for use by bot binaries
pub use tracing;
pub use tracing_subscriber;
