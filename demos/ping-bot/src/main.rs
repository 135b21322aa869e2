//! Ping Bot Demo
//!
//! A self-contained tour of the Amalgam registration surface. Instead of a
//! real community token it uses a replay client that serves a few canned
//! long poll batches, then holds the poll open until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ping-bot
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use amalgam::core::{Attachment, ChatAction, GroupEvent, MessageEnvelope, Sticker};
use amalgam::prelude::*;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info};

// ============================================================================
// Replay client
// ============================================================================

/// Serves scripted batches, then pends like a quiet long poll server.
struct ReplayClient {
    batches: Mutex<VecDeque<EventBatch>>,
}

impl ReplayClient {
    fn new(batches: Vec<EventBatch>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl GroupClient for ReplayClient {
    async fn acquire_session(&self, group_id: u64) -> Result<PollSession, ClientError> {
        info!(group_id, "Replay session started");
        Ok(PollSession {
            server: "https://replay.invalid".to_string(),
            key: "replay-key".to_string(),
            ts: "1".to_string(),
        })
    }

    async fn fetch_batch(&self, session: &PollSession, _wait: u32) -> Result<EventBatch, ClientError> {
        let next = self.batches.lock().pop_front();
        match next {
            Some(batch) => Ok(batch),
            // Out of material: hold the poll open forever, like a silent group
            None => {
                info!(ts = %session.ts, "No more canned batches, Ctrl-C to stop");
                futures::future::pending().await
            }
        }
    }

    async fn send_text(&self, peer_id: i64, text: &str, _dedupe_id: i64) -> Result<(), ClientError> {
        info!(peer_id, "-> {text}");
        Ok(())
    }
}

// ============================================================================
// Canned events
// ============================================================================

fn text_event(peer_id: i64, text: &str) -> GroupEvent {
    GroupEvent::MessageNew {
        object: MessageEnvelope {
            message: Message {
                peer_id,
                from_id: 101,
                text: text.to_string(),
                ..Message::default()
            },
        },
    }
}

fn sticker_event(peer_id: i64, sticker_id: i64) -> GroupEvent {
    GroupEvent::MessageNew {
        object: MessageEnvelope {
            message: Message {
                peer_id,
                from_id: 101,
                attachments: vec![Attachment::Sticker {
                    sticker: Sticker {
                        product_id: 279,
                        sticker_id,
                    },
                }],
                ..Message::default()
            },
        },
    }
}

fn invite_event(peer_id: i64, member_id: i64) -> GroupEvent {
    GroupEvent::MessageNew {
        object: MessageEnvelope {
            message: Message {
                peer_id,
                action: Some(ChatAction {
                    kind: "chat_invite_user".to_string(),
                    member_id: Some(member_id),
                    ..ChatAction::default()
                }),
                ..Message::default()
            },
        },
    }
}

fn canned_batches() -> Vec<EventBatch> {
    let chat = 2_000_000_001;
    vec![
        EventBatch {
            updates: vec![
                text_event(chat, "/ping"),
                text_event(chat, "/echo hello there"),
                sticker_event(chat, 9046),
            ],
            ts: "2".to_string(),
        },
        EventBatch {
            updates: vec![
                text_event(chat, "/flip"),
                invite_event(chat, 202),
                text_event(chat, "what does this bot do?"),
            ],
            ts: "3".to_string(),
        },
    ]
}

// ============================================================================
// Handlers
// ============================================================================

/// Echoes everything after the `/echo ` prefix.
async fn echo(
    client: BoxedClient,
    message: Arc<Message>,
    _token: CancellationToken,
) -> Result<()> {
    if let Some(content) = message.text.strip_prefix("/echo ") {
        client
            .send_text(message.peer_id, content, rand::random())
            .await?;
    }
    Ok(())
}

/// Greets a freshly invited member.
async fn greet(
    client: BoxedClient,
    message: Arc<Message>,
    _token: CancellationToken,
) -> Result<()> {
    let member_id = message.action.as_ref().and_then(|action| action.member_id);
    let text = match member_id {
        Some(member_id) => format!("Welcome, @id{member_id}!"),
        None => "Welcome!".to_string(),
    };
    client
        .send_text(message.peer_id, &text, rand::random())
        .await?;
    Ok(())
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    LoggingBuilder::new()
        .directive("ping_bot=debug")
        .init();

    let bot = GroupBot::new(ReplayClient::new(canned_batches()));

    // amalgam.toml / AMALGAM_* if present, canned group otherwise
    let config = LongPollConfig::load().unwrap_or_else(|_| LongPollConfig::new(187_853_946));
    bot.configure(config)?;

    let commands = bot.commands();
    commands.on_text("^/ping$", answer("pong"))?;
    commands.on_text("^/echo ", echo)?;
    commands.on_text("^/flip$", answer_one_of(["heads", "tails"]))?;
    commands.on_text_fallback(answer("Try /ping, /echo or /flip"))?;
    commands.on_sticker(9046, answer("Spotty!"))?;
    commands.on_chat_invite_user(greet)?;

    bot.on_dispatch_error(
        |_client: BoxedClient,
         message: Arc<Message>,
         error: DispatchError,
         _token: CancellationToken| async move {
            error!(peer_id = message.peer_id, %error, "Handler failed");
        },
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        }
    });

    bot.run(shutdown).await?;
    Ok(())
}
