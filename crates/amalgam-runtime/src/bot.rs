//! Bot assembly and the long poll loop.
//!
//! [`GroupBot`] ties a [`GroupClient`] to a [`Commands`] table and drives
//! the Bots Long Poll cycle: acquire a session, fetch batches, dispatch
//! each event, advance the cursor, recover from expired sessions.
//!
//! # Error Boundaries
//!
//! Failures are handled at two scopes:
//!
//! - **event scope**: a classification or handler failure is routed to the
//!   dispatch error hook (or logged when none is set) and never affects the
//!   rest of the batch or the loop.
//! - **loop scope**: transient fetch failures are routed to the client
//!   error hook and the loop continues; an expired session is re-acquired;
//!   only failed session acquisition, missing configuration and a
//!   pre-cancelled token end the loop with an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use amalgam_runtime::{GroupBot, LongPollConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let bot = GroupBot::new(client);
//! bot.configure(LongPollConfig::load()?)?;
//! bot.commands().on_text("^ping$", answer("pong"))?;
//!
//! let shutdown = CancellationToken::new();
//! bot.run(shutdown).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use amalgam_core::{
    BoxedClient, ClientError, Commands, DispatchError, GroupClient, GroupEvent, Message,
};

use crate::config::{ConfigResult, LongPollConfig};
use crate::error::{BotError, BotResult};

/// Hook invoked when an event's classification or handler fails.
///
/// Receives the client, the offending message, the failure and the loop's
/// cancellation token.
pub type DispatchErrorHook = Arc<
    dyn Fn(BoxedClient, Arc<Message>, DispatchError, CancellationToken) -> BoxFuture<'static, ()>
        + Send
        + Sync,
>;

/// Hook invoked when a batch fetch fails, including session expiry.
pub type ClientErrorHook =
    Arc<dyn Fn(ClientError, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

/// A group bot: one client, one command table, one poll loop.
///
/// All methods take `&self`; the bot is usually shared in an `Arc` between
/// the task driving [`run`](GroupBot::run) and code that keeps registering
/// commands.
pub struct GroupBot {
    client: BoxedClient,
    commands: Commands,
    config: RwLock<Option<LongPollConfig>>,
    on_dispatch_error: RwLock<Option<DispatchErrorHook>>,
    on_client_error: RwLock<Option<ClientErrorHook>>,
}

impl GroupBot {
    /// Creates a bot over a concrete client.
    pub fn new<C>(client: C) -> Self
    where
        C: GroupClient + 'static,
    {
        Self::with_client(Arc::new(client))
    }

    /// Creates a bot over an already shared client.
    pub fn with_client(client: BoxedClient) -> Self {
        Self {
            client,
            commands: Commands::new(),
            config: RwLock::new(None),
            on_dispatch_error: RwLock::new(None),
            on_client_error: RwLock::new(None),
        }
    }

    /// The command table, for registration.
    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    /// A shared handle to the underlying client.
    pub fn client(&self) -> BoxedClient {
        Arc::clone(&self.client)
    }

    /// Validates and stores the long poll configuration.
    ///
    /// Must be called before [`run`](GroupBot::run). Calling it again
    /// replaces the stored configuration; a loop already running keeps the
    /// settings it started with.
    pub fn configure(&self, config: LongPollConfig) -> ConfigResult<()> {
        config.validate()?;
        *self.config.write() = Some(config);
        Ok(())
    }

    /// Sets the hook for event-scoped failures.
    ///
    /// Without one, failures are logged at warn level and swallowed.
    pub fn on_dispatch_error<F, Fut>(&self, hook: F)
    where
        F: Fn(BoxedClient, Arc<Message>, DispatchError, CancellationToken) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.on_dispatch_error.write() = Some(Arc::new(move |client, message, error, token| {
            hook(client, message, error, token).boxed()
        }));
    }

    /// Sets the hook for batch fetch failures.
    pub fn on_client_error<F, Fut>(&self, hook: F)
    where
        F: Fn(ClientError, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.on_client_error.write() =
            Some(Arc::new(move |error, token| hook(error, token).boxed()));
    }

    /// Runs the long poll loop until `shutdown` is cancelled.
    ///
    /// Fails fast with [`BotError::NotConfigured`] when
    /// [`configure`](GroupBot::configure) was never called and with
    /// [`BotError::Cancelled`] when the token is already cancelled.
    /// Session acquisition failures, at startup or after an expiry, are
    /// fatal. Everything else keeps the loop alive: transient fetch
    /// failures and event-scoped failures are routed to their hooks, an
    /// expired session is re-acquired.
    ///
    /// Cancellation is observed between batches and during a held fetch;
    /// a running handler is not interrupted, it receives the token and is
    /// expected to check it around its own suspension points.
    pub async fn run(&self, shutdown: CancellationToken) -> BotResult<()> {
        let config = self.config.read().clone().ok_or(BotError::NotConfigured)?;
        if shutdown.is_cancelled() {
            return Err(BotError::Cancelled);
        }

        info!(
            group_id = config.group_id,
            wait = config.wait,
            "Starting long poll"
        );
        let mut session = self.client.acquire_session(config.group_id).await?;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Long poll stopped");
                    return Ok(());
                }
                fetched = self.client.fetch_batch(&session, config.wait) => fetched,
            };

            match fetched {
                Ok(batch) => {
                    self.drain_batch(batch.updates, &shutdown).await;
                    // Cursor advances only once the whole batch is done.
                    session.ts = batch.ts;
                }
                Err(error @ ClientError::SessionExpired) => {
                    warn!("Long poll session expired, reacquiring");
                    self.notify_client_error(error, &shutdown).await;
                    session = self.client.acquire_session(config.group_id).await?;
                }
                Err(error) => {
                    warn!(error = %error, "Long poll fetch failed, continuing");
                    self.notify_client_error(error, &shutdown).await;
                }
            }
        }
    }

    /// Dispatches every message event in a batch, in order, isolating
    /// failures per event.
    async fn drain_batch(&self, updates: Vec<GroupEvent>, shutdown: &CancellationToken) {
        for update in updates {
            let GroupEvent::MessageNew { object } = update else {
                trace!("Skipping non-message update");
                continue;
            };
            let message = Arc::new(object.message);

            let outcome = self
                .commands
                .dispatch(self.client(), Arc::clone(&message), shutdown.clone())
                .await;
            if let Err(error) = outcome {
                self.notify_dispatch_error(message, error, shutdown).await;
            }
        }
    }

    async fn notify_dispatch_error(
        &self,
        message: Arc<Message>,
        error: DispatchError,
        shutdown: &CancellationToken,
    ) {
        let hook = self.on_dispatch_error.read().clone();
        match hook {
            Some(hook) => hook(self.client(), message, error, shutdown.clone()).await,
            None => warn!(
                peer_id = message.peer_id,
                error = %error,
                "Event dispatch failed"
            ),
        }
    }

    async fn notify_client_error(&self, error: ClientError, shutdown: &CancellationToken) {
        let hook = self.on_client_error.read().clone();
        if let Some(hook) = hook {
            hook(error, shutdown.clone()).await;
        }
    }
}

impl fmt::Debug for GroupBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBot")
            .field("commands", &self.commands)
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use amalgam_core::{ClientResult, EventBatch, MessageEnvelope, PollSession, answer};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client fed from a script of fetch outcomes. Once the script runs
    /// out it cancels the stored token and pends forever, so tests never
    /// need a real long poll server or a timeout.
    struct ScriptedClient {
        acquisitions: AtomicUsize,
        acquire_script: Mutex<VecDeque<Option<ClientError>>>,
        fetches: Mutex<VecDeque<ClientResult<EventBatch>>>,
        fetched_ts: Mutex<Vec<String>>,
        sent: Mutex<Vec<(i64, String)>>,
        cancel_on_empty: Mutex<Option<CancellationToken>>,
    }

    impl ScriptedClient {
        fn with_script(
            fetches: Vec<ClientResult<EventBatch>>,
            shutdown: &CancellationToken,
        ) -> Arc<Self> {
            Arc::new(Self {
                acquisitions: AtomicUsize::new(0),
                acquire_script: Mutex::new(VecDeque::new()),
                fetches: Mutex::new(fetches.into()),
                fetched_ts: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                cancel_on_empty: Mutex::new(Some(shutdown.clone())),
            })
        }

        fn fail_acquire(self: Arc<Self>, outcomes: Vec<Option<ClientError>>) -> Arc<Self> {
            *self.acquire_script.lock() = outcomes.into();
            self
        }
    }

    #[async_trait]
    impl GroupClient for ScriptedClient {
        async fn acquire_session(&self, _group_id: u64) -> ClientResult<PollSession> {
            if let Some(Some(error)) = self.acquire_script.lock().pop_front() {
                return Err(error);
            }
            let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(PollSession {
                server: format!("https://lp.example/{n}"),
                key: format!("key-{n}"),
                ts: format!("{n}0"),
            })
        }

        async fn fetch_batch(&self, session: &PollSession, _wait: u32) -> ClientResult<EventBatch> {
            self.fetched_ts.lock().push(session.ts.clone());
            let next = self.fetches.lock().pop_front();
            match next {
                Some(outcome) => outcome,
                None => {
                    if let Some(token) = self.cancel_on_empty.lock().take() {
                        token.cancel();
                    }
                    futures::future::pending().await
                }
            }
        }

        async fn send_text(&self, peer_id: i64, text: &str, _dedupe_id: i64) -> ClientResult<()> {
            self.sent.lock().push((peer_id, text.to_string()));
            Ok(())
        }
    }

    fn text_event(peer_id: i64, text: &str) -> GroupEvent {
        GroupEvent::MessageNew {
            object: MessageEnvelope {
                message: Message {
                    peer_id,
                    text: text.to_string(),
                    ..Message::default()
                },
            },
        }
    }

    fn batch(ts: &str, updates: Vec<GroupEvent>) -> ClientResult<EventBatch> {
        Ok(EventBatch {
            updates,
            ts: ts.to_string(),
        })
    }

    fn configured_bot(client: Arc<ScriptedClient>) -> GroupBot {
        let bot = GroupBot::with_client(client);
        bot.configure(LongPollConfig::new(187_853_946)).unwrap();
        bot
    }

    async fn failing(
        _client: BoxedClient,
        _message: Arc<Message>,
        _token: CancellationToken,
    ) -> anyhow::Result<()> {
        anyhow::bail!("handler exploded")
    }

    #[tokio::test]
    async fn test_run_unconfigured_fails() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(vec![], &shutdown);
        let bot = GroupBot::with_client(client);

        let result = bot.run(shutdown).await;
        assert!(matches!(result, Err(BotError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_run_pre_cancelled_fails() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(vec![], &shutdown);
        let bot = configured_bot(Arc::clone(&client));

        shutdown.cancel();
        let result = bot.run(shutdown).await;

        assert!(matches!(result, Err(BotError::Cancelled)));
        assert_eq!(client.acquisitions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batches_dispatch_and_advance_cursor() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![
                batch("42", vec![text_event(1, "ping")]),
                batch("43", vec![text_event(2, "ping")]),
            ],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));
        bot.commands().on_text("^ping$", answer("pong")).unwrap();

        bot.run(shutdown).await.unwrap();

        // Each fetch used the cursor returned with the previous batch.
        assert_eq!(client.fetched_ts.lock().as_slice(), &["10", "42", "43"]);
        assert_eq!(
            client.sent.lock().as_slice(),
            &[(1, "pong".to_string()), (2, "pong".to_string())]
        );
    }

    #[tokio::test]
    async fn test_cancel_during_held_fetch_returns_ok() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(vec![], &shutdown);
        let bot = configured_bot(Arc::clone(&client));

        bot.run(shutdown).await.unwrap();
        assert_eq!(client.fetched_ts.lock().as_slice(), &["10"]);
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_abort_batch() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![batch("42", vec![text_event(1, "boom"), text_event(1, "ping")])],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));
        bot.commands().on_text("^boom$", failing).unwrap();
        bot.commands().on_text("^ping$", answer("pong")).unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        bot.on_dispatch_error(
            move |_client: BoxedClient,
                  message: Arc<Message>,
                  error: DispatchError,
                  _token: CancellationToken| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push((message.peer_id, error.to_string()));
                }
            },
        );

        bot.run(shutdown).await.unwrap();

        assert_eq!(client.sent.lock().as_slice(), &[(1, "pong".to_string())]);
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_unset_dispatch_hook_swallows_failures() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![batch("42", vec![text_event(1, "boom"), text_event(1, "ping")])],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));
        bot.commands().on_text("^boom$", failing).unwrap();
        bot.commands().on_text("^ping$", answer("pong")).unwrap();

        bot.run(shutdown).await.unwrap();
        assert_eq!(client.sent.lock().as_slice(), &[(1, "pong".to_string())]);
    }

    #[tokio::test]
    async fn test_expired_session_is_reacquired() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![
                Err(ClientError::SessionExpired),
                batch("77", vec![text_event(1, "ping")]),
            ],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));
        bot.commands().on_text("^ping$", answer("pong")).unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        bot.on_client_error(move |error: ClientError, _token: CancellationToken| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(error);
            }
        });

        bot.run(shutdown).await.unwrap();

        // A fresh session: second acquisition, fetches see the new cursor.
        assert_eq!(client.acquisitions.load(Ordering::SeqCst), 2);
        assert_eq!(client.fetched_ts.lock().as_slice(), &["10", "20", "77"]);
        assert_eq!(client.sent.lock().as_slice(), &[(1, "pong".to_string())]);
        assert!(matches!(
            errors.lock().as_slice(),
            [ClientError::SessionExpired]
        ));
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_continues_with_same_session() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![
                Err(ClientError::Transport("connection reset".into())),
                batch("42", vec![]),
            ],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));

        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        bot.on_client_error(move |error: ClientError, _token: CancellationToken| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(error);
            }
        });

        bot.run(shutdown).await.unwrap();

        assert_eq!(client.acquisitions.load(Ordering::SeqCst), 1);
        assert_eq!(client.fetched_ts.lock().as_slice(), &["10", "10", "42"]);
        assert!(matches!(
            errors.lock().as_slice(),
            [ClientError::Transport(_)]
        ));
    }

    #[tokio::test]
    async fn test_non_message_updates_are_skipped() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(
            vec![batch("42", vec![GroupEvent::Other, text_event(1, "hello")])],
            &shutdown,
        );
        let bot = configured_bot(Arc::clone(&client));
        bot.commands().on_text_fallback(answer("hm?")).unwrap();

        bot.run(shutdown).await.unwrap();

        // Only the message event reached the fallback.
        assert_eq!(client.sent.lock().as_slice(), &[(1, "hm?".to_string())]);
    }

    #[tokio::test]
    async fn test_acquire_failure_is_fatal() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(vec![], &shutdown).fail_acquire(vec![Some(
            ClientError::Api {
                code: 5,
                message: "auth failed".into(),
            },
        )]);
        let bot = configured_bot(Arc::clone(&client));

        let result = bot.run(shutdown).await;
        assert!(matches!(
            result,
            Err(BotError::Client(ClientError::Api { code: 5, .. }))
        ));
    }

    #[tokio::test]
    async fn test_reacquire_failure_is_fatal() {
        let shutdown = CancellationToken::new();
        let client = ScriptedClient::with_script(vec![Err(ClientError::SessionExpired)], &shutdown)
            .fail_acquire(vec![
                None,
                Some(ClientError::Transport("still down".into())),
            ]);
        let bot = configured_bot(Arc::clone(&client));

        let result = bot.run(shutdown).await;
        assert!(matches!(
            result,
            Err(BotError::Client(ClientError::Transport(_)))
        ));
    }
}
