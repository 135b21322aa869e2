//! Command registration and dispatch.
//!
//! [`Commands`] is the routing table of a bot: per-category stores of
//! handlers plus the logic that picks exactly one handler per incoming
//! message. Registration is lock-and-insert behind [`parking_lot`] locks,
//! so handlers may be added at any time, including while the poll loop is
//! running.
//!
//! # Stores
//!
//! - text, reply and forward commands are keyed by `(peer scope, pattern,
//!   flags)`; the first registration for a key wins and repeating it is a
//!   silent no-op. Each of the three stores also carries one fallback slot.
//! - sticker commands are keyed by `(peer scope, sticker id)` with the same
//!   first-wins rule and their own fallback slot.
//! - every remaining category (photo, voice, ..., the chat service actions)
//!   is a single slot where the last registration wins.
//!
//! # Resolution
//!
//! Patterns match anywhere in the text, in the style of an unanchored regex
//! search; anchor with `^`/`$` for exact matches. A trigger scoped to the
//! message's peer always beats an unscoped one; within the same scope,
//! registration order decides. When no trigger matches, the category
//! fallback runs. When not even a fallback is registered the message is
//! dropped silently.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::classify::{EventKind, classify};
use crate::client::BoxedClient;
use crate::error::{
    DispatchError, DispatchResult, RegistrationError, RegistrationResult, UnknownActionKind,
};
use crate::event::Message;
use crate::handler::{EventHandler, IntoEventHandler};

// ============================================================================
// Triggers
// ============================================================================

/// Regex flags for a pattern trigger.
///
/// Part of the store key: the same pattern registered with different flags
/// is a different command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatternOptions {
    /// Match letters regardless of case.
    pub case_insensitive: bool,
    /// Let `^` and `$` match at line boundaries.
    pub multi_line: bool,
    /// Let `.` match `\n` too.
    pub dot_matches_new_line: bool,
}

/// A text trigger: a regex pattern with an optional peer scope and flags.
///
/// Converts from `&str`, `String` and `(peer_id, pattern)` tuples, so the
/// registration calls read naturally:
///
/// ```rust,ignore
/// commands.on_text("^ping$", answer("pong"))?;
/// commands.on_text((2_000_000_001, "^ping$"), answer("pong for this chat"))?;
/// commands.on_text(Pattern::new("^PING$").case_insensitive(), answer("pong"))?;
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    pattern: String,
    peer_id: Option<i64>,
    options: PatternOptions,
}

impl Pattern {
    /// Creates an unscoped trigger from a regex pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            peer_id: None,
            options: PatternOptions::default(),
        }
    }

    /// Restricts the trigger to one peer.
    pub fn in_peer(mut self, peer_id: i64) -> Self {
        self.peer_id = Some(peer_id);
        self
    }

    /// Enables case-insensitive matching.
    pub fn case_insensitive(mut self) -> Self {
        self.options.case_insensitive = true;
        self
    }

    /// Lets `^` and `$` match at line boundaries.
    pub fn multi_line(mut self) -> Self {
        self.options.multi_line = true;
        self
    }

    /// Lets `.` match newlines.
    pub fn dot_matches_new_line(mut self) -> Self {
        self.options.dot_matches_new_line = true;
        self
    }

    /// Validates the trigger and compiles its regex.
    fn compile(self) -> RegistrationResult<(PatternKey, Regex)> {
        if self.pattern.trim().is_empty() {
            return Err(RegistrationError::BlankPattern);
        }
        if let Some(peer_id) = self.peer_id
            && peer_id <= 0
        {
            return Err(RegistrationError::InvalidPeerId(peer_id));
        }
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.options.case_insensitive)
            .multi_line(self.options.multi_line)
            .dot_matches_new_line(self.options.dot_matches_new_line)
            .build()
            .map_err(|source| RegistrationError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })?;
        let key = PatternKey {
            peer_id: self.peer_id,
            pattern: self.pattern,
            options: self.options,
        };
        Ok((key, regex))
    }
}

impl From<&str> for Pattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for Pattern {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

impl From<(i64, &str)> for Pattern {
    fn from((peer_id, pattern): (i64, &str)) -> Self {
        Self::new(pattern).in_peer(peer_id)
    }
}

impl From<(i64, String)> for Pattern {
    fn from((peer_id, pattern): (i64, String)) -> Self {
        Self::new(pattern).in_peer(peer_id)
    }
}

/// A sticker trigger: a sticker id with an optional peer scope.
#[derive(Debug, Clone, Copy)]
pub struct StickerTrigger {
    sticker_id: i64,
    peer_id: Option<i64>,
}

impl StickerTrigger {
    /// Creates an unscoped trigger for one sticker.
    pub fn new(sticker_id: i64) -> Self {
        Self {
            sticker_id,
            peer_id: None,
        }
    }

    /// Restricts the trigger to one peer.
    pub fn in_peer(mut self, peer_id: i64) -> Self {
        self.peer_id = Some(peer_id);
        self
    }

    fn validate(self) -> RegistrationResult<StickerKey> {
        if self.sticker_id <= 0 {
            return Err(RegistrationError::InvalidStickerId(self.sticker_id));
        }
        if let Some(peer_id) = self.peer_id
            && peer_id <= 0
        {
            return Err(RegistrationError::InvalidPeerId(peer_id));
        }
        Ok(StickerKey {
            peer_id: self.peer_id,
            sticker_id: self.sticker_id,
        })
    }
}

impl From<i64> for StickerTrigger {
    fn from(sticker_id: i64) -> Self {
        Self::new(sticker_id)
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternKey {
    peer_id: Option<i64>,
    pattern: String,
    options: PatternOptions,
}

#[derive(Clone)]
struct PatternCommand {
    regex: Regex,
    handler: EventHandler,
}

/// Pattern-keyed commands plus a fallback slot.
#[derive(Default)]
struct PatternStore {
    commands: RwLock<Vec<(PatternKey, PatternCommand)>>,
    fallback: HandlerSlot,
}

impl PatternStore {
    fn register<H, M>(&self, trigger: Pattern, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        let (key, regex) = trigger.compile()?;
        let handler = action.into_event_handler()?;
        let mut commands = self.commands.write();
        // First registration for a key wins.
        if !commands.iter().any(|(existing, _)| *existing == key) {
            commands.push((key, PatternCommand { regex, handler }));
        }
        Ok(())
    }

    /// Scoped triggers are tried first, each group in registration order.
    fn resolve(&self, peer_id: i64, text: &str) -> Option<EventHandler> {
        let commands = self.commands.read();
        commands
            .iter()
            .filter(|(key, _)| key.peer_id == Some(peer_id))
            .chain(commands.iter().filter(|(key, _)| key.peer_id.is_none()))
            .find(|(_, command)| command.regex.is_match(text))
            .map(|(_, command)| command.handler.clone())
    }

    fn len(&self) -> usize {
        self.commands.read().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StickerKey {
    peer_id: Option<i64>,
    sticker_id: i64,
}

/// Sticker-keyed commands plus a fallback slot.
#[derive(Default)]
struct StickerStore {
    commands: RwLock<Vec<(StickerKey, EventHandler)>>,
    fallback: HandlerSlot,
}

impl StickerStore {
    fn register<H, M>(&self, trigger: StickerTrigger, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        let key = trigger.validate()?;
        let handler = action.into_event_handler()?;
        let mut commands = self.commands.write();
        if !commands.iter().any(|(existing, _)| *existing == key) {
            commands.push((key, handler));
        }
        Ok(())
    }

    fn resolve(&self, peer_id: i64, sticker_id: i64) -> Option<EventHandler> {
        let commands = self.commands.read();
        commands
            .iter()
            .filter(|(key, _)| key.peer_id == Some(peer_id))
            .chain(commands.iter().filter(|(key, _)| key.peer_id.is_none()))
            .find(|(key, _)| key.sticker_id == sticker_id)
            .map(|(_, handler)| handler.clone())
    }

    fn len(&self) -> usize {
        self.commands.read().len()
    }
}

/// Single-handler slot; setting it again replaces the previous handler.
#[derive(Default)]
struct HandlerSlot {
    handler: RwLock<Option<EventHandler>>,
}

impl HandlerSlot {
    fn set<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        *self.handler.write() = Some(action.into_event_handler()?);
        Ok(())
    }

    fn get(&self) -> Option<EventHandler> {
        self.handler.read().clone()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// The command routing table of a bot.
///
/// Thread-safe behind the scenes: registration takes `&self` and may race
/// the running poll loop. Every event sees the table as of its own lookup.
#[derive(Default)]
pub struct Commands {
    text: PatternStore,
    reply: PatternStore,
    forward: PatternStore,
    sticker: StickerStore,
    photo: HandlerSlot,
    voice: HandlerSlot,
    video: HandlerSlot,
    audio: HandlerSlot,
    document: HandlerSlot,
    poll: HandlerSlot,
    geo: HandlerSlot,
    chat_invite_user: HandlerSlot,
    chat_kick_user: HandlerSlot,
    chat_photo_remove: HandlerSlot,
    chat_photo_update: HandlerSlot,
    chat_pin_message: HandlerSlot,
    chat_title_update: HandlerSlot,
    chat_unpin_message: HandlerSlot,
    chat_invite_user_by_link: HandlerSlot,
}

impl Commands {
    /// Creates an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Pattern commands
    // ------------------------------------------------------------------

    /// Registers a text command.
    ///
    /// The first registration for a `(peer scope, pattern, flags)` key wins;
    /// registering the same key again is a silent no-op.
    pub fn on_text<P, H, M>(&self, trigger: P, action: H) -> RegistrationResult<()>
    where
        P: Into<Pattern>,
        H: IntoEventHandler<M>,
    {
        self.text.register(trigger.into(), action)
    }

    /// Sets the fallback for text messages no command matched.
    pub fn on_text_fallback<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.text.fallback.set(action)
    }

    /// Registers a command for replies, matched against the new message's
    /// text rather than the quoted one.
    pub fn on_reply<P, H, M>(&self, trigger: P, action: H) -> RegistrationResult<()>
    where
        P: Into<Pattern>,
        H: IntoEventHandler<M>,
    {
        self.reply.register(trigger.into(), action)
    }

    /// Sets the fallback for replies no command matched.
    pub fn on_reply_fallback<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.reply.fallback.set(action)
    }

    /// Registers a command for forwards, matched against the carrying
    /// message's own text.
    pub fn on_forward<P, H, M>(&self, trigger: P, action: H) -> RegistrationResult<()>
    where
        P: Into<Pattern>,
        H: IntoEventHandler<M>,
    {
        self.forward.register(trigger.into(), action)
    }

    /// Sets the fallback for forwards no command matched.
    pub fn on_forward_fallback<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.forward.fallback.set(action)
    }

    // ------------------------------------------------------------------
    // Sticker commands
    // ------------------------------------------------------------------

    /// Registers a command for one sticker.
    ///
    /// Takes a raw sticker id or a [`StickerTrigger`] with a peer scope.
    /// First registration per `(peer scope, sticker id)` key wins.
    pub fn on_sticker<T, H, M>(&self, trigger: T, action: H) -> RegistrationResult<()>
    where
        T: Into<StickerTrigger>,
        H: IntoEventHandler<M>,
    {
        self.sticker.register(trigger.into(), action)
    }

    /// Sets the fallback for stickers no command matched.
    pub fn on_sticker_fallback<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.sticker.fallback.set(action)
    }

    // ------------------------------------------------------------------
    // Attachment and location handlers (one slot each, last set wins)
    // ------------------------------------------------------------------

    /// Sets the handler for photo messages.
    pub fn on_photo<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.photo.set(action)
    }

    /// Sets the handler for voice notes.
    pub fn on_voice<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.voice.set(action)
    }

    /// Sets the handler for video messages.
    pub fn on_video<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.video.set(action)
    }

    /// Sets the handler for audio messages.
    pub fn on_audio<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.audio.set(action)
    }

    /// Sets the handler for document messages.
    pub fn on_document<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.document.set(action)
    }

    /// Sets the handler for poll messages.
    pub fn on_poll<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.poll.set(action)
    }

    /// Sets the handler for location messages.
    pub fn on_geo<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.geo.set(action)
    }

    // ------------------------------------------------------------------
    // Chat service action handlers (one slot each, last set wins)
    // ------------------------------------------------------------------

    /// Sets the handler for member invites.
    pub fn on_chat_invite_user<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_invite_user.set(action)
    }

    /// Sets the handler for member kicks.
    pub fn on_chat_kick_user<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_kick_user.set(action)
    }

    /// Sets the handler for chat photo removals.
    pub fn on_chat_photo_remove<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_photo_remove.set(action)
    }

    /// Sets the handler for chat photo updates.
    pub fn on_chat_photo_update<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_photo_update.set(action)
    }

    /// Sets the handler for message pins.
    pub fn on_chat_pin_message<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_pin_message.set(action)
    }

    /// Sets the handler for chat title changes.
    pub fn on_chat_title_update<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_title_update.set(action)
    }

    /// Sets the handler for message unpins.
    pub fn on_chat_unpin_message<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_unpin_message.set(action)
    }

    /// Sets the handler for joins through an invite link.
    pub fn on_chat_invite_user_by_link<H, M>(&self, action: H) -> RegistrationResult<()>
    where
        H: IntoEventHandler<M>,
    {
        self.chat_invite_user_by_link.set(action)
    }

    // ------------------------------------------------------------------
    // Resolution and dispatch
    // ------------------------------------------------------------------

    /// Resolves the handler for a message without invoking it.
    ///
    /// `Ok(None)` means the message would be dropped silently.
    pub fn lookup(&self, message: &Message) -> Result<Option<EventHandler>, UnknownActionKind> {
        Ok(self.resolve(classify(message)?, message))
    }

    fn resolve(&self, kind: EventKind, message: &Message) -> Option<EventHandler> {
        match kind {
            EventKind::Message => self
                .text
                .resolve(message.peer_id, &message.text)
                .or_else(|| self.text.fallback.get()),
            EventKind::Reply => self
                .reply
                .resolve(message.peer_id, &message.text)
                .or_else(|| self.reply.fallback.get()),
            EventKind::Forward => self
                .forward
                .resolve(message.peer_id, &message.text)
                .or_else(|| self.forward.fallback.get()),
            EventKind::Sticker => message
                .sticker_id()
                .and_then(|sticker_id| self.sticker.resolve(message.peer_id, sticker_id))
                .or_else(|| self.sticker.fallback.get()),
            EventKind::Photo => self.photo.get(),
            EventKind::Voice => self.voice.get(),
            EventKind::Video => self.video.get(),
            EventKind::Audio => self.audio.get(),
            EventKind::Document => self.document.get(),
            EventKind::Poll => self.poll.get(),
            EventKind::Geo => self.geo.get(),
            EventKind::ChatInviteUser => self.chat_invite_user.get(),
            EventKind::ChatKickUser => self.chat_kick_user.get(),
            EventKind::ChatPhotoRemove => self.chat_photo_remove.get(),
            EventKind::ChatPhotoUpdate => self.chat_photo_update.get(),
            EventKind::ChatPinMessage => self.chat_pin_message.get(),
            EventKind::ChatTitleUpdate => self.chat_title_update.get(),
            EventKind::ChatUnpinMessage => self.chat_unpin_message.get(),
            EventKind::ChatInviteUserByLink => self.chat_invite_user_by_link.get(),
        }
    }

    /// Classifies the message and runs its handler, if any.
    ///
    /// At most one handler runs per message. Returns `Ok(true)` when a
    /// handler or fallback ran, `Ok(false)` when the message was dropped
    /// silently.
    pub async fn dispatch(
        &self,
        client: BoxedClient,
        message: Arc<Message>,
        token: CancellationToken,
    ) -> DispatchResult<bool> {
        let kind = classify(&message)?;
        let Some(handler) = self.resolve(kind, &message) else {
            trace!(kind = ?kind, peer_id = message.peer_id, "No handler registered, dropping event");
            return Ok(false);
        };

        debug!(kind = ?kind, peer_id = message.peer_id, "Dispatching event");
        handler(client, message, token)
            .await
            .map_err(DispatchError::Handler)?;
        Ok(true)
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commands")
            .field("text", &self.text.len())
            .field("reply", &self.reply.len())
            .field("forward", &self.forward.len())
            .field("sticker", &self.sticker.len())
            .finish_non_exhaustive()
    }
}
