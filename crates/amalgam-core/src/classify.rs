//! Message classification.
//!
//! Every incoming message is assigned exactly one [`EventKind`], and that
//! kind alone decides which command store the dispatcher consults. The
//! precedence is fixed, first hit wins:
//!
//! 1. service action
//! 2. forwarded messages
//! 3. reply
//! 4. location
//! 5. first recognized attachment, in attachment order
//! 6. plain message
//!
//! Unrecognized attachment types are skipped during the scan. An
//! unrecognized service action kind fails with [`UnknownActionKind`].

use crate::error::UnknownActionKind;
use crate::event::{Attachment, ChatAction, Message};

/// The routing category of an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Plain text message with nothing else recognized.
    Message,
    /// Reply to an earlier message.
    Reply,
    /// Carries forwarded messages.
    Forward,
    /// First recognized attachment is a sticker.
    Sticker,
    /// First recognized attachment is a photo.
    Photo,
    /// First recognized attachment is a voice note.
    Voice,
    /// First recognized attachment is a video.
    Video,
    /// First recognized attachment is an audio track.
    Audio,
    /// First recognized attachment is a document.
    Document,
    /// First recognized attachment is a poll.
    Poll,
    /// Carries a location.
    Geo,
    /// A member was invited into the chat.
    ChatInviteUser,
    /// A member was kicked from the chat.
    ChatKickUser,
    /// The chat photo was removed.
    ChatPhotoRemove,
    /// The chat photo was updated.
    ChatPhotoUpdate,
    /// A message was pinned.
    ChatPinMessage,
    /// The chat title was changed.
    ChatTitleUpdate,
    /// A message was unpinned.
    ChatUnpinMessage,
    /// A member joined through an invite link.
    ChatInviteUserByLink,
}

/// Classifies a message into its routing category.
pub fn classify(message: &Message) -> Result<EventKind, UnknownActionKind> {
    if let Some(action) = &message.action {
        return action_kind(action);
    }
    if message.is_forwarded() {
        return Ok(EventKind::Forward);
    }
    if message.is_reply() {
        return Ok(EventKind::Reply);
    }
    if message.geo.is_some() {
        return Ok(EventKind::Geo);
    }
    for attachment in &message.attachments {
        if let Some(kind) = attachment_kind(attachment) {
            return Ok(kind);
        }
    }
    Ok(EventKind::Message)
}

fn action_kind(action: &ChatAction) -> Result<EventKind, UnknownActionKind> {
    match action.kind.as_str() {
        "chat_invite_user" => Ok(EventKind::ChatInviteUser),
        "chat_kick_user" => Ok(EventKind::ChatKickUser),
        "chat_photo_remove" => Ok(EventKind::ChatPhotoRemove),
        "chat_photo_update" => Ok(EventKind::ChatPhotoUpdate),
        "chat_pin_message" => Ok(EventKind::ChatPinMessage),
        "chat_title_update" => Ok(EventKind::ChatTitleUpdate),
        "chat_unpin_message" => Ok(EventKind::ChatUnpinMessage),
        "chat_invite_user_by_link" => Ok(EventKind::ChatInviteUserByLink),
        other => Err(UnknownActionKind {
            kind: other.to_string(),
        }),
    }
}

fn attachment_kind(attachment: &Attachment) -> Option<EventKind> {
    match attachment {
        Attachment::Sticker { .. } => Some(EventKind::Sticker),
        Attachment::Photo { .. } => Some(EventKind::Photo),
        Attachment::AudioMessage { .. } => Some(EventKind::Voice),
        Attachment::Video { .. } => Some(EventKind::Video),
        Attachment::Audio { .. } => Some(EventKind::Audio),
        Attachment::Doc { .. } => Some(EventKind::Document),
        Attachment::Poll { .. } => Some(EventKind::Poll),
        Attachment::Unknown => None,
    }
}
