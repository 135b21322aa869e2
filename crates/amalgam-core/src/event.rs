//! Wire model for Bots Long Poll updates.
//!
//! Raw updates arrive as internally tagged JSON objects. Only `message_new`
//! updates are routed; every other update kind deserializes to
//! [`GroupEvent::Other`] and is skipped by the poll loop.
//!
//! ```text
//! GroupEvent::MessageNew
//! └── MessageEnvelope
//!     └── Message { text, attachments, reply_message, fwd_messages, geo, action }
//! ```
//!
//! The shapes here are intentionally narrow: a handful of identifying fields
//! per attachment payload, enough for routing and for handlers to answer the
//! right peer. Unknown attachment types collapse into [`Attachment::Unknown`]
//! rather than failing deserialization.

use serde::{Deserialize, Serialize};

// ============================================================================
// Raw updates
// ============================================================================

/// One raw update from the long-poll stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupEvent {
    /// A new incoming message.
    MessageNew {
        /// Update payload.
        object: MessageEnvelope,
    },
    /// Any update kind this crate does not route.
    #[serde(other)]
    Other,
}

/// Envelope around an incoming message (Bots API ≥ 5.103).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// The message itself.
    pub message: Message,
}

// ============================================================================
// Message
// ============================================================================

/// An incoming community message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Message id within the community.
    #[serde(default)]
    pub id: i64,
    /// Unix timestamp of the message.
    #[serde(default)]
    pub date: i64,
    /// Destination peer. Chats are offset past 2 000 000 000.
    #[serde(default)]
    pub peer_id: i64,
    /// Author of the message.
    #[serde(default)]
    pub from_id: i64,
    /// Message text, possibly empty.
    #[serde(default)]
    pub text: String,
    /// Attachments in the order the platform reports them.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// The message this one replies to.
    #[serde(default)]
    pub reply_message: Option<Box<Message>>,
    /// Forwarded messages bundled with this one.
    #[serde(default)]
    pub fwd_messages: Vec<Message>,
    /// Attached location.
    #[serde(default)]
    pub geo: Option<Geo>,
    /// Service action (chat membership, pin and title changes).
    #[serde(default)]
    pub action: Option<ChatAction>,
}

impl Message {
    /// Id of the first sticker attachment, if any.
    pub fn sticker_id(&self) -> Option<i64> {
        self.attachments.iter().find_map(|attachment| match attachment {
            Attachment::Sticker { sticker } => Some(sticker.sticker_id),
            _ => None,
        })
    }

    /// Whether this message replies to an earlier one.
    pub fn is_reply(&self) -> bool {
        self.reply_message.is_some()
    }

    /// Whether this message carries forwarded messages.
    pub fn is_forwarded(&self) -> bool {
        !self.fwd_messages.is_empty()
    }
}

// ============================================================================
// Attachments
// ============================================================================

/// A message attachment, tagged by the platform's `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    /// A sticker.
    Sticker {
        /// Sticker payload.
        sticker: Sticker,
    },
    /// A photo.
    Photo {
        /// Photo payload.
        photo: Photo,
    },
    /// A voice note.
    AudioMessage {
        /// Voice note payload.
        audio_message: AudioMessage,
    },
    /// A video.
    Video {
        /// Video payload.
        video: Video,
    },
    /// An audio track.
    Audio {
        /// Audio payload.
        audio: Audio,
    },
    /// A document.
    Doc {
        /// Document payload.
        doc: Document,
    },
    /// A poll.
    Poll {
        /// Poll payload.
        poll: Poll,
    },
    /// Any attachment type this crate does not recognize.
    #[serde(other)]
    Unknown,
}

/// Sticker attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sticker {
    /// Sticker pack id.
    #[serde(default)]
    pub product_id: i64,
    /// Sticker id within the pack.
    pub sticker_id: i64,
}

/// Photo attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Photo {
    /// Photo id.
    pub id: i64,
    /// Owner of the photo.
    #[serde(default)]
    pub owner_id: i64,
}

/// Voice note attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioMessage {
    /// Voice note id.
    pub id: i64,
    /// Owner of the voice note.
    #[serde(default)]
    pub owner_id: i64,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: i64,
}

/// Video attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    /// Video id.
    pub id: i64,
    /// Owner of the video.
    #[serde(default)]
    pub owner_id: i64,
}

/// Audio attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Audio {
    /// Track id.
    pub id: i64,
    /// Owner of the track.
    #[serde(default)]
    pub owner_id: i64,
}

/// Document attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document id.
    pub id: i64,
    /// Owner of the document.
    #[serde(default)]
    pub owner_id: i64,
    /// File name.
    #[serde(default)]
    pub title: String,
}

/// Poll attachment payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Poll {
    /// Poll id.
    pub id: i64,
    /// Owner of the poll.
    #[serde(default)]
    pub owner_id: i64,
    /// Poll question.
    #[serde(default)]
    pub question: String,
}

// ============================================================================
// Location and service actions
// ============================================================================

/// Location attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geo {
    /// Location type, usually `"point"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// The coordinates.
    pub coordinates: Coordinates,
}

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Service action attached to a message.
///
/// `kind` stays a raw platform string here; classification maps it to a
/// routing category and rejects kinds it does not know.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatAction {
    /// Raw action kind, e.g. `"chat_invite_user"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Affected member for invites and kicks.
    #[serde(default)]
    pub member_id: Option<i64>,
    /// New title for title updates.
    #[serde(default)]
    pub text: Option<String>,
    /// Pinned message for pin and unpin updates.
    #[serde(default)]
    pub conversation_message_id: Option<i64>,
}
