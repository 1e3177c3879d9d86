//! Inbound event and per-message context types.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::identity::CanonicalIdentity;

/// One inbound message as delivered by the transport. Ephemeral; only
/// `message_id` is ever persisted (as the admission key).
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Transport-assigned unique id. Duplicate deliveries reuse it.
    pub message_id: String,
    /// Raw sender address as the transport supplied it.
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub message: InboundMessage,
}

/// Message modality. Dispatch picks the matching handler method from this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text {
        body: String,
    },
    /// A structured selection from an interactive list or button set.
    Selection {
        id: String,
        title: Option<String>,
    },
    Media {
        kind: MediaKind,
        media_id: String,
        caption: Option<String>,
    },
}

impl InboundMessage {
    /// Lowercased, trimmed text for intent keyword matching. Selections
    /// match on their id; media has no keyword form.
    pub fn normalized_text(&self) -> Option<String> {
        match self {
            Self::Text { body } => Some(body.trim().to_lowercase()),
            Self::Selection { id, .. } => Some(id.trim().to_lowercase()),
            Self::Media { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
    Video,
}

/// Immutable per-message context composed by the context builder and
/// handed to every domain handler. One instance per inbound message.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub identity: CanonicalIdentity,
    /// Stable internal profile id.
    pub profile_id: String,
    /// Effective locale after message > profile > default precedence.
    pub locale: String,
    /// Register/formality locale, independent of `locale`.
    pub tone_locale: String,
    pub tone_confidence: f32,
    /// Correlation id for this webhook delivery, used in every log line.
    pub correlation_id: String,
}

impl MessageContext {
    /// Masked sender for logging.
    pub fn masked_sender(&self) -> String {
        self.identity.masked()
    }
}
