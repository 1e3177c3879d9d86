//! Webhook envelope types, mirroring the upstream delivery shape
//! (`entry[].changes[].value.messages[]`).

use {
    chrono::{DateTime, Utc},
    serde::Deserialize,
    tracing::debug,
};

use sango_common::{InboundEvent, InboundMessage, MediaKind};

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

/// Status-only changes carry no `messages`; the default keeps them
/// deserializable without special-casing.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    /// Epoch seconds as a decimal string.
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub interactive: Option<Interactive>,
    pub image: Option<MediaBody>,
    pub document: Option<MediaBody>,
    pub audio: Option<MediaBody>,
    pub video: Option<MediaBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    #[serde(rename = "type", default)]
    pub interactive_type: String,
    pub list_reply: Option<Reply>,
    pub button_reply: Option<Reply>,
}

#[derive(Debug, Deserialize)]
pub struct Reply {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaBody {
    pub id: String,
    pub caption: Option<String>,
}

impl WebhookMessage {
    /// Convert to the internal event shape. `None` for message types the
    /// pipeline does not carry (reactions, stickers, system notices).
    pub fn into_event(self) -> Option<InboundEvent> {
        let received_at = parse_timestamp(&self.timestamp);
        let message = match self.message_type.as_str() {
            "text" => InboundMessage::Text {
                body: self.text?.body,
            },
            "interactive" => {
                let interactive = self.interactive?;
                let reply = interactive.list_reply.or(interactive.button_reply)?;
                InboundMessage::Selection {
                    id: reply.id,
                    title: reply.title,
                }
            },
            "image" => media(MediaKind::Image, self.image?),
            "document" => media(MediaKind::Document, self.document?),
            "audio" => media(MediaKind::Audio, self.audio?),
            "video" => media(MediaKind::Video, self.video?),
            other => {
                debug!(message_type = other, "ignoring unsupported message type");
                return None;
            },
        };
        Some(InboundEvent {
            message_id: self.id,
            sender: self.from,
            received_at,
            message,
        })
    }
}

fn media(kind: MediaKind, body: MediaBody) -> InboundMessage {
    InboundMessage::Media {
        kind,
        media_id: body.id,
        caption: body.caption,
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Flatten a webhook payload into the events it carries. Non-message
/// changes (status updates and the like) are skipped.
pub fn parse_events(payload: WebhookPayload) -> Vec<InboundEvent> {
    let mut events = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook change");
                continue;
            }
            for msg in change.value.messages {
                if let Some(event) = msg.into_event() {
                    events.push(event);
                }
            }
        }
    }
    events
}
