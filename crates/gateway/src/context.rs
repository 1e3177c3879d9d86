//! Per-message context assembly.
//!
//! Each step is explicit: normalize the sender, detect language and tone,
//! ensure a profile (detection seeds the locale only when the profile has
//! none), resolve the effective locale, load the chat state. A malformed
//! sender is a drop; a store failure is a retry. Callers tell them apart
//! through the error taxonomy, not by inspecting messages.

use {tracing::debug, uuid::Uuid};

use {
    sango_common::{normalize_msisdn, InboundEvent, InboundMessage, MessageContext, Result},
    sango_locale::{detect, effective_locale, Language},
    sango_store::{ChatState, ChatStateStore, ProfileStore},
};

pub struct ContextBuilder {
    profiles: ProfileStore,
    states: ChatStateStore,
    default_locale: Language,
}

impl ContextBuilder {
    pub fn new(pool: sqlx::SqlitePool, default_locale: Language) -> Self {
        Self {
            profiles: ProfileStore::new(pool.clone()),
            states: ChatStateStore::new(pool),
            default_locale,
        }
    }

    /// Build the immutable context plus the current chat state for one
    /// inbound event.
    pub async fn build(&self, event: &InboundEvent) -> Result<(MessageContext, ChatState)> {
        let identity = normalize_msisdn(&event.sender)?;

        // Detection consults the stored preference as history, so the
        // profile is looked up read-only first.
        let existing = self.profiles.find(&identity).await?;
        let history = existing
            .as_ref()
            .and_then(|p| p.locale.as_deref())
            .and_then(|l| l.parse::<Language>().ok());
        let detection = detect(detection_text(&event.message), None, history);

        let profile = self
            .profiles
            .ensure(&identity, detection.language.map(|l| l.as_str()))
            .await?;
        if profile.locale.is_none() {
            if let Some(lang) = detection.language {
                self.profiles
                    .set_locale_if_missing(&profile.user_id, lang.as_str())
                    .await?;
            }
        }

        let stored = profile
            .locale
            .as_deref()
            .and_then(|l| l.parse::<Language>().ok());
        let locale = effective_locale(detection.language, stored, self.default_locale);

        let state = self.states.get(&profile.user_id).await?;
        let context = MessageContext {
            identity,
            profile_id: profile.user_id,
            locale: locale.as_str().to_string(),
            tone_locale: detection.tone_locale.as_str().to_string(),
            tone_confidence: detection.tone_confidence,
            correlation_id: Uuid::new_v4().to_string(),
        };
        debug!(
            correlation_id = %context.correlation_id,
            sender = %context.masked_sender(),
            locale = %context.locale,
            state_key = %state.key,
            "context built"
        );
        Ok((context, state))
    }
}

/// Text detection runs on. Selection ids carry no language signal.
fn detection_text(message: &InboundMessage) -> &str {
    match message {
        InboundMessage::Text { body } => body,
        InboundMessage::Selection { .. } => "",
        InboundMessage::Media { caption, .. } => caption.as_deref().unwrap_or(""),
    }
}
