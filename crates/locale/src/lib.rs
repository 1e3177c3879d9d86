//! Language and tone resolution for inbound messages.
//!
//! Two separate questions are answered per message: which language the
//! sender is writing in (drives reply copy), and which register/formality
//! locale fits the message (drives tone directives). The two are
//! deliberately decoupled: a message can be in one language with a tone
//! leaning toward another.

pub mod detect;
pub mod language;

pub use {
    detect::{detect, LanguageDetection},
    language::Language,
};

/// Resolve the effective locale for a message.
///
/// Precedence is fixed and deterministic: message-level detection beats
/// the stored profile preference, which beats the global default.
pub fn effective_locale(
    detected: Option<Language>,
    profile: Option<Language>,
    default: Language,
) -> Language {
    detected.or(profile).unwrap_or(default)
}
