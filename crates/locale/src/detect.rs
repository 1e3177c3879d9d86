//! Per-message language and tone detection.
//!
//! Detection order: an explicit message-level language hint wins, then the
//! sender's historical locale, then text heuristics. Tone is scored from
//! the text regardless of which source decided the language, so the
//! register can differ from the reply language.

use {std::str::FromStr, tracing::trace};

use crate::language::Language;

/// Derived per-message detection result. Not stored as its own entity;
/// persisted only as a side effect onto a profile lacking a locale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanguageDetection {
    /// Detected language, `None` when no signal was conclusive.
    pub language: Option<Language>,
    /// Register/formality locale, independent of `language`.
    pub tone_locale: Language,
    /// Confidence in `tone_locale`, in [0, 1].
    pub tone_confidence: f32,
}

// Distinctive high-frequency words per language. Scoring counts whole-word
// hits; ties go to English.
const SW_MARKERS: &[&str] = &[
    "habari", "asante", "karibu", "ndiyo", "hapana", "sawa", "nataka", "tafadhali", "pesa",
    "kazi", "leo", "kesho", "nzuri", "rafiki", "samahani",
];
const RW_MARKERS: &[&str] = &[
    "muraho", "murakoze", "yego", "oya", "amakuru", "ndashaka", "akazi", "amafaranga",
    "ejo", "umunsi", "mwiriwe", "bite", "nibyo", "ntabwo",
];
const FR_MARKERS: &[&str] = &[
    "bonjour", "merci", "oui", "non", "je", "vous", "avec", "pour", "voudrais", "travail",
    "argent", "demain", "salut", "s'il",
];

/// Detect language and tone for one message.
pub fn detect(
    text: &str,
    explicit_hint: Option<&str>,
    history: Option<Language>,
) -> LanguageDetection {
    let (tone_locale, tone_confidence) = score_tone(text);

    // 1. Explicit message-level hint.
    if let Some(hint) = explicit_hint {
        if let Ok(lang) = Language::from_str(hint) {
            return LanguageDetection {
                language: Some(lang),
                tone_locale,
                tone_confidence,
            };
        }
        trace!(hint, "ignoring unsupported language hint");
    }

    // 2. Sender history.
    if let Some(lang) = history {
        return LanguageDetection {
            language: Some(lang),
            tone_locale,
            tone_confidence,
        };
    }

    // 3. Text heuristics. Only conclusive when at least one marker hit.
    let language = (tone_confidence > 0.0).then_some(tone_locale);
    LanguageDetection {
        language,
        tone_locale,
        tone_confidence,
    }
}

/// Score marker-word hits per language; the best scorer sets the tone
/// locale. English is the fallback register with zero confidence when
/// nothing matches.
fn score_tone(text: &str) -> (Language, f32) {
    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return (Language::En, 0.0);
    }

    let count = |markers: &[&str]| -> usize {
        words.iter().filter(|w| markers.contains(&w.as_str())).count()
    };

    let scores = [
        (Language::Sw, count(SW_MARKERS)),
        (Language::Rw, count(RW_MARKERS)),
        (Language::Fr, count(FR_MARKERS)),
    ];
    let (best_lang, best_score) = scores
        .iter()
        .copied()
        .max_by_key(|(_, score)| *score)
        .unwrap_or((Language::En, 0));

    if best_score == 0 {
        return (Language::En, 0.0);
    }
    let confidence = (best_score as f32 / words.len() as f32).min(1.0);
    (best_lang, confidence)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn explicit_hint_wins_over_everything() {
        let detection = detect("muraho neza", Some("fr"), Some(Language::Sw));
        assert_eq!(detection.language, Some(Language::Fr));
    }

    #[test]
    fn unsupported_hint_falls_through_to_history() {
        let detection = detect("hello", Some("zz"), Some(Language::Rw));
        assert_eq!(detection.language, Some(Language::Rw));
    }

    #[test]
    fn history_wins_over_heuristics() {
        let detection = detect("bonjour merci", None, Some(Language::Sw));
        assert_eq!(detection.language, Some(Language::Sw));
        // Tone still tracks the text, not the history.
        assert_eq!(detection.tone_locale, Language::Fr);
    }

    #[test]
    fn heuristics_detect_swahili() {
        let detection = detect("habari nataka kazi tafadhali", None, None);
        assert_eq!(detection.language, Some(Language::Sw));
        assert!(detection.tone_confidence > 0.5);
    }

    #[test]
    fn heuristics_detect_kinyarwanda() {
        let detection = detect("muraho ndashaka akazi", None, None);
        assert_eq!(detection.language, Some(Language::Rw));
    }

    #[test]
    fn no_signal_yields_none_with_english_tone() {
        let detection = detect("ok", None, None);
        assert_eq!(detection.language, None);
        assert_eq!(detection.tone_locale, Language::En);
        assert_eq!(detection.tone_confidence, 0.0);
    }

    #[test]
    fn empty_text_is_inconclusive() {
        let detection = detect("", None, None);
        assert_eq!(detection.language, None);
        assert_eq!(detection.tone_confidence, 0.0);
    }

    #[test]
    fn tone_is_independent_of_hinted_language() {
        // English-hinted message written with Swahili register.
        let detection = detect("sawa asante rafiki", Some("en"), None);
        assert_eq!(detection.language, Some(Language::En));
        assert_eq!(detection.tone_locale, Language::Sw);
        assert!(detection.tone_confidence > 0.0);
    }
}
