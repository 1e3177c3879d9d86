//! Sender identity normalization.
//!
//! Raw webhook sender addresses arrive in assorted shapes (`250 700...`,
//! `+250-700...`, bare digits). Everything downstream joins on the
//! canonical form, so normalization must be idempotent: the same raw
//! address always yields the same canonical identity, and normalizing a
//! canonical identity is a no-op.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

/// Canonical sender address: `+` followed by 8–15 digits. The stable join
/// key across profiles and sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalIdentity(String);

impl CanonicalIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits without the leading `+`.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }

    /// Masked form for logs.
    pub fn masked(&self) -> String {
        mask_msisdn(&self.0)
    }
}

impl std::fmt::Display for CanonicalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw sender address to canonical `+<digits>` form.
///
/// Strips everything that is not a digit and validates the digit count.
/// Fails with [`Error::InvalidSenderIdentity`]; callers must drop such
/// events rather than retry them.
pub fn normalize_msisdn(raw: &str) -> Result<CanonicalIdentity> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return Err(Error::invalid_sender(mask_msisdn(raw)));
    }
    Ok(CanonicalIdentity(format!("+{digits}")))
}

/// Mask an address down to its last four digits for structured logging.
pub fn mask_msisdn(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        format!("***{digits}")
    } else {
        format!("***{}", &digits[digits.len() - 4..])
    }
}
