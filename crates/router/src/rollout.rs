//! Deterministic percentage rollout.
//!
//! Each sender hashes to a stable bucket in `0..100`; a feature at N
//! percent is on for exactly the buckets below N. Raising the percentage
//! only ever adds senders, it never flips an already-enabled one off.

use sha2::{Digest, Sha256};

use sango_common::CanonicalIdentity;

/// Stable bucket in `0..100` for a sender identity.
pub fn bucket(identity: &CanonicalIdentity) -> u8 {
    let digest = Sha256::digest(identity.as_str().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % 100) as u8
}

/// Whether a feature rolled out to `percent` of senders is on for this one.
/// `percent` is clamped to `0..=100`.
pub fn should_enable(identity: &CanonicalIdentity, percent: u8) -> bool {
    bucket(identity) < percent.min(100)
}

/// Gate for routing a sender to the new handoff path. The handoff only
/// opens once the rollout has reached at least half of traffic, and then
/// only for senders inside the rollout.
pub fn handoff_enabled(identity: &CanonicalIdentity, percent: u8) -> bool {
    percent >= 50 && should_enable(identity, percent)
}
