//! Shared types, identity normalization, and error definitions used across
//! all sango crates.

pub mod error;
pub mod identity;
pub mod types;

pub use {
    error::{Error, Result},
    identity::{mask_msisdn, normalize_msisdn, CanonicalIdentity},
    types::{InboundEvent, InboundMessage, MediaKind, MessageContext},
};
