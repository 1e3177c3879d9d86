//! Outbound reply payloads and structural validation.
//!
//! The core never talks to the transport itself; handlers hand
//! `{recipient, payload}` tuples to a [`ReplySink`] and an external send
//! adapter does the delivery. Every payload is structurally validated
//! before it reaches the sink; a payload the transport would reject is a
//! handler bug, caught here with a named issue code instead of an opaque
//! transport error.

pub mod payload;
pub mod sink;
pub mod validate;

pub use {
    payload::{Button, ReplyPayload, Row, Section},
    sink::{send_validated, RecordingSink, ReplySink, SendError},
    validate::{validate, ValidationIssue},
};
