//! The seam between domain handlers and the transport's send adapter.

use std::sync::Mutex;

use {async_trait::async_trait, tracing::error};

use crate::{payload::ReplyPayload, validate::validate};

/// Send failures surfaced to handlers.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The payload violates structural limits. Never transmitted; the
    /// issue codes point at the handler bug to fix.
    #[error("payload failed structural validation: {codes:?}")]
    Invalid { codes: Vec<&'static str> },

    /// The downstream adapter failed.
    #[error("send adapter failure: {0}")]
    Adapter(String),
}

/// Accepts validated replies destined for the transport. The gateway
/// supplies the concrete implementation; handlers only see this trait.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Queue one reply. Implementations may buffer (returning tuples to
    /// the webhook caller) or send immediately.
    async fn send(&self, recipient: &str, payload: ReplyPayload) -> Result<(), SendError>;
}

/// Validate then forward to the sink. The send path refuses structurally
/// invalid payloads instead of letting the transport reject them opaquely.
pub async fn send_validated(
    sink: &dyn ReplySink,
    recipient: &str,
    payload: ReplyPayload,
) -> Result<(), SendError> {
    let issues = validate(&payload);
    if !issues.is_empty() {
        let codes: Vec<&'static str> = issues.iter().map(|i| i.code()).collect();
        error!(?codes, "refusing to send structurally invalid payload");
        return Err(SendError::Invalid { codes });
    }
    sink.send(recipient, payload).await
}

/// Test sink collecting every accepted `{recipient, payload}` tuple.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, ReplyPayload)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, ReplyPayload)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, recipient: &str, payload: ReplyPayload) -> Result<(), SendError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((recipient.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_payload_reaches_sink() {
        let sink = RecordingSink::new();
        send_validated(&sink, "+250700000001", ReplyPayload::text("hello"))
            .await
            .unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+250700000001");
        assert_eq!(sent[0].1.body, "hello");
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_sink() {
        let sink = RecordingSink::new();
        let oversized = ReplyPayload::text("x".repeat(2000));

        let err = send_validated(&sink, "+250700000001", oversized)
            .await
            .unwrap_err();
        match err {
            SendError::Invalid { codes } => assert_eq!(codes, vec!["body_too_long"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.sent().is_empty());
    }
}
