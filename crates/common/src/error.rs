use std::error::Error as StdError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors the webhook entrypoint classifies into "drop" vs "retry".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The raw sender address cannot be normalized. Drop the event, never
    /// retry; a reply would be undeliverable by definition.
    #[error("invalid sender identity: {masked}")]
    InvalidSenderIdentity { masked: String },

    /// A durable-store call failed before any side effect. Safe to retry
    /// the whole request.
    #[error("transient store failure: {context}: {source}")]
    TransientStore {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

}

impl Error {
    #[must_use]
    pub fn invalid_sender(masked: impl Into<String>) -> Self {
        Self::InvalidSenderIdentity {
            masked: masked.into(),
        }
    }

    #[must_use]
    pub fn transient(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::TransientStore {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True when the webhook should report success and drop the event.
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::InvalidSenderIdentity { .. })
    }

    /// True when upstream re-delivery of the same event is safe and wanted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sender_drops_and_never_retries() {
        let err = Error::invalid_sender("***1234");
        assert!(err.is_drop());
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_store_retries_and_keeps_its_context() {
        let err = Error::transient("sessions", std::io::Error::other("disk full"));
        assert!(err.is_retryable());
        assert!(!err.is_drop());
        assert!(err.to_string().contains("sessions"));
    }
}
