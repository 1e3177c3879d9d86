/// Crate-wide result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors. All variants are transient from the caller's point of
/// view: the pipeline orders the admission claim before any mutating work,
/// so a failure here means the whole request is safe to retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A JSON column held something that does not deserialize.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl From<Error> for sango_common::Error {
    fn from(err: Error) -> Self {
        sango_common::Error::transient("store", err)
    }
}
