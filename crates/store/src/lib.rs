//! Durable per-sender state backed by SQLite.
//!
//! Four logical tables: `admission_records` (at-most-once gate keyed by the
//! upstream message id), `profiles` (canonical identity → stable user id),
//! `sessions` (coarse conversational container with TTL expiry), and
//! `chat_states` (fine-grained position within one domain flow).
//!
//! All cross-invocation state lives here; workers share nothing in process.

pub mod admission;
pub mod chat_state;
pub mod error;
pub mod profile;
pub mod session;

pub use {
    admission::AdmissionLedger,
    chat_state::{ChatState, ChatStateStore, IDLE_KEY},
    error::{Error, Result},
    profile::{Profile, ProfileStore},
    session::{Session, SessionStore},
};

/// Run database migrations for the store crate. Call once at startup.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Migration(Box::new(e)))?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
