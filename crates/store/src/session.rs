//! Coarse-grained conversational sessions.
//!
//! One non-expired session per sender at a time. Expiry is enforced at
//! read time only; stale rows are ignored, and actual deletion is left
//! to an external periodic sweep. Updates refresh the TTL window.
//!
//! Creation is select-then-insert without a uniqueness constraint, so
//! two racing workers can briefly leave two live rows for one sender.
//! Reads always take the most recently updated live row, so both
//! workers converge on the same session afterwards (last write wins)
//! and the loser expires unused.

use {tracing::debug, uuid::Uuid};

use crate::{error::Result, now_ms};

/// Long-lived conversational container. `current_agent` records which
/// domain owns the conversation for handoff purposes; the fine-grained
/// position within that domain lives in `chat_states`.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub sender_identity: String,
    pub context: serde_json::Value,
    pub current_agent: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    sender_identity: String,
    context: String,
    current_agent: Option<String>,
    created_at: i64,
    updated_at: i64,
    expires_at: i64,
}

impl SessionRow {
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            context: serde_json::from_str(&self.context)?,
            id: self.id,
            sender_identity: self.sender_identity,
            current_agent: self.current_agent,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: sqlx::SqlitePool,
    ttl_ms: i64,
}

impl SessionStore {
    pub fn new(pool: sqlx::SqlitePool, ttl_ms: i64) -> Self {
        Self { pool, ttl_ms }
    }

    /// Return the most recent non-expired session for a sender, or create
    /// a fresh one. All readers observe the same newest live row, so a
    /// sender effectively has one session even if a creation race slips
    /// in an extra row (see the module doc).
    pub async fn get_or_create(&self, sender_identity: &str) -> Result<Session> {
        let now = now_ms();
        if let Some(row) = self.latest_live(sender_identity, now).await? {
            return row.into_session();
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            sender_identity: sender_identity.to_string(),
            context: serde_json::Value::Object(Default::default()),
            current_agent: None,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl_ms,
        };
        sqlx::query(
            "INSERT INTO sessions \
             (id, sender_identity, context, current_agent, created_at, updated_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.sender_identity)
        .bind(session.context.to_string())
        .bind(&session.current_agent)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    /// Replace the session's context blob and refresh the TTL window.
    pub async fn update_context(&self, id: &str, context: &serde_json::Value) -> Result<()> {
        let now = now_ms();
        sqlx::query(
            "UPDATE sessions SET context = ?, updated_at = ?, expires_at = ? WHERE id = ?",
        )
        .bind(context.to_string())
        .bind(now)
        .bind(now + self.ttl_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record which domain currently owns the conversation. `None` clears
    /// ownership (flow completed or cancelled). Refreshes the TTL.
    pub async fn set_current_agent(&self, id: &str, agent: Option<&str>) -> Result<()> {
        let now = now_ms();
        sqlx::query(
            "UPDATE sessions SET current_agent = ?, updated_at = ?, expires_at = ? WHERE id = ?",
        )
        .bind(agent)
        .bind(now)
        .bind(now + self.ttl_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_live(&self, sender_identity: &str, now: i64) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, sender_identity, context, current_agent, created_at, updated_at, expires_at \
             FROM sessions WHERE sender_identity = ? AND expires_at > ? \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(sender_identity)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
