//! Fine-grained per-profile chat state.
//!
//! One current state per profile, overwritten rather than appended. The
//! absence of a row is itself a valid state: callers always get the
//! explicit idle state back, never a null they must special-case.

use serde::{de::DeserializeOwned, Serialize};

use crate::{error::Result, now_ms};

/// Explicit "no active flow" state key.
pub const IDLE_KEY: &str = "idle";

/// Logical position within one domain handler's state machine.
///
/// `data` is handler-private scratch space carried as a tagged envelope
/// `{"domain": ..., "payload": ...}` so the router stays domain-agnostic
/// while each handler round-trips its own typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub key: String,
    pub data: serde_json::Value,
}

impl ChatState {
    /// The explicit idle state.
    pub fn idle() -> Self {
        Self {
            key: IDLE_KEY.to_string(),
            data: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.key == IDLE_KEY
    }

    /// Build a state with a typed domain payload.
    pub fn with_payload<T: Serialize>(
        domain: &str,
        key: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            data: serde_json::json!({
                "domain": domain,
                "payload": serde_json::to_value(payload)?,
            }),
        })
    }

    /// Domain tag from the envelope, if present.
    pub fn domain(&self) -> Option<&str> {
        self.data.get("domain").and_then(|v| v.as_str())
    }

    /// Deserialize the typed payload a handler previously stored.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .data
            .get("payload")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

/// Store for the current chat state of each profile. Mutated only through
/// the router on behalf of the active domain handler.
#[derive(Clone)]
pub struct ChatStateStore {
    pool: sqlx::SqlitePool,
}

impl ChatStateStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Current state for a profile; idle when no row exists.
    pub async fn get(&self, profile_id: &str) -> Result<ChatState> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT key, data FROM chat_states WHERE profile_id = ?",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((key, data)) => Ok(ChatState {
                key,
                data: serde_json::from_str(&data)?,
            }),
            None => Ok(ChatState::idle()),
        }
    }

    /// Overwrite the profile's current state.
    pub async fn set(&self, profile_id: &str, state: &ChatState) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO chat_states (profile_id, key, data, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(profile_id) DO UPDATE SET
                 key = excluded.key,
                 data = excluded.data,
                 updated_at = excluded.updated_at"#,
        )
        .bind(profile_id)
        .bind(&state.key)
        .bind(state.data.to_string())
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Return the profile to idle (flow completed or cancelled).
    pub async fn clear(&self, profile_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chat_states WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde::Deserialize};

    async fn test_store() -> ChatStateStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        ChatStateStore::new(pool)
    }

    #[tokio::test]
    async fn missing_row_reads_as_idle() {
        let store = test_store().await;
        let state = store.get("p1").await.unwrap();
        assert!(state.is_idle());
        assert_eq!(state.key, IDLE_KEY);
    }

    #[tokio::test]
    async fn set_overwrites_previous_state() {
        let store = test_store().await;

        store
            .set(
                "p1",
                &ChatState {
                    key: "insurance_menu".into(),
                    data: serde_json::json!({}),
                },
            )
            .await
            .unwrap();
        store
            .set(
                "p1",
                &ChatState {
                    key: "ins_wait_doc".into(),
                    data: serde_json::json!({"attempt": 1}),
                },
            )
            .await
            .unwrap();

        let state = store.get("p1").await.unwrap();
        assert_eq!(state.key, "ins_wait_doc");
        assert_eq!(state.data["attempt"], 1);
    }

    #[tokio::test]
    async fn clear_returns_to_idle() {
        let store = test_store().await;

        store
            .set(
                "p1",
                &ChatState {
                    key: "jobs_wait_skills".into(),
                    data: serde_json::json!({}),
                },
            )
            .await
            .unwrap();
        store.clear("p1").await.unwrap();

        assert!(store.get("p1").await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn profiles_are_isolated() {
        let store = test_store().await;

        store
            .set(
                "p1",
                &ChatState {
                    key: "insurance_menu".into(),
                    data: serde_json::json!({}),
                },
            )
            .await
            .unwrap();

        assert!(store.get("p2").await.unwrap().is_idle());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct InsuranceScratch {
        policy_kind: String,
        attempts: u32,
    }

    #[tokio::test]
    async fn typed_payload_round_trips() {
        let store = test_store().await;
        let scratch = InsuranceScratch {
            policy_kind: "moto".into(),
            attempts: 2,
        };

        let state =
            ChatState::with_payload("insurance", "ins_wait_doc", &scratch).unwrap();
        assert_eq!(state.domain(), Some("insurance"));

        store.set("p1", &state).await.unwrap();
        let loaded = store.get("p1").await.unwrap();
        assert_eq!(loaded.payload::<InsuranceScratch>().unwrap(), scratch);
    }
}
