//! Event admission ledger: the at-most-once gate in front of an
//! at-least-once transport.
//!
//! The only serialization point in the whole pipeline is the atomic
//! insert-if-absent on `message_id`. Two workers racing on the same
//! duplicate delivery both call [`AdmissionLedger::claim`]; exactly one
//! observes `true`.

use crate::{error::Result, now_ms};

/// Durable at-most-once gate keyed by the upstream message identifier.
#[derive(Clone)]
pub struct AdmissionLedger {
    pool: sqlx::SqlitePool,
}

impl AdmissionLedger {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim a message id. Returns `true` iff this call is the first to
    /// claim it; every other call (concurrent or later) gets `false`.
    ///
    /// Implemented as a single `INSERT OR IGNORE` against the unique
    /// primary key, so a uniqueness violation is the normal duplicate path,
    /// not an error.
    pub async fn claim(&self, message_id: &str) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO admission_records (message_id, claimed_at) VALUES (?, ?)")
                .bind(message_id)
                .bind(now_ms())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Best-effort release of a claim, used only when processing failed
    /// before any side effect and re-delivery is wanted. Losing a release
    /// to a race is acceptable; only `claim` is load-bearing.
    pub async fn release(&self, message_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM admission_records WHERE message_id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop records claimed before `cutoff_ms`. Called by an external
    /// periodic sweep, never by the pipeline; the retention window is a
    /// deployment tunable that must outlast the transport's re-delivery
    /// window.
    pub async fn prune_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM admission_records WHERE claimed_at < ?")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn first_claim_wins() {
        let ledger = AdmissionLedger::new(test_pool().await);

        assert!(ledger.claim("wamid.1").await.unwrap());
        assert!(!ledger.claim("wamid.1").await.unwrap());
        assert!(!ledger.claim("wamid.1").await.unwrap());
    }

    #[tokio::test]
    async fn distinct_ids_are_independent() {
        let ledger = AdmissionLedger::new(test_pool().await);

        assert!(ledger.claim("wamid.a").await.unwrap());
        assert!(ledger.claim("wamid.b").await.unwrap());
    }

    #[tokio::test]
    async fn release_permits_reclaim() {
        let ledger = AdmissionLedger::new(test_pool().await);

        assert!(ledger.claim("wamid.1").await.unwrap());
        ledger.release("wamid.1").await.unwrap();
        assert!(ledger.claim("wamid.1").await.unwrap());
    }

    #[tokio::test]
    async fn release_of_unclaimed_id_is_noop() {
        let ledger = AdmissionLedger::new(test_pool().await);
        ledger.release("never-claimed").await.unwrap();
    }

    #[tokio::test]
    async fn prune_only_removes_old_records() {
        let ledger = AdmissionLedger::new(test_pool().await);

        ledger.claim("wamid.old").await.unwrap();
        let cutoff = now_ms() + 1;
        ledger.claim("wamid.new").await.unwrap();

        let removed = ledger.prune_older_than(cutoff).await.unwrap();
        assert!(removed >= 1);
        // A pruned id can be claimed again (re-delivery window is over).
        assert!(ledger.claim("wamid.old").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_exactly_one_winner() {
        // File-backed database so racing tasks share real connections.
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        let ledger = AdmissionLedger::new(pool);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let l = ledger.clone();
            tasks.push(tokio::spawn(async move { l.claim("wamid.race").await }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
