//! Durable per-sender profile records.
//!
//! Profiles are created lazily on first contact and keyed by the canonical
//! sender identity. Because normalization is idempotent, repeated lookups
//! for the same raw address converge on one row; a creation race between
//! two workers is resolved by the unique constraint plus a re-select.

use {sango_common::CanonicalIdentity, tracing::debug, uuid::Uuid};

use crate::{
    error::{Error, Result},
    now_ms,
};

/// Stable per-sender record.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: String,
    pub external_identity: String,
    pub locale: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    external_identity: String,
    locale: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Self {
            user_id: r.user_id,
            external_identity: r.external_identity,
            locale: r.locale,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct ProfileStore {
    pool: sqlx::SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Get or create the profile for a canonical identity.
    ///
    /// `seed_locale` is written only when the row is created; an existing
    /// profile's stored preference is never overwritten by detection.
    pub async fn ensure(
        &self,
        identity: &CanonicalIdentity,
        seed_locale: Option<&str>,
    ) -> Result<Profile> {
        if let Some(existing) = self.find(identity).await? {
            return Ok(existing);
        }

        let now = now_ms();
        let user_id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO profiles \
             (user_id, external_identity, locale, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user_id)
        .bind(identity.as_str())
        .bind(seed_locale)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(sender = %identity.masked(), user_id, "profile created");
            return Ok(Profile {
                user_id,
                external_identity: identity.as_str().to_string(),
                locale: seed_locale.map(str::to_string),
                created_at: now,
                updated_at: now,
            });
        }

        // Lost a creation race; the other worker's row is authoritative.
        self.find(identity)
            .await?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))
    }

    /// Look up a profile by canonical identity.
    pub async fn find(&self, identity: &CanonicalIdentity) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, external_identity, locale, created_at, updated_at \
             FROM profiles WHERE external_identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Persist a detected locale onto a profile that lacks one. Existing
    /// preferences win over detection, so rows with a locale are untouched.
    pub async fn set_locale_if_missing(&self, user_id: &str, locale: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET locale = ?, updated_at = ? \
             WHERE user_id = ? AND locale IS NULL",
        )
        .bind(locale)
        .bind(now_ms())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Explicit preference change (e.g. a language menu selection).
    pub async fn set_locale(&self, user_id: &str, locale: &str) -> Result<()> {
        sqlx::query("UPDATE profiles SET locale = ?, updated_at = ? WHERE user_id = ?")
            .bind(locale)
            .bind(now_ms())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, sango_common::normalize_msisdn};

    async fn test_store() -> ProfileStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        ProfileStore::new(pool)
    }

    #[tokio::test]
    async fn ensure_creates_then_reuses() {
        let store = test_store().await;
        let id = normalize_msisdn("+250700000001").unwrap();

        let first = store.ensure(&id, Some("rw")).await.unwrap();
        let second = store.ensure(&id, Some("fr")).await.unwrap();

        assert_eq!(first.user_id, second.user_id);
        // Seed locale only applies at creation.
        assert_eq!(second.locale.as_deref(), Some("rw"));
    }

    #[tokio::test]
    async fn repeated_lookups_converge_on_one_row() {
        let store = test_store().await;
        let a = normalize_msisdn("250 700-000-002").unwrap();
        let b = normalize_msisdn("+250700000002").unwrap();

        let pa = store.ensure(&a, None).await.unwrap();
        let pb = store.ensure(&b, None).await.unwrap();
        assert_eq!(pa.user_id, pb.user_id);
    }

    #[tokio::test]
    async fn set_locale_if_missing_only_fills_null() {
        let store = test_store().await;
        let id = normalize_msisdn("+250700000003").unwrap();

        let profile = store.ensure(&id, None).await.unwrap();
        assert!(profile.locale.is_none());

        assert!(store
            .set_locale_if_missing(&profile.user_id, "sw")
            .await
            .unwrap());
        assert!(!store
            .set_locale_if_missing(&profile.user_id, "en")
            .await
            .unwrap());

        let reloaded = store.find(&id).await.unwrap().unwrap();
        assert_eq!(reloaded.locale.as_deref(), Some("sw"));
    }

    #[tokio::test]
    async fn set_locale_overwrites() {
        let store = test_store().await;
        let id = normalize_msisdn("+250700000004").unwrap();

        let profile = store.ensure(&id, Some("en")).await.unwrap();
        store.set_locale(&profile.user_id, "fr").await.unwrap();

        let reloaded = store.find(&id).await.unwrap().unwrap();
        assert_eq!(reloaded.locale.as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = test_store().await;
        let id = normalize_msisdn("+250700999999").unwrap();
        assert!(store.find(&id).await.unwrap().is_none());
    }
}
