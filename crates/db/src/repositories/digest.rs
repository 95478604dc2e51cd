use sqlx::{sqlite::SqliteRow, Row};

use pulsedesk_core::digest::DigestKind;
use pulsedesk_core::domain::tenant::TenantId;

use super::credential::parse_timestamp;
use super::{DigestRepository, RepositoryError, StoredDigest};
use crate::DbPool;

pub struct SqlDigestRepository {
    pool: DbPool,
}

impl SqlDigestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DigestRepository for SqlDigestRepository {
    async fn upsert(&self, digest: StoredDigest) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(&digest.payload)
            .map_err(|error| RepositoryError::Decode(format!("serialize digest: {error}")))?;

        sqlx::query(
            "INSERT INTO agency_digest (tenant_id, kind, payload, token_estimate, generated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, kind) DO UPDATE SET
                payload = excluded.payload,
                token_estimate = excluded.token_estimate,
                generated_at = excluded.generated_at",
        )
        .bind(&digest.tenant_id.0)
        .bind(digest.kind.as_str())
        .bind(payload)
        .bind(i64::from(digest.token_estimate))
        .bind(digest.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        tenant: &TenantId,
        kind: DigestKind,
    ) -> Result<Option<StoredDigest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT tenant_id, kind, payload, token_estimate, generated_at
             FROM agency_digest
             WHERE tenant_id = ? AND kind = ?",
        )
        .bind(&tenant.0)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| digest_from_row(row, kind)).transpose()
    }
}

fn digest_from_row(row: SqliteRow, kind: DigestKind) -> Result<StoredDigest, RepositoryError> {
    let payload_raw = row.try_get::<String, _>("payload")?;
    let payload = serde_json::from_str(&payload_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid digest payload: {error}")))?;

    let token_estimate = row.try_get::<i64, _>("token_estimate")?;
    let token_estimate = u32::try_from(token_estimate).map_err(|_| {
        RepositoryError::Decode(format!("invalid token_estimate: {token_estimate}"))
    })?;

    Ok(StoredDigest {
        tenant_id: TenantId(row.try_get("tenant_id")?),
        kind,
        payload,
        token_estimate,
        generated_at: parse_timestamp("generated_at", row.try_get("generated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use pulsedesk_core::digest::DigestKind;
    use pulsedesk_core::domain::tenant::TenantId;

    use super::SqlDigestRepository;
    use crate::migrations;
    use crate::repositories::{DigestRepository, StoredDigest};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn missing_digest_reads_as_none() {
        let pool = setup_pool().await;
        let repo = SqlDigestRepository::new(pool.clone());

        let found = repo
            .find(&TenantId("tenant-a".to_string()), DigestKind::Daily)
            .await
            .expect("find");
        assert_eq!(found, None);

        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_fully_replaces_prior_digest() {
        let pool = setup_pool().await;
        let repo = SqlDigestRepository::new(pool.clone());
        let tenant = TenantId("tenant-a".to_string());

        repo.upsert(StoredDigest {
            tenant_id: tenant.clone(),
            kind: DigestKind::Daily,
            payload: json!({"revenue": {"current_total": "1000"}}),
            token_estimate: 120,
            generated_at: parse_ts("2026-08-25T06:00:00Z"),
        })
        .await
        .expect("first upsert");

        let replacement = StoredDigest {
            tenant_id: tenant.clone(),
            kind: DigestKind::Daily,
            payload: json!({"revenue": {"current_total": "2000"}}),
            token_estimate: 140,
            generated_at: parse_ts("2026-08-26T06:00:00Z"),
        };
        repo.upsert(replacement.clone()).await.expect("second upsert");

        let found = repo.find(&tenant, DigestKind::Daily).await.expect("find");
        assert_eq!(found, Some(replacement));

        pool.close().await;
    }

    #[tokio::test]
    async fn digests_are_tenant_scoped() {
        let pool = setup_pool().await;
        let repo = SqlDigestRepository::new(pool.clone());

        repo.upsert(StoredDigest {
            tenant_id: TenantId("tenant-a".to_string()),
            kind: DigestKind::Daily,
            payload: json!({"accounts": []}),
            token_estimate: 10,
            generated_at: parse_ts("2026-08-26T06:00:00Z"),
        })
        .await
        .expect("upsert");

        let other = repo
            .find(&TenantId("tenant-b".to_string()), DigestKind::Daily)
            .await
            .expect("find");
        assert_eq!(other, None);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
