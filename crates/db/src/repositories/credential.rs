use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use pulsedesk_core::domain::credential::{CredentialStatus, ProviderCredential, ProviderKind};
use pulsedesk_core::domain::tenant::TenantId;

use super::{CredentialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCredentialRepository {
    pool: DbPool,
}

impl SqlCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn find_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<ProviderCredential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                tenant_id,
                provider,
                model_name,
                api_key_ciphertext,
                status,
                is_active,
                last_used_at,
                created_at,
                updated_at
             FROM provider_credential
             WHERE tenant_id = ? AND is_active = 1 AND status = 'valid'",
        )
        .bind(&tenant.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(credential_from_row).transpose()
    }

    async fn upsert(&self, credential: ProviderCredential) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO provider_credential (
                tenant_id,
                provider,
                model_name,
                api_key_ciphertext,
                status,
                is_active,
                last_used_at,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id) DO UPDATE SET
                provider = excluded.provider,
                model_name = excluded.model_name,
                api_key_ciphertext = excluded.api_key_ciphertext,
                status = excluded.status,
                is_active = excluded.is_active,
                last_used_at = excluded.last_used_at,
                updated_at = excluded.updated_at",
        )
        .bind(&credential.tenant_id.0)
        .bind(credential.provider.as_str())
        .bind(&credential.model_name)
        .bind(&credential.api_key_ciphertext)
        .bind(credential.status.as_str())
        .bind(i64::from(credential.is_active))
        .bind(credential.last_used_at.map(|value| value.to_rfc3339()))
        .bind(credential.created_at.to_rfc3339())
        .bind(credential.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_invalid(&self, tenant: &TenantId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE provider_credential
             SET status = 'invalid', updated_at = ?
             WHERE tenant_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&tenant.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_last_used(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE provider_credential
             SET last_used_at = ?
             WHERE tenant_id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(&tenant.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, tenant: &TenantId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE provider_credential
             SET is_active = 0, updated_at = ?
             WHERE tenant_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&tenant.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn credential_from_row(row: SqliteRow) -> Result<ProviderCredential, RepositoryError> {
    Ok(ProviderCredential {
        tenant_id: TenantId(row.try_get("tenant_id")?),
        provider: ProviderKind::parse_lossy(&row.try_get::<String, _>("provider")?),
        model_name: row.try_get("model_name")?,
        api_key_ciphertext: row.try_get("api_key_ciphertext")?,
        status: CredentialStatus::parse_lossy(&row.try_get::<String, _>("status")?),
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        last_used_at: parse_optional_timestamp("last_used_at", row.try_get("last_used_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
