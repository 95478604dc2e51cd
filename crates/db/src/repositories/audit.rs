use pulsedesk_core::audit::AuditEntry;

use super::{AuditRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|error| RepositoryError::Decode(format!("serialize metadata: {error}")))?;

        sqlx::query(
            "INSERT INTO audit_log (
                entry_id,
                tenant_id,
                actor_id,
                action,
                tool_name,
                provider,
                model_name,
                tokens_in,
                tokens_out,
                latency_ms,
                success,
                error_message,
                metadata,
                occurred_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.entry_id)
        .bind(&entry.tenant_id.0)
        .bind(&entry.actor_id.0)
        .bind(entry.action.as_str())
        .bind(&entry.tool_name)
        .bind(entry.provider.map(|provider| provider.as_str()))
        .bind(&entry.model_name)
        .bind(entry.tokens_in.map(i64::from))
        .bind(entry.tokens_out.map(i64::from))
        .bind(entry.latency_ms.map(|value| value as i64))
        .bind(i64::from(entry.success))
        .bind(&entry.error_message)
        .bind(metadata)
        .bind(entry.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
