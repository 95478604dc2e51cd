use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use pulsedesk_core::domain::spend::{AccountId, SpendEvent};
use pulsedesk_core::domain::tenant::TenantId;

use super::credential::parse_timestamp;
use super::{RepositoryError, SpendRepository};
use crate::DbPool;

pub struct SqlSpendRepository {
    pool: DbPool,
}

impl SqlSpendRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SpendRepository for SqlSpendRepository {
    async fn list_window(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SpendEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                tenant_id,
                account_id,
                account_name,
                category,
                amount,
                leads,
                clicks,
                occurred_at
             FROM spend_event
             WHERE tenant_id = ? AND occurred_at >= ? AND occurred_at < ?
             ORDER BY occurred_at ASC",
        )
        .bind(&tenant.0)
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }

    async fn insert_batch(&self, events: Vec<SpendEvent>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for event in events {
            sqlx::query(
                "INSERT INTO spend_event (
                    id,
                    tenant_id,
                    account_id,
                    account_name,
                    category,
                    amount,
                    leads,
                    clicks,
                    occurred_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&event.tenant_id.0)
            .bind(&event.account_id.0)
            .bind(&event.account_name)
            .bind(&event.category)
            .bind(event.amount.to_string())
            .bind(i64::from(event.leads))
            .bind(i64::from(event.clicks))
            .bind(event.occurred_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn event_from_row(row: SqliteRow) -> Result<SpendEvent, RepositoryError> {
    let amount_raw = row.try_get::<String, _>("amount")?;
    let amount = amount_raw
        .parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("invalid amount `{amount_raw}`: {error}")))?;

    Ok(SpendEvent {
        tenant_id: TenantId(row.try_get("tenant_id")?),
        account_id: AccountId(row.try_get("account_id")?),
        account_name: row.try_get("account_name")?,
        category: row.try_get("category")?,
        amount,
        leads: parse_u32("leads", row.try_get("leads")?)?,
        clicks: parse_u32("clicks", row.try_get("clicks")?)?,
        occurred_at: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}
