use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One transaction-like record: a day of spend for a managed ad account in a
/// given category. The digest builder aggregates these in a single pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpendEvent {
    pub tenant_id: TenantId,
    pub account_id: AccountId,
    pub account_name: String,
    pub category: String,
    pub amount: Decimal,
    pub leads: u32,
    pub clicks: u32,
    pub occurred_at: DateTime<Utc>,
}
