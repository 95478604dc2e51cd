//! Deterministic demo data for local development and the `seed` command.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use pulsedesk_core::domain::spend::{AccountId, SpendEvent};
use pulsedesk_core::domain::tenant::TenantId;

const DEMO_ACCOUNTS: &[(&str, &str, &str)] = &[
    ("acct-north", "Northwind Retail", "search_ads"),
    ("acct-harbor", "Harborline Travel", "social_ads"),
    ("acct-atlas", "Atlas Fitness", "display_ads"),
];

/// One spend event per account per day over the trailing `days` window,
/// ending just before `now`. Amounts and funnel counts are derived from the
/// day index so repeated seeds produce identical data.
pub fn demo_spend_events(tenant: &TenantId, now: DateTime<Utc>, days: i64) -> Vec<SpendEvent> {
    let mut events = Vec::new();

    for day in 0..days {
        let occurred_at = now - Duration::days(days - day);

        for (index, (account_id, account_name, category)) in DEMO_ACCOUNTS.iter().enumerate() {
            let base = 40 + 15 * index as i64;
            let drift = (day % 7) * 3;
            let amount = Decimal::new((base + drift) * 100 + day * 17, 2);

            events.push(SpendEvent {
                tenant_id: tenant.clone(),
                account_id: AccountId((*account_id).to_string()),
                account_name: (*account_name).to_string(),
                category: (*category).to_string(),
                amount,
                leads: (2 + (day + index as i64) % 5) as u32,
                clicks: (80 + day * 4 + index as i64 * 25) as u32,
                occurred_at,
            });
        }
    }

    events
}
