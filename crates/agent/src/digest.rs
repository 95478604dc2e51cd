use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use pulsedesk_core::digest::{
    cap_list, conversion_bps, growth_rate, token_estimate, AccountSummary, AgencyDigest,
    DigestKind, DigestSettings, EntityContext, FunnelSummary, HealthSummary, RevenueSummary,
    SpenderSummary, TrendDirection,
};
use pulsedesk_core::domain::spend::{AccountId, SpendEvent};
use pulsedesk_core::domain::tenant::TenantId;

use pulsedesk_db::repositories::{
    DigestRepository, RepositoryError, SpendRepository, StoredDigest,
};

#[derive(Debug, Error)]
#[error("kpi source failed: {0}")]
pub struct KpiError(pub String);

#[derive(Debug, Error)]
pub enum DigestError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Kpi(#[from] KpiError),
    #[error("digest serialization failed: {0}")]
    Serialize(String),
}

/// External KPI collaborator. Revenue attribution formulas live upstream;
/// this crate only reads the per-account result for a window.
#[async_trait]
pub trait KpiSource: Send + Sync {
    async fn revenue_by_account(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<AccountId, Decimal>, KpiError>;
}

/// KPI source reporting no revenue at all. Used where no upstream KPI
/// service is wired in, such as the operator CLI.
pub struct NullKpiSource;

#[async_trait]
impl KpiSource for NullKpiSource {
    async fn revenue_by_account(
        &self,
        _tenant: &TenantId,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<HashMap<AccountId, Decimal>, KpiError> {
        Ok(HashMap::new())
    }
}

/// Builds, persists, and reads back per-tenant digests. Construction is a
/// single pass over the window's spend events plus one KPI read per window;
/// the serialized result is hard-capped so its size does not grow with the
/// tenant's record count.
pub struct DigestBuilder {
    kpis: Arc<dyn KpiSource>,
    spend: Arc<dyn SpendRepository>,
    digests: Arc<dyn DigestRepository>,
    settings: DigestSettings,
}

#[derive(Default)]
struct AccountAccumulator {
    name: String,
    spend: Decimal,
    previous_spend: Decimal,
    leads: u64,
    clicks: u64,
}

impl DigestBuilder {
    pub fn new(
        kpis: Arc<dyn KpiSource>,
        spend: Arc<dyn SpendRepository>,
        digests: Arc<dyn DigestRepository>,
        settings: DigestSettings,
    ) -> Self {
        Self { kpis, spend, digests, settings }
    }

    pub async fn build_daily(&self, tenant: &TenantId) -> Result<AgencyDigest, DigestError> {
        self.build_daily_at(tenant, Utc::now()).await
    }

    pub async fn build_daily_at(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<AgencyDigest, DigestError> {
        let window = Duration::days(i64::from(self.settings.window_days));
        let split = now - window;
        let previous_start = split - window;

        let (current, previous, current_revenue, previous_revenue) = tokio::try_join!(
            async {
                self.spend.list_window(tenant, split, now).await.map_err(DigestError::from)
            },
            async {
                self.spend
                    .list_window(tenant, previous_start, split)
                    .await
                    .map_err(DigestError::from)
            },
            async {
                self.kpis
                    .revenue_by_account(tenant, split, now)
                    .await
                    .map_err(DigestError::from)
            },
            async {
                self.kpis
                    .revenue_by_account(tenant, previous_start, split)
                    .await
                    .map_err(DigestError::from)
            },
        )?;

        let digest = self.assemble(now, split, &current, &previous, &current_revenue, &previous_revenue);

        let payload = serde_json::to_value(&digest)
            .map_err(|error| DigestError::Serialize(error.to_string()))?;
        let serialized_len = payload.to_string().len();
        let tokens = token_estimate(serialized_len);
        if tokens > self.settings.token_budget {
            tracing::warn!(
                tenant = tenant.as_str(),
                tokens,
                budget = self.settings.token_budget,
                "digest exceeds its token budget",
            );
        }

        self.digests
            .upsert(StoredDigest {
                tenant_id: tenant.clone(),
                kind: DigestKind::Daily,
                payload,
                token_estimate: tokens as u32,
                generated_at: now,
            })
            .await?;

        Ok(digest)
    }

    /// The stored digest for a tenant, if one has ever been built. Absence
    /// is a normal state, not an error; callers proceed without context.
    pub async fn digest(
        &self,
        tenant: &TenantId,
        kind: DigestKind,
    ) -> Result<Option<AgencyDigest>, DigestError> {
        let Some(stored) = self.digests.find(tenant, kind).await? else {
            return Ok(None);
        };
        let digest = serde_json::from_value(stored.payload)
            .map_err(|error| DigestError::Serialize(error.to_string()))?;
        Ok(Some(digest))
    }

    pub async fn build_entity_context(
        &self,
        tenant: &TenantId,
        account_id: &AccountId,
        counterpart: &str,
    ) -> Result<Option<EntityContext>, DigestError> {
        self.build_entity_context_at(tenant, account_id, counterpart, Utc::now()).await
    }

    /// Request-scoped mini digest for a single account, built synchronously
    /// and never cached. `None` when the account has no events in the window.
    pub async fn build_entity_context_at(
        &self,
        tenant: &TenantId,
        account_id: &AccountId,
        counterpart: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EntityContext>, DigestError> {
        let window = Duration::days(i64::from(self.settings.window_days));
        let split = now - window;

        let (current, previous) = tokio::try_join!(
            async {
                self.spend.list_window(tenant, split, now).await.map_err(DigestError::from)
            },
            async {
                self.spend
                    .list_window(tenant, split - window, split)
                    .await
                    .map_err(DigestError::from)
            },
        )?;

        let mut name = None;
        let mut spend = Decimal::ZERO;
        let mut previous_spend = Decimal::ZERO;
        let mut leads: u64 = 0;
        let mut categories: HashMap<String, Decimal> = HashMap::new();
        for event in current.iter().filter(|event| &event.account_id == account_id) {
            name.get_or_insert_with(|| event.account_name.clone());
            spend += event.amount;
            leads += u64::from(event.leads);
            *categories.entry(event.category.clone()).or_default() += event.amount;
        }
        let Some(name) = name else {
            return Ok(None);
        };
        for event in previous.iter().filter(|event| &event.account_id == account_id) {
            previous_spend += event.amount;
        }

        let mut category_totals: Vec<SpenderSummary> = categories
            .into_iter()
            .map(|(name, amount)| SpenderSummary { name, amount })
            .collect();
        category_totals.sort_by(|a, b| b.amount.cmp(&a.amount));
        cap_list(&mut category_totals, self.settings.max_spenders);

        Ok(Some(EntityContext {
            generated_at: now,
            counterpart: counterpart.to_string(),
            account: AccountSummary {
                name,
                spend,
                revenue: Decimal::ZERO,
                cost_per_lead: cost_per_lead(spend, leads),
                trend: TrendDirection::classify(growth_rate(spend, previous_spend)),
            },
            category_totals,
        }))
    }

    fn assemble(
        &self,
        now: DateTime<Utc>,
        split: DateTime<Utc>,
        current: &[SpendEvent],
        previous: &[SpendEvent],
        current_revenue: &HashMap<AccountId, Decimal>,
        previous_revenue: &HashMap<AccountId, Decimal>,
    ) -> AgencyDigest {
        let mut accounts: HashMap<AccountId, AccountAccumulator> = HashMap::new();
        let mut clicks: u64 = 0;
        let mut leads: u64 = 0;

        for event in current {
            let entry = accounts.entry(event.account_id.clone()).or_default();
            if entry.name.is_empty() {
                entry.name = event.account_name.clone();
            }
            entry.spend += event.amount;
            entry.leads += u64::from(event.leads);
            entry.clicks += u64::from(event.clicks);
            clicks += u64::from(event.clicks);
            leads += u64::from(event.leads);
        }
        for event in previous {
            accounts.entry(event.account_id.clone()).or_default().previous_spend += event.amount;
        }

        let current_total: Decimal = current_revenue.values().copied().sum();
        let previous_total: Decimal = previous_revenue.values().copied().sum();
        let revenue_rate = growth_rate(current_total, previous_total);
        let revenue = RevenueSummary {
            current_total,
            previous_total,
            growth_rate: revenue_rate,
            trend: TrendDirection::classify(revenue_rate),
        };

        let mut summaries: Vec<(AccountSummary, f64)> = accounts
            .into_iter()
            .filter(|(_, acc)| acc.spend > Decimal::ZERO)
            .map(|(account_id, acc)| {
                let rate = growth_rate(acc.spend, acc.previous_spend);
                let summary = AccountSummary {
                    name: acc.name,
                    spend: acc.spend,
                    revenue: current_revenue.get(&account_id).copied().unwrap_or(Decimal::ZERO),
                    cost_per_lead: cost_per_lead(acc.spend, acc.leads),
                    trend: TrendDirection::classify(rate),
                };
                (summary, rate)
            })
            .collect();
        summaries.sort_by(|a, b| b.0.spend.cmp(&a.0.spend));

        let health = HealthSummary {
            accounts_total: summaries.len(),
            trending_up: count_trend(&summaries, TrendDirection::Up),
            trending_down: count_trend(&summaries, TrendDirection::Down),
            flat: count_trend(&summaries, TrendDirection::Flat),
        };

        let mut insights = build_insights(&revenue, &summaries);
        cap_list(&mut insights, self.settings.max_insights);

        let mut top_spenders: Vec<SpenderSummary> = summaries
            .iter()
            .map(|(summary, _)| SpenderSummary {
                name: summary.name.clone(),
                amount: summary.spend,
            })
            .collect();
        cap_list(&mut top_spenders, self.settings.max_spenders);

        let mut account_summaries: Vec<AccountSummary> =
            summaries.into_iter().map(|(summary, _)| summary).collect();
        cap_list(&mut account_summaries, self.settings.max_accounts);

        AgencyDigest {
            period: format!("{}..{}", split.format("%Y-%m-%d"), now.format("%Y-%m-%d")),
            generated_at: now,
            revenue,
            accounts: account_summaries,
            funnel: FunnelSummary { clicks, leads, conversion_bps: conversion_bps(clicks, leads) },
            health,
            insights,
            top_spenders,
        }
    }
}

fn cost_per_lead(spend: Decimal, leads: u64) -> Option<Decimal> {
    if leads == 0 {
        return None;
    }
    Some((spend / Decimal::from(leads)).round_dp(2))
}

fn count_trend(summaries: &[(AccountSummary, f64)], trend: TrendDirection) -> usize {
    summaries.iter().filter(|(summary, _)| summary.trend == trend).count()
}

fn build_insights(revenue: &RevenueSummary, summaries: &[(AccountSummary, f64)]) -> Vec<String> {
    let mut insights = Vec::new();

    match revenue.trend {
        TrendDirection::Up => insights.push(format!(
            "Agency revenue is up {:.1}% over the previous period.",
            revenue.growth_rate * 100.0,
        )),
        TrendDirection::Down => insights.push(format!(
            "Agency revenue is down {:.1}% versus the previous period.",
            revenue.growth_rate.abs() * 100.0,
        )),
        TrendDirection::Flat => {}
    }

    if let Some((summary, rate)) = summaries
        .iter()
        .filter(|(summary, _)| summary.trend == TrendDirection::Up)
        .max_by(|a, b| a.1.total_cmp(&b.1))
    {
        insights.push(format!(
            "{} is the fastest-growing account, spend up {:.1}%.",
            summary.name,
            rate * 100.0,
        ));
    }

    if let Some((summary, rate)) = summaries
        .iter()
        .filter(|(summary, _)| summary.trend == TrendDirection::Down)
        .min_by(|a, b| a.1.total_cmp(&b.1))
    {
        insights.push(format!(
            "{} spend dropped {:.1}%; worth a check-in.",
            summary.name,
            rate.abs() * 100.0,
        ));
    }

    for (summary, _) in summaries {
        if summary.cost_per_lead.is_none() && summary.spend > Decimal::ZERO {
            insights.push(format!("{} spent with zero recorded leads.", summary.name));
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use pulsedesk_core::digest::{token_estimate, DigestKind, DigestSettings, TrendDirection};
    use pulsedesk_core::domain::spend::{AccountId, SpendEvent};
    use pulsedesk_core::domain::tenant::TenantId;

    use pulsedesk_db::repositories::{
        DigestRepository, InMemoryDigestRepository, InMemorySpendRepository, SpendRepository,
    };

    use super::{DigestBuilder, KpiError, KpiSource, NullKpiSource};

    struct FixedKpiSource {
        revenue: HashMap<AccountId, Decimal>,
    }

    #[async_trait]
    impl KpiSource for FixedKpiSource {
        async fn revenue_by_account(
            &self,
            _tenant: &TenantId,
            _from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<HashMap<AccountId, Decimal>, KpiError> {
            // Attribute revenue only to the most recent window.
            let cutoff = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).single().expect("valid time");
            if to >= cutoff {
                Ok(self.revenue.clone())
            } else {
                Ok(HashMap::new())
            }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 26, 6, 0, 0).single().expect("valid time")
    }

    fn event(tenant: &TenantId, account: &str, days_ago: i64, amount: &str) -> SpendEvent {
        SpendEvent {
            tenant_id: tenant.clone(),
            account_id: AccountId(account.to_string()),
            account_name: format!("Account {account}"),
            category: if days_ago % 2 == 0 { "search_ads" } else { "social_ads" }.to_string(),
            amount: amount.parse().expect("decimal"),
            leads: 3,
            clicks: 50,
            occurred_at: now() - Duration::days(days_ago),
        }
    }

    fn builder(
        spend: InMemorySpendRepository,
        kpis: Arc<dyn KpiSource>,
    ) -> (DigestBuilder, Arc<InMemoryDigestRepository>) {
        let digests = Arc::new(InMemoryDigestRepository::default());
        let builder = DigestBuilder::new(
            kpis,
            Arc::new(spend),
            Arc::clone(&digests) as Arc<dyn pulsedesk_db::repositories::DigestRepository>,
            DigestSettings::default(),
        );
        (builder, digests)
    }

    #[tokio::test]
    async fn first_window_revenue_growth_is_exactly_zero() {
        let tenant = TenantId("tenant-a".to_string());
        let spend = InMemorySpendRepository::default();
        spend
            .insert_batch(vec![event(&tenant, "acct-1", 5, "200.00")])
            .await
            .expect("insert");

        let mut revenue = HashMap::new();
        revenue.insert(AccountId("acct-1".to_string()), Decimal::new(90000, 2));
        let (builder, _) = builder(spend, Arc::new(FixedKpiSource { revenue }));

        let digest = builder.build_daily_at(&tenant, now()).await.expect("build");

        assert_eq!(digest.revenue.previous_total, Decimal::ZERO);
        assert_eq!(digest.revenue.growth_rate, 0.0);
        assert_eq!(digest.revenue.trend, TrendDirection::Flat);
    }

    #[tokio::test]
    async fn digest_size_is_bounded_at_one_hundred_thousand_events() {
        let tenant = TenantId("tenant-a".to_string());
        let spend = InMemorySpendRepository::default();

        let mut events = Vec::with_capacity(100_000);
        for i in 0..100_000i64 {
            let account = format!("acct-{}", i % 1_000);
            events.push(event(&tenant, &account, i % 29, "12.34"));
        }
        spend.insert_batch(events).await.expect("insert");

        let (builder, digests) = builder(spend, Arc::new(NullKpiSource));
        let settings = DigestSettings::default();

        let digest = builder.build_daily_at(&tenant, now()).await.expect("build");

        assert!(digest.accounts.len() <= settings.max_accounts);
        assert!(digest.insights.len() <= settings.max_insights);
        assert!(digest.top_spenders.len() <= settings.max_spenders);
        assert_eq!(digest.health.accounts_total, 1_000);

        let serialized = serde_json::to_string(&digest).expect("serialize");
        assert!(
            token_estimate(serialized.len()) <= settings.token_budget,
            "serialized digest must stay inside the token budget, got {} bytes",
            serialized.len(),
        );

        let stored = digests
            .find(&tenant, DigestKind::Daily)
            .await
            .expect("find")
            .expect("digest stored");
        assert!((stored.token_estimate as usize) <= settings.token_budget);
    }

    #[tokio::test]
    async fn rebuild_replaces_the_stored_digest_wholesale() {
        let tenant = TenantId("tenant-a".to_string());
        let spend = InMemorySpendRepository::default();
        spend
            .insert_batch(vec![event(&tenant, "acct-1", 3, "100.00")])
            .await
            .expect("insert");

        let (builder, digests) = builder(spend, Arc::new(NullKpiSource));

        builder.build_daily_at(&tenant, now()).await.expect("first build");
        let second = builder
            .build_daily_at(&tenant, now() + Duration::hours(24))
            .await
            .expect("second build");

        let stored = digests
            .find(&tenant, DigestKind::Daily)
            .await
            .expect("find")
            .expect("stored");
        assert_eq!(stored.generated_at, second.generated_at);

        let read_back = builder.digest(&tenant, DigestKind::Daily).await.expect("read");
        assert_eq!(read_back, Some(second));
    }

    #[tokio::test]
    async fn missing_digest_reads_back_as_none() {
        let (builder, _) = builder(InMemorySpendRepository::default(), Arc::new(NullKpiSource));

        let digest = builder
            .digest(&TenantId("tenant-a".to_string()), DigestKind::Daily)
            .await
            .expect("read");
        assert_eq!(digest, None);
    }

    #[tokio::test]
    async fn entity_context_is_account_scoped_and_capped() {
        let tenant = TenantId("tenant-a".to_string());
        let spend = InMemorySpendRepository::default();
        spend
            .insert_batch(vec![
                event(&tenant, "acct-1", 2, "50.00"),
                event(&tenant, "acct-1", 3, "70.00"),
                event(&tenant, "acct-2", 4, "999.00"),
            ])
            .await
            .expect("insert");

        let (builder, _) = builder(spend, Arc::new(NullKpiSource));

        let context = builder
            .build_entity_context_at(
                &tenant,
                &AccountId("acct-1".to_string()),
                "client@northwind.example",
                now(),
            )
            .await
            .expect("build")
            .expect("account has events");

        assert_eq!(context.account.name, "Account acct-1");
        assert_eq!(context.account.spend, Decimal::new(12000, 2));
        assert_eq!(context.counterpart, "client@northwind.example");
        assert!(context.category_totals.len() <= DigestSettings::default().max_spenders);

        let absent = builder
            .build_entity_context_at(
                &tenant,
                &AccountId("acct-missing".to_string()),
                "client@example.com",
                now(),
            )
            .await
            .expect("build");
        assert_eq!(absent, None);
    }
}
