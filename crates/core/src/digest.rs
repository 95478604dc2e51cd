use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Relative change beyond which an account counts as trending up or down.
pub const TREND_THRESHOLD: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestKind {
    Daily,
}

impl DigestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
        }
    }
}

/// Three-way trend classification. A bounded enum, not a raw float, so the
/// serialized digest stays compact and stable across small noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn classify(rate: f64) -> Self {
        if rate > TREND_THRESHOLD {
            Self::Up
        } else if rate < -TREND_THRESHOLD {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// Knobs for digest construction. The hard caps are the primary mechanism
/// keeping the serialized digest inside the token budget regardless of how
/// much raw data a tenant has.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    pub window_days: u32,
    pub max_accounts: usize,
    pub max_insights: usize,
    pub max_spenders: usize,
    pub token_budget: usize,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            window_days: 30,
            max_accounts: 5,
            max_insights: 5,
            max_spenders: 3,
            token_budget: 800,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub current_total: Decimal,
    pub previous_total: Decimal,
    pub growth_rate: f64,
    pub trend: TrendDirection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub name: String,
    pub spend: Decimal,
    pub revenue: Decimal,
    pub cost_per_lead: Option<Decimal>,
    pub trend: TrendDirection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelSummary {
    pub clicks: u64,
    pub leads: u64,
    /// Leads per click in basis points, capped at 10_000.
    pub conversion_bps: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub accounts_total: usize,
    pub trending_up: usize,
    pub trending_down: usize,
    pub flat: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpenderSummary {
    pub name: String,
    pub amount: Decimal,
}

/// A precomputed, size-bounded summary of a tenant's trailing window, built
/// for inclusion in a model prompt. One current digest per tenant per kind;
/// recomputation replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgencyDigest {
    pub period: String,
    pub generated_at: DateTime<Utc>,
    pub revenue: RevenueSummary,
    pub accounts: Vec<AccountSummary>,
    pub funnel: FunnelSummary,
    pub health: HealthSummary,
    pub insights: Vec<String>,
    pub top_spenders: Vec<SpenderSummary>,
}

/// Request-scoped mini digest for one managed account and one specific
/// counterpart, built synchronously inside a live conversation. Not cached:
/// its inputs vary per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityContext {
    pub generated_at: DateTime<Utc>,
    pub counterpart: String,
    pub account: AccountSummary,
    pub category_totals: Vec<SpenderSummary>,
}

/// `(current - previous) / previous` when the prior total is positive, else
/// exactly zero. The zero-division guard is load-bearing: a tenant's first
/// window always has an empty comparison period.
pub fn growth_rate(current: Decimal, previous: Decimal) -> f64 {
    if previous <= Decimal::ZERO {
        return 0.0;
    }
    let delta = current - previous;
    (delta / previous).to_f64().unwrap_or(0.0)
}

/// Rough token count for a serialized digest: one token per four bytes. The
/// budget is soft; breaching it is a monitoring signal, not a failure.
pub fn token_estimate(serialized_len: usize) -> usize {
    serialized_len.div_ceil(4)
}

/// Hard cap on list-shaped digest fields. Truncation, not best-effort
/// trimming, is what guarantees the size bound.
pub fn cap_list<T>(items: &mut Vec<T>, max: usize) {
    items.truncate(max);
}

pub fn conversion_bps(clicks: u64, leads: u64) -> u32 {
    if clicks == 0 {
        return 0;
    }
    let bps = leads.saturating_mul(10_000) / clicks;
    bps.min(10_000) as u32
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        cap_list, conversion_bps, growth_rate, token_estimate, TrendDirection, TREND_THRESHOLD,
    };

    #[test]
    fn growth_rate_is_zero_when_previous_is_zero() {
        assert_eq!(growth_rate(Decimal::new(5000, 2), Decimal::ZERO), 0.0);
        assert_eq!(growth_rate(Decimal::ZERO, Decimal::ZERO), 0.0);
        assert_eq!(growth_rate(Decimal::new(-100, 2), Decimal::ZERO), 0.0);
    }

    #[test]
    fn growth_rate_is_zero_when_previous_is_negative() {
        // Refund-heavy comparison windows can net negative; treat like zero.
        assert_eq!(growth_rate(Decimal::new(5000, 2), Decimal::new(-100, 2)), 0.0);
    }

    #[test]
    fn growth_rate_matches_relative_change() {
        let rate = growth_rate(Decimal::new(15000, 2), Decimal::new(10000, 2));
        assert!((rate - 0.5).abs() < 1e-9);

        let negative = growth_rate(Decimal::new(5000, 2), Decimal::new(10000, 2));
        assert!((negative + 0.5).abs() < 1e-9);
    }

    #[test]
    fn trend_classification_uses_fixed_threshold() {
        assert_eq!(TrendDirection::classify(TREND_THRESHOLD + 0.001), TrendDirection::Up);
        assert_eq!(TrendDirection::classify(-TREND_THRESHOLD - 0.001), TrendDirection::Down);
        assert_eq!(TrendDirection::classify(TREND_THRESHOLD), TrendDirection::Flat);
        assert_eq!(TrendDirection::classify(-TREND_THRESHOLD), TrendDirection::Flat);
        assert_eq!(TrendDirection::classify(0.0), TrendDirection::Flat);
    }

    #[test]
    fn cap_list_is_a_hard_cap() {
        let mut items: Vec<u32> = (0..1000).collect();
        cap_list(&mut items, 5);
        assert_eq!(items, vec![0, 1, 2, 3, 4]);

        let mut short = vec![1, 2];
        cap_list(&mut short, 5);
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(token_estimate(0), 0);
        assert_eq!(token_estimate(1), 1);
        assert_eq!(token_estimate(4), 1);
        assert_eq!(token_estimate(5), 2);
        assert_eq!(token_estimate(3200), 800);
    }

    #[test]
    fn conversion_bps_guards_zero_clicks_and_caps_at_full() {
        assert_eq!(conversion_bps(0, 50), 0);
        assert_eq!(conversion_bps(1000, 50), 500);
        assert_eq!(conversion_bps(10, 50), 10_000);
    }
}
