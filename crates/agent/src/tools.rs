use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use pulsedesk_core::digest::{growth_rate, TrendDirection};
use pulsedesk_core::domain::actor::{ActorId, ActorRole, ToolTier};
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_core::errors::ToolError;

use pulsedesk_db::repositories::SpendRepository;

use crate::llm::ToolDescriptor;

/// Identity a tool executes under. Built fresh per request; executors never
/// share a tenant binding across callers.
#[derive(Clone, Debug, PartialEq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
}

/// Structured result of one tool call, shaped for the model to read back.
/// Failures are data, not errors: a failed call never aborts its siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub success: bool,
    pub data: Value,
}

impl ToolOutcome {
    pub fn ok(tool_name: impl Into<String>, data: Value) -> Self {
        Self { tool_name: tool_name.into(), success: true, data }
    }

    pub fn error(tool_name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            data: json!({ "error": error.code(), "message": error.to_string() }),
        }
    }

    pub fn rejected(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            data: json!({
                "error": "tool_forbidden",
                "message": "your role does not permit this tool",
            }),
        }
    }
}

type ToolExecutor =
    Arc<dyn Fn(Value, TenantContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

#[derive(Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub tier: ToolTier,
    executor: ToolExecutor,
}

impl ToolSpec {
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// A tool bound to one caller's tenant and actor. Invocation validates the
/// arguments against the declared schema before the executor runs.
#[derive(Clone)]
pub struct BoundTool {
    spec: ToolSpec,
    context: TenantContext,
}

impl BoundTool {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        self.spec.descriptor()
    }

    pub async fn invoke(&self, arguments: Value) -> ToolOutcome {
        if let Err(error) = validate_input(&self.spec.input_schema, &arguments) {
            return ToolOutcome::error(self.spec.name, &error);
        }
        match (self.spec.executor)(arguments, self.context.clone()).await {
            Ok(data) => ToolOutcome::ok(self.spec.name, data),
            Err(error) => ToolOutcome::error(self.spec.name, &error),
        }
    }
}

/// Shared collaborators the built-in executors close over.
#[derive(Clone)]
pub struct ToolDeps {
    pub spend: Arc<dyn SpendRepository>,
}

/// Static catalog of every tool the assistant can call, with the minimum
/// role tier each demands. Built once at startup; read-only afterwards.
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn builtin(deps: ToolDeps) -> Self {
        let specs = vec![
            list_accounts(deps.clone()),
            get_spend_summary(deps.clone()),
            get_account_health(deps.clone()),
            draft_outreach_message(),
            suggest_budget_change(deps),
            update_account_budget(),
            queue_client_report(),
        ];
        Self { specs }
    }

    /// Pure permission check. Unknown tool names are never allowed.
    pub fn is_tool_allowed(&self, name: &str, role: ActorRole) -> bool {
        self.specs.iter().any(|spec| spec.name == name && spec.tier.allows(role))
    }

    /// The caller's usable tool set, each bound to their tenant context.
    pub fn tools_for_actor(
        &self,
        role: ActorRole,
        tenant: &TenantId,
        actor: &ActorId,
    ) -> Vec<BoundTool> {
        self.specs
            .iter()
            .filter(|spec| spec.tier.allows(role))
            .map(|spec| BoundTool {
                spec: spec.clone(),
                context: TenantContext { tenant_id: tenant.clone(), actor_id: actor.clone() },
            })
            .collect()
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.name).collect()
    }
}

/// Structural validation against the declared schema: the value must be an
/// object, required keys must be present, and declared property types must
/// match. Anything else is a validation failure before the executor runs.
fn validate_input(schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let Some(object) = arguments.as_object() else {
        return Err(ToolError::Validation("arguments must be a JSON object".to_string()));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(ToolError::Validation(format!("missing required field `{key}`")));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in object {
            let Some(declared) = properties.get(key) else {
                return Err(ToolError::Validation(format!("unexpected field `{key}`")));
            };
            let Some(expected) = declared.get("type").and_then(Value::as_str) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !matches {
                return Err(ToolError::Validation(format!(
                    "field `{key}` must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

const DEFAULT_WINDOW_DAYS: i64 = 30;

fn window_days(arguments: &Value) -> i64 {
    arguments.get("days").and_then(Value::as_i64).filter(|days| (1..=365).contains(days)).unwrap_or(DEFAULT_WINDOW_DAYS)
}

fn repo_failure(error: impl std::fmt::Display) -> ToolError {
    ToolError::Execution(format!("spend lookup failed: {error}"))
}

fn list_accounts(deps: ToolDeps) -> ToolSpec {
    ToolSpec {
        name: "list_accounts",
        description: "List the managed ad accounts this agency has spend data for.",
        input_schema: object_schema(
            json!({ "days": { "type": "integer", "description": "Lookback window in days (default 30)." } }),
            &[],
        ),
        tier: ToolTier::Any,
        executor: Arc::new(move |arguments, context| {
            let spend = Arc::clone(&deps.spend);
            Box::pin(async move {
                let now = Utc::now();
                let from = now - Duration::days(window_days(&arguments));
                let events = spend
                    .list_window(&context.tenant_id, from, now)
                    .await
                    .map_err(repo_failure)?;

                let mut seen = HashSet::new();
                let mut accounts = Vec::new();
                for event in &events {
                    if seen.insert(event.account_id.clone()) {
                        accounts.push(json!({
                            "account_id": event.account_id.as_str(),
                            "account_name": event.account_name,
                        }));
                    }
                }
                Ok(json!({ "accounts": accounts }))
            })
        }),
    }
}

fn get_spend_summary(deps: ToolDeps) -> ToolSpec {
    ToolSpec {
        name: "get_spend_summary",
        description: "Total spend, leads, and clicks over the lookback window, by account.",
        input_schema: object_schema(
            json!({ "days": { "type": "integer", "description": "Lookback window in days (default 30)." } }),
            &[],
        ),
        tier: ToolTier::Any,
        executor: Arc::new(move |arguments, context| {
            let spend = Arc::clone(&deps.spend);
            Box::pin(async move {
                let now = Utc::now();
                let days = window_days(&arguments);
                let events = spend
                    .list_window(&context.tenant_id, now - Duration::days(days), now)
                    .await
                    .map_err(repo_failure)?;

                let mut total = Decimal::ZERO;
                let mut leads: u64 = 0;
                let mut clicks: u64 = 0;
                let mut by_account: BTreeMap<String, Decimal> = BTreeMap::new();
                for event in &events {
                    total += event.amount;
                    leads += u64::from(event.leads);
                    clicks += u64::from(event.clicks);
                    *by_account.entry(event.account_name.clone()).or_default() += event.amount;
                }

                let accounts: Vec<Value> = by_account
                    .into_iter()
                    .map(|(name, amount)| json!({ "account": name, "spend": amount.to_string() }))
                    .collect();

                Ok(json!({
                    "days": days,
                    "total_spend": total.to_string(),
                    "leads": leads,
                    "clicks": clicks,
                    "accounts": accounts,
                }))
            })
        }),
    }
}

fn get_account_health(deps: ToolDeps) -> ToolSpec {
    ToolSpec {
        name: "get_account_health",
        description: "Spend trend per account: current window versus the previous one.",
        input_schema: object_schema(
            json!({ "days": { "type": "integer", "description": "Window length in days (default 30)." } }),
            &[],
        ),
        tier: ToolTier::Any,
        executor: Arc::new(move |arguments, context| {
            let spend = Arc::clone(&deps.spend);
            Box::pin(async move {
                let now = Utc::now();
                let days = window_days(&arguments);
                let split = now - Duration::days(days);
                let (current, previous) = tokio::try_join!(
                    spend.list_window(&context.tenant_id, split, now),
                    spend.list_window(&context.tenant_id, split - Duration::days(days), split),
                )
                .map_err(repo_failure)?;

                let mut totals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
                for event in &current {
                    totals.entry(event.account_name.clone()).or_default().0 += event.amount;
                }
                for event in &previous {
                    totals.entry(event.account_name.clone()).or_default().1 += event.amount;
                }

                let accounts: Vec<Value> = totals
                    .into_iter()
                    .map(|(name, (current, previous))| {
                        let rate = growth_rate(current, previous);
                        json!({
                            "account": name,
                            "current_spend": current.to_string(),
                            "previous_spend": previous.to_string(),
                            "trend": TrendDirection::classify(rate),
                        })
                    })
                    .collect();

                Ok(json!({ "days": days, "accounts": accounts }))
            })
        }),
    }
}

fn draft_outreach_message() -> ToolSpec {
    ToolSpec {
        name: "draft_outreach_message",
        description: "Draft a client-facing outreach message about an account. Returns a draft only; nothing is sent.",
        input_schema: object_schema(
            json!({
                "account_name": { "type": "string" },
                "topic": { "type": "string", "description": "What the message should cover." },
            }),
            &["account_name", "topic"],
        ),
        tier: ToolTier::Operator,
        executor: Arc::new(|arguments, _context| {
            Box::pin(async move {
                let account = required_str(&arguments, "account_name")?;
                let topic = required_str(&arguments, "topic")?;
                Ok(json!({
                    "draft": format!(
                        "Hi, quick update on {account}: {topic}. Happy to walk through the details on a call this week."
                    ),
                    "status": "draft",
                }))
            })
        }),
    }
}

fn suggest_budget_change(deps: ToolDeps) -> ToolSpec {
    ToolSpec {
        name: "suggest_budget_change",
        description: "Suggest a budget adjustment for an account based on its recent spend trend.",
        input_schema: object_schema(
            json!({ "account_id": { "type": "string" } }),
            &["account_id"],
        ),
        tier: ToolTier::Operator,
        executor: Arc::new(move |arguments, context| {
            let spend = Arc::clone(&deps.spend);
            Box::pin(async move {
                let account_id = required_str(&arguments, "account_id")?;
                let now = Utc::now();
                let split = now - Duration::days(DEFAULT_WINDOW_DAYS);
                let (current, previous) = tokio::try_join!(
                    spend.list_window(&context.tenant_id, split, now),
                    spend.list_window(
                        &context.tenant_id,
                        split - Duration::days(DEFAULT_WINDOW_DAYS),
                        split,
                    ),
                )
                .map_err(repo_failure)?;

                let sum = |events: &[pulsedesk_core::domain::spend::SpendEvent]| {
                    events
                        .iter()
                        .filter(|event| event.account_id.as_str() == account_id)
                        .map(|event| event.amount)
                        .sum::<Decimal>()
                };
                let current_total = sum(&current);
                if current_total == Decimal::ZERO {
                    return Err(ToolError::Execution(format!(
                        "no spend recorded for account `{account_id}` in the current window"
                    )));
                }

                let rate = growth_rate(current_total, sum(&previous));
                let (direction, percent) = match TrendDirection::classify(rate) {
                    TrendDirection::Up => ("increase", 10),
                    TrendDirection::Down => ("decrease", 10),
                    TrendDirection::Flat => ("hold", 0),
                };
                Ok(json!({
                    "account_id": account_id,
                    "current_spend": current_total.to_string(),
                    "suggestion": direction,
                    "percent": percent,
                }))
            })
        }),
    }
}

fn update_account_budget() -> ToolSpec {
    ToolSpec {
        name: "update_account_budget",
        description: "Queue a budget change for an account. The change is applied by the dashboard backend after review.",
        input_schema: object_schema(
            json!({
                "account_id": { "type": "string" },
                "new_monthly_budget": { "type": "number", "description": "New monthly budget in the account currency." },
            }),
            &["account_id", "new_monthly_budget"],
        ),
        tier: ToolTier::Admin,
        executor: Arc::new(|arguments, context| {
            Box::pin(async move {
                let account_id = required_str(&arguments, "account_id")?;
                let budget = arguments
                    .get("new_monthly_budget")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| {
                        ToolError::Validation("`new_monthly_budget` must be a number".to_string())
                    })?;
                if budget <= 0.0 {
                    return Err(ToolError::Validation(
                        "`new_monthly_budget` must be positive".to_string(),
                    ));
                }
                Ok(json!({
                    "change_id": Uuid::new_v4().to_string(),
                    "account_id": account_id,
                    "new_monthly_budget": budget,
                    "requested_by": context.actor_id.as_str(),
                    "status": "queued",
                }))
            })
        }),
    }
}

fn queue_client_report() -> ToolSpec {
    ToolSpec {
        name: "queue_client_report",
        description: "Queue generation of a client performance report for an account.",
        input_schema: object_schema(
            json!({
                "account_id": { "type": "string" },
                "period": { "type": "string", "description": "Reporting period, e.g. 2026-08." },
            }),
            &["account_id", "period"],
        ),
        tier: ToolTier::Admin,
        executor: Arc::new(|arguments, context| {
            Box::pin(async move {
                let account_id = required_str(&arguments, "account_id")?;
                let period = required_str(&arguments, "period")?;
                Ok(json!({
                    "report_id": Uuid::new_v4().to_string(),
                    "account_id": account_id,
                    "period": period,
                    "requested_by": context.actor_id.as_str(),
                    "status": "queued",
                }))
            })
        }),
    }
}

fn required_str(arguments: &Value, key: &str) -> Result<String, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::Validation(format!("missing required field `{key}`")))
}
