use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::ActorId;
use crate::domain::credential::ProviderKind;
use crate::domain::tenant::TenantId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Invoke,
    ToolCall,
    Reply,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::ToolCall => "tool_call",
            Self::Reply => "reply",
        }
    }

    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "tool_call" => Self::ToolCall,
            "reply" => Self::Reply,
            _ => Self::Invoke,
        }
    }
}

/// One immutable record of something the assistant did on a tenant's behalf.
/// Append-only: this subsystem never updates or deletes entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub tool_name: Option<String>,
    pub provider: Option<ProviderKind>,
    pub model_name: Option<String>,
    pub tokens_in: Option<u32>,
    pub tokens_out: Option<u32>,
    pub latency_ms: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(tenant_id: TenantId, actor_id: ActorId, action: AuditAction, success: bool) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            tenant_id,
            actor_id,
            action,
            tool_name: None,
            provider: None,
            model_name: None,
            tokens_in: None,
            tokens_out: None,
            latency_ms: None,
            success,
            error_message: None,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind, model_name: impl Into<String>) -> Self {
        self.provider = Some(provider);
        self.model_name = Some(model_name.into());
        self
    }

    pub fn with_tokens(mut self, tokens_in: u32, tokens_out: u32) -> Self {
        self.tokens_in = Some(tokens_in);
        self.tokens_out = Some(tokens_out);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Sink for audit entries. `emit` is infallible at this boundary: an
/// implementation that can fail must absorb the failure itself. Audit is
/// never the reason a primary request fails.
pub trait AuditSink: Send + Sync {
    fn emit(&self, entry: AuditEntry);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditAction, AuditEntry, AuditSink, InMemoryAuditSink};
    use crate::domain::actor::ActorId;
    use crate::domain::credential::ProviderKind;
    use crate::domain::tenant::TenantId;

    #[test]
    fn in_memory_sink_records_entries_with_builder_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEntry::new(
                TenantId("tenant-a".to_string()),
                ActorId("user-1".to_string()),
                AuditAction::Reply,
                true,
            )
            .with_provider(ProviderKind::Anthropic, "claude-sonnet")
            .with_tokens(1200, 340)
            .with_latency(812)
            .with_metadata("fallback", "false"),
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tenant_id.as_str(), "tenant-a");
        assert_eq!(entries[0].action, AuditAction::Reply);
        assert_eq!(entries[0].provider, Some(ProviderKind::Anthropic));
        assert_eq!(entries[0].tokens_out, Some(340));
        assert_eq!(entries[0].metadata.get("fallback").map(String::as_str), Some("false"));
    }

    #[test]
    fn failed_tool_call_carries_error_but_no_tokens() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEntry::new(
                TenantId("tenant-a".to_string()),
                ActorId("user-1".to_string()),
                AuditAction::ToolCall,
                false,
            )
            .with_tool("update_account_budget")
            .with_error("input validation failed"),
        );

        let entries = sink.entries();
        assert!(!entries[0].success);
        assert_eq!(entries[0].tool_name.as_deref(), Some("update_account_budget"));
        assert_eq!(entries[0].tokens_in, None);
    }
}
