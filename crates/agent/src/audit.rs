use std::sync::Arc;

use pulsedesk_core::audit::{AuditAction, AuditEntry, AuditSink};
use pulsedesk_core::domain::actor::ActorId;
use pulsedesk_core::domain::tenant::TenantId;

use crate::resolver::ResolvedProvider;
use crate::tools::ToolOutcome;

/// Emits audit entries for the runtime's observable actions. Emission goes
/// through an infallible sink and never blocks or fails the request path.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn invocation(&self, tenant: &TenantId, actor: &ActorId) {
        self.sink.emit(AuditEntry::new(
            tenant.clone(),
            actor.clone(),
            AuditAction::Invoke,
            true,
        ));
    }

    pub fn tool_call(&self, tenant: &TenantId, actor: &ActorId, outcome: &ToolOutcome) {
        let mut entry =
            AuditEntry::new(tenant.clone(), actor.clone(), AuditAction::ToolCall, outcome.success)
                .with_tool(outcome.tool_name.clone());
        if !outcome.success {
            if let Some(message) = outcome.data.get("message").and_then(|value| value.as_str()) {
                entry = entry.with_error(message);
            }
        }
        self.sink.emit(entry);
    }

    pub fn reply(
        &self,
        tenant: &TenantId,
        actor: &ActorId,
        provider: &ResolvedProvider,
        tokens_in: u32,
        tokens_out: u32,
        latency_ms: u64,
    ) {
        self.sink.emit(
            AuditEntry::new(tenant.clone(), actor.clone(), AuditAction::Reply, true)
                .with_provider(provider.provider, provider.model_name.clone())
                .with_tokens(tokens_in, tokens_out)
                .with_latency(latency_ms)
                .with_metadata("system_fallback", provider.is_system_fallback.to_string()),
        );
    }

    pub fn failed_reply(&self, tenant: &TenantId, actor: &ActorId, error_message: &str) {
        self.sink.emit(
            AuditEntry::new(tenant.clone(), actor.clone(), AuditAction::Reply, false)
                .with_error(error_message),
        );
    }
}
