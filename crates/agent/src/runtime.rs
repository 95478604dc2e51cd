use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use pulsedesk_core::config::AgentConfig;
use pulsedesk_core::digest::DigestKind;
use pulsedesk_core::domain::actor::{ActorId, ActorRole};
use pulsedesk_core::domain::credential::ProviderKind;
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_core::errors::OrchestratorError;

use crate::audit::AuditRecorder;
use crate::digest::DigestBuilder;
use crate::llm::{ChatMessage, ModelClient, ModelRequest};
use crate::resolver::ProviderResolver;
use crate::tools::{ToolOutcome, ToolRegistry};

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub actor_role: ActorRole,
    pub message: String,
    pub history: Vec<ChatMessage>,
}

#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls_executed: Vec<ToolOutcome>,
    pub used_system_fallback: bool,
    pub provider: ProviderKind,
    pub model_name: String,
}

const SYSTEM_PROMPT: &str = "You are the PulseDesk assistant. You help an \
agency team understand and act on their managed ad accounts. Use the \
provided tools for anything factual; never invent account data.";

/// Composition root for one assistant turn: provider resolution, context
/// attachment, the model call, gated tool fan-out, and audit emission.
pub struct AgentRuntime {
    resolver: Arc<ProviderResolver>,
    registry: Arc<ToolRegistry>,
    digests: Arc<DigestBuilder>,
    model: Arc<dyn ModelClient>,
    recorder: AuditRecorder,
    settings: AgentConfig,
}

impl AgentRuntime {
    pub fn new(
        resolver: Arc<ProviderResolver>,
        registry: Arc<ToolRegistry>,
        digests: Arc<DigestBuilder>,
        model: Arc<dyn ModelClient>,
        recorder: AuditRecorder,
        settings: AgentConfig,
    ) -> Self {
        Self { resolver, registry, digests, model, recorder, settings }
    }

    pub async fn respond(&self, request: ChatRequest) -> Result<ChatResponse, OrchestratorError> {
        let tenant = &request.tenant_id;
        let actor = &request.actor_id;
        self.recorder.invocation(tenant, actor);

        let (provider, digest) = tokio::join!(
            self.resolver.resolve(tenant),
            self.digests.digest(tenant, DigestKind::Daily),
        );
        let provider = match provider {
            Ok(provider) => provider,
            Err(error) => {
                self.recorder.failed_reply(tenant, actor, &error.to_string());
                return Err(error);
            }
        };
        // An unreadable or absent digest never blocks the turn.
        let digest = match digest {
            Ok(digest) => digest,
            Err(error) => {
                tracing::warn!(tenant = tenant.as_str(), %error, "digest read failed, continuing without context");
                None
            }
        };

        let bound_tools = self.registry.tools_for_actor(request.actor_role, tenant, actor);

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if let Some(digest) = &digest {
            if let Ok(serialized) = serde_json::to_string(digest) {
                system_prompt.push_str("\n\nAgency digest for the current period (JSON):\n");
                system_prompt.push_str(&serialized);
            }
        }

        let mut messages = request.history.clone();
        messages.push(ChatMessage::user(request.message.clone()));

        let model_request = ModelRequest {
            system_prompt,
            messages,
            tools: bound_tools.iter().map(|tool| tool.descriptor()).collect(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let started = Instant::now();
        let timeout = Duration::from_secs(self.settings.model_timeout_secs);
        let response = match tokio::time::timeout(
            timeout,
            self.model.generate(&provider, model_request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                self.recorder.failed_reply(tenant, actor, &error.to_string());
                return Err(error);
            }
            Err(_) => {
                let error = OrchestratorError::ProviderTimeout {
                    timeout_secs: self.settings.model_timeout_secs,
                };
                self.recorder.failed_reply(tenant, actor, &error.to_string());
                return Err(error);
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        // The bound set is already role-filtered, so a call that does not
        // match a bound tool is rejected here without ever executing.
        let executions = response.tool_calls.into_iter().map(|call| {
            let bound = bound_tools.iter().find(|tool| tool.name() == call.name).cloned();
            async move {
                match bound {
                    Some(tool) => tool.invoke(call.arguments).await,
                    None => ToolOutcome::rejected(call.name),
                }
            }
        });
        let outcomes = join_all(executions).await;

        for outcome in &outcomes {
            self.recorder.tool_call(tenant, actor, outcome);
        }
        self.recorder.reply(
            tenant,
            actor,
            &provider,
            response.tokens_in,
            response.tokens_out,
            latency_ms,
        );

        Ok(ChatResponse {
            text: response.text,
            tool_calls_executed: outcomes,
            used_system_fallback: provider.is_system_fallback,
            provider: provider.provider,
            model_name: provider.model_name,
        })
    }
}
