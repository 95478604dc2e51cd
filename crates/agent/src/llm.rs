use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pulsedesk_core::errors::OrchestratorError;

use crate::resolver::ResolvedProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// What the model is told about one callable tool. Derived from the bound
/// tool set, so the model never sees a tool the caller's role cannot use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDescriptor>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl ModelResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), tool_calls: Vec::new(), tokens_in: 0, tokens_out: 0 }
    }
}

/// The model-inference seam. Implementations translate a request into one
/// vendor call using the resolved provider's key and model handle.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        provider: &ResolvedProvider,
        request: ModelRequest,
    ) -> Result<ModelResponse, OrchestratorError>;
}

/// Deterministic client that replays a queue of canned responses. Used in
/// tests and local demos; records every request it receives.
#[derive(Default)]
pub struct ScriptedModelClient {
    responses: Mutex<VecDeque<Result<ModelResponse, OrchestratorError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModelClient {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<ModelResponse, OrchestratorError>>,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn generate(
        &self,
        _provider: &ResolvedProvider,
        request: ModelRequest,
    ) -> Result<ModelResponse, OrchestratorError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
        let next = match self.responses.lock() {
            Ok(mut responses) => responses.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| {
            Err(OrchestratorError::Model("scripted client ran out of responses".to_string()))
        })
    }
}
