pub mod audit;
pub mod digest;
pub mod llm;
pub mod resolver;
pub mod runtime;
pub mod tools;
pub mod validate;

pub use audit::AuditRecorder;
pub use digest::{DigestBuilder, DigestError, KpiError, KpiSource};
pub use llm::{
    ChatMessage, MessageRole, ModelClient, ModelRequest, ModelResponse, ScriptedModelClient,
    ToolCallRequest, ToolDescriptor,
};
pub use resolver::{ProviderResolver, ResolvedProvider};
pub use runtime::{AgentRuntime, ChatRequest, ChatResponse};
pub use tools::{BoundTool, TenantContext, ToolDeps, ToolOutcome, ToolRegistry, ToolSpec};
pub use validate::{HttpKeyValidator, KeyCheck, KeyValidator};
