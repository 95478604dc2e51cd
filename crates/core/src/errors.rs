use thiserror::Error;

/// Fatal-to-request failures that propagate up to the agent runtime. Callers
/// see one stable code plus a safe human-readable message, never a raw
/// collaborator error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("stored credential could not be decrypted")]
    CredentialDecryption,
    #[error("no usable model provider for this tenant")]
    ProviderUnavailable,
    #[error("model provider did not respond within {timeout_secs}s")]
    ProviderTimeout { timeout_secs: u64 },
    #[error("model invocation failed: {0}")]
    Model(String),
}

impl OrchestratorError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialDecryption => "credential_decryption",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::Model(_) => "model_error",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CredentialDecryption => {
                "Your saved provider key could not be read. Please re-enter it in settings."
            }
            Self::ProviderUnavailable => {
                "No AI provider is available right now. Add a provider key or contact support."
            }
            Self::ProviderTimeout { .. } => {
                "The AI provider took too long to respond. Please try again."
            }
            Self::Model(_) => "The assistant hit an unexpected provider error. Please retry.",
        }
    }

    /// Timeouts are safe for the caller to retry; everything else needs a
    /// config or credential change first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderTimeout { .. })
    }
}

/// Tool-local failures. These never cross the registry boundary as errors;
/// they are converted into structured results the model can read and react
/// to, and sibling tool calls keep running.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("input validation failed: {0}")]
    Validation(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "tool_validation",
            Self::Execution(_) => "tool_execution",
        }
    }
}
