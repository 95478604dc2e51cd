use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

/// Supported language-model vendor families. Rows persisted before a family
/// was recognized degrade to the OpenAI-compatible handle instead of failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// OpenAI-compatible is the safe default for unrecognized families: most
    /// gateway endpoints speak that dialect.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            "gemini" | "google" => Self::Gemini,
            _ => Self::OpenAi,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Valid,
    Invalid,
}

impl CredentialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }

    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "valid" => Self::Valid,
            _ => Self::Invalid,
        }
    }
}

/// A tenant-owned provider credential as stored. The API key is held only as
/// vault ciphertext; plaintext exists transiently inside the resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderCredential {
    pub tenant_id: TenantId,
    pub provider: ProviderKind,
    pub model_name: String,
    pub api_key_ciphertext: String,
    pub status: CredentialStatus,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
