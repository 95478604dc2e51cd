use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use pulsedesk_core::domain::credential::ProviderKind;

/// Outcome of probing a provider key. `Indeterminate` covers transport
/// failures and unexpected statuses; callers must not mark a credential
/// invalid on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyCheck {
    Valid,
    Unauthorized,
    Indeterminate(String),
}

#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn check(&self, provider: ProviderKind, api_key: &SecretString) -> KeyCheck;
}

const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Probes each provider family with its cheapest side-effect-free call:
/// a models listing for OpenAI and Gemini, a one-token message for
/// Anthropic. Runs off the request hot path only.
pub struct HttpKeyValidator {
    http: reqwest::Client,
}

impl HttpKeyValidator {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl KeyValidator for HttpKeyValidator {
    async fn check(&self, provider: ProviderKind, api_key: &SecretString) -> KeyCheck {
        let response = match provider {
            ProviderKind::OpenAi => {
                self.http.get(OPENAI_MODELS_URL).bearer_auth(api_key.expose_secret()).send().await
            }
            ProviderKind::Anthropic => {
                self.http
                    .post(ANTHROPIC_MESSAGES_URL)
                    .header("x-api-key", api_key.expose_secret())
                    .header("anthropic-version", "2023-06-01")
                    .json(&json!({
                        "model": "claude-3-5-haiku-latest",
                        "max_tokens": 1,
                        "messages": [{"role": "user", "content": "ping"}],
                    }))
                    .send()
                    .await
            }
            ProviderKind::Gemini => {
                self.http
                    .get(GEMINI_MODELS_URL)
                    .query(&[("key", api_key.expose_secret())])
                    .send()
                    .await
            }
        };

        match response {
            Ok(response) => {
                classify_status(response.status().as_u16(), provider == ProviderKind::Anthropic)
            }
            Err(error) => KeyCheck::Indeterminate(format!("transport error: {error}")),
        }
    }
}

/// Status classification shared by every probe. A 400 on the message-style
/// probe means authentication succeeded and only the request shape was
/// rejected, which is all the probe needs to know.
fn classify_status(status: u16, message_style_probe: bool) -> KeyCheck {
    match status {
        200..=299 => KeyCheck::Valid,
        401 | 403 => KeyCheck::Unauthorized,
        400 if message_style_probe => KeyCheck::Valid,
        other => KeyCheck::Indeterminate(format!("unexpected status {other}")),
    }
}
