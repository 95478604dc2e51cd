use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::DigestSettings;
use crate::domain::credential::ProviderKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub fallback: FallbackConfig,
    pub digest: DigestConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Base64 of 32 random bytes. Immutable process-wide after start.
    pub master_key: SecretString,
}

/// System-wide default provider credential, used when a tenant has no valid
/// key of its own. Requests served through it are flagged in their result
/// metadata so nobody is silently billed against the wrong expectation.
#[derive(Clone, Debug)]
pub struct FallbackConfig {
    pub provider: ProviderKind,
    pub api_key: Option<SecretString>,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct DigestConfig {
    pub window_days: u32,
    pub max_accounts: usize,
    pub max_insights: usize,
    pub max_spenders: usize,
    pub token_budget: usize,
}

impl DigestConfig {
    pub fn settings(&self) -> DigestSettings {
        DigestSettings {
            window_days: self.window_days,
            max_accounts: self.max_accounts,
            max_insights: self.max_insights,
            max_spenders: self.max_spenders,
            token_budget: self.token_budget,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider_cache_ttl_secs: u64,
    pub model_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub vault_master_key: Option<String>,
    pub fallback_provider: Option<ProviderKind>,
    pub fallback_model: Option<String>,
    pub fallback_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pulsedesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            vault: VaultConfig { master_key: String::new().into() },
            fallback: FallbackConfig {
                provider: ProviderKind::OpenAi,
                api_key: None,
                model: "gpt-4o-mini".to_string(),
            },
            digest: DigestConfig {
                window_days: 30,
                max_accounts: 5,
                max_insights: 5,
                max_spenders: 3,
                token_budget: 800,
            },
            agent: AgentConfig {
                provider_cache_ttl_secs: 60,
                model_timeout_secs: 30,
                validation_timeout_secs: 10,
                max_tokens: 1024,
                temperature: 0.2,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn parse_provider(value: &str) -> Result<ProviderKind, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(ProviderKind::OpenAi),
        "anthropic" => Ok(ProviderKind::Anthropic),
        "gemini" => Ok(ProviderKind::Gemini),
        other => Err(ConfigError::Validation(format!(
            "unsupported provider `{other}` (expected openai|anthropic|gemini)"
        ))),
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pulsedesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(vault) = patch.vault {
            if let Some(master_key_value) = vault.master_key {
                self.vault.master_key = secret_value(master_key_value);
            }
        }

        if let Some(fallback) = patch.fallback {
            if let Some(provider) = fallback.provider {
                self.fallback.provider = parse_provider(&provider)?;
            }
            if let Some(api_key_value) = fallback.api_key {
                self.fallback.api_key = Some(secret_value(api_key_value));
            }
            if let Some(model) = fallback.model {
                self.fallback.model = model;
            }
        }

        if let Some(digest) = patch.digest {
            if let Some(window_days) = digest.window_days {
                self.digest.window_days = window_days;
            }
            if let Some(max_accounts) = digest.max_accounts {
                self.digest.max_accounts = max_accounts;
            }
            if let Some(max_insights) = digest.max_insights {
                self.digest.max_insights = max_insights;
            }
            if let Some(max_spenders) = digest.max_spenders {
                self.digest.max_spenders = max_spenders;
            }
            if let Some(token_budget) = digest.token_budget {
                self.digest.token_budget = token_budget;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(ttl) = agent.provider_cache_ttl_secs {
                self.agent.provider_cache_ttl_secs = ttl;
            }
            if let Some(timeout) = agent.model_timeout_secs {
                self.agent.model_timeout_secs = timeout;
            }
            if let Some(timeout) = agent.validation_timeout_secs {
                self.agent.validation_timeout_secs = timeout;
            }
            if let Some(max_tokens) = agent.max_tokens {
                self.agent.max_tokens = max_tokens;
            }
            if let Some(temperature) = agent.temperature {
                self.agent.temperature = temperature;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PULSEDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PULSEDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PULSEDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PULSEDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PULSEDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PULSEDESK_VAULT_MASTER_KEY") {
            self.vault.master_key = secret_value(value);
        }

        if let Some(value) = read_env("PULSEDESK_FALLBACK_PROVIDER") {
            self.fallback.provider = parse_provider(&value)?;
        }
        if let Some(value) = read_env("PULSEDESK_FALLBACK_API_KEY") {
            self.fallback.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PULSEDESK_FALLBACK_MODEL") {
            self.fallback.model = value;
        }

        if let Some(value) = read_env("PULSEDESK_DIGEST_WINDOW_DAYS") {
            self.digest.window_days = parse_u32("PULSEDESK_DIGEST_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("PULSEDESK_DIGEST_TOKEN_BUDGET") {
            self.digest.token_budget =
                parse_u32("PULSEDESK_DIGEST_TOKEN_BUDGET", &value)? as usize;
        }

        if let Some(value) = read_env("PULSEDESK_AGENT_PROVIDER_CACHE_TTL_SECS") {
            self.agent.provider_cache_ttl_secs =
                parse_u64("PULSEDESK_AGENT_PROVIDER_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PULSEDESK_AGENT_MODEL_TIMEOUT_SECS") {
            self.agent.model_timeout_secs =
                parse_u64("PULSEDESK_AGENT_MODEL_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("PULSEDESK_LOGGING_LEVEL").or_else(|| read_env("PULSEDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PULSEDESK_LOGGING_FORMAT").or_else(|| read_env("PULSEDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(master_key) = overrides.vault_master_key {
            self.vault.master_key = secret_value(master_key);
        }
        if let Some(provider) = overrides.fallback_provider {
            self.fallback.provider = provider;
        }
        if let Some(model) = overrides.fallback_model {
            self.fallback.model = model;
        }
        if let Some(api_key) = overrides.fallback_api_key {
            self.fallback.api_key = Some(secret_value(api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_vault(&self.vault)?;
        validate_fallback(&self.fallback)?;
        validate_digest(&self.digest)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pulsedesk.toml"), PathBuf::from("config/pulsedesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_vault(vault: &VaultConfig) -> Result<(), ConfigError> {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let raw = vault.master_key.expose_secret().trim();
    if raw.is_empty() {
        return Err(ConfigError::Validation(
            "vault.master_key is required. Generate one with `openssl rand -base64 32`"
                .to_string(),
        ));
    }

    match BASE64.decode(raw) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(ConfigError::Validation(
            "vault.master_key must be base64 for exactly 32 bytes".to_string(),
        )),
    }
}

fn validate_fallback(fallback: &FallbackConfig) -> Result<(), ConfigError> {
    if fallback.model.trim().is_empty() {
        return Err(ConfigError::Validation("fallback.model must not be empty".to_string()));
    }

    // A missing fallback key is allowed: tenants with their own credentials
    // still work, and resolve() reports ProviderUnavailable for the rest.
    if let Some(api_key) = &fallback.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "fallback.api_key must not be empty when present".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_digest(digest: &DigestConfig) -> Result<(), ConfigError> {
    if digest.window_days == 0 || digest.window_days > 365 {
        return Err(ConfigError::Validation(
            "digest.window_days must be in range 1..=365".to_string(),
        ));
    }
    if digest.max_accounts == 0 || digest.max_insights == 0 || digest.max_spenders == 0 {
        return Err(ConfigError::Validation(
            "digest list caps must be greater than zero".to_string(),
        ));
    }
    if digest.token_budget == 0 {
        return Err(ConfigError::Validation(
            "digest.token_budget must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.provider_cache_ttl_secs == 0 || agent.provider_cache_ttl_secs > 3600 {
        return Err(ConfigError::Validation(
            "agent.provider_cache_ttl_secs must be in range 1..=3600".to_string(),
        ));
    }
    if agent.model_timeout_secs == 0 || agent.model_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.model_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if agent.validation_timeout_secs == 0 || agent.validation_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "agent.validation_timeout_secs must be in range 1..=60".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&agent.temperature) {
        return Err(ConfigError::Validation(
            "agent.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    vault: Option<VaultPatch>,
    fallback: Option<FallbackPatch>,
    digest: Option<DigestPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VaultPatch {
    master_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FallbackPatch {
    provider: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DigestPatch {
    window_days: Option<u32>,
    max_accounts: Option<usize>,
    max_insights: Option<usize>,
    max_spenders: Option<usize>,
    token_budget: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    provider_cache_ttl_secs: Option<u64>,
    model_timeout_secs: Option<u64>,
    validation_timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use crate::domain::credential::ProviderKind;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn valid_key() -> String {
        BASE64.encode([3u8; 32])
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_VAULT_MASTER_KEY", valid_key());

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pulsedesk.toml");
            fs::write(
                &path,
                r#"
[vault]
master_key = "${TEST_VAULT_MASTER_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.vault.master_key.expose_secret() == valid_key(),
                "master key should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_VAULT_MASTER_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PULSEDESK_VAULT_MASTER_KEY", valid_key());
        env::set_var("PULSEDESK_LOG_LEVEL", "warn");
        env::set_var("PULSEDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&[
            "PULSEDESK_VAULT_MASTER_KEY",
            "PULSEDESK_LOG_LEVEL",
            "PULSEDESK_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PULSEDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PULSEDESK_VAULT_MASTER_KEY", valid_key());

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pulsedesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[fallback]
provider = "anthropic"
model = "claude-haiku"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.fallback.provider == ProviderKind::Anthropic,
                "file fallback provider should apply",
            )?;
            ensure(config.fallback.model == "claude-haiku", "file fallback model should apply")
        })();

        clear_vars(&["PULSEDESK_DATABASE_URL", "PULSEDESK_VAULT_MASTER_KEY"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PULSEDESK_VAULT_MASTER_KEY", "not-base64!!");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("vault.master_key")
            );
            ensure(has_message, "validation failure should mention vault.master_key")
        })();

        clear_vars(&["PULSEDESK_VAULT_MASTER_KEY"]);
        result
    }

    #[test]
    fn unknown_provider_in_env_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PULSEDESK_VAULT_MASTER_KEY", valid_key());
        env::set_var("PULSEDESK_FALLBACK_PROVIDER", "mistral");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected provider rejection".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("mistral")),
                "unknown provider should be named in the error",
            )
        })();

        clear_vars(&["PULSEDESK_VAULT_MASTER_KEY", "PULSEDESK_FALLBACK_PROVIDER"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PULSEDESK_VAULT_MASTER_KEY", valid_key());
        env::set_var("PULSEDESK_FALLBACK_API_KEY", "sk-fallback-secret");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("sk-fallback-secret"),
                "debug output should not contain the fallback key",
            )?;
            ensure(!debug.contains(&valid_key()), "debug output should not contain the master key")
        })();

        clear_vars(&["PULSEDESK_VAULT_MASTER_KEY", "PULSEDESK_FALLBACK_API_KEY"]);
        result
    }
}
