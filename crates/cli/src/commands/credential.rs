use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use secrecy::SecretString;

use crate::commands::CommandResult;
use crate::CredentialCommand;
use pulsedesk_agent::validate::{HttpKeyValidator, KeyCheck, KeyValidator};
use pulsedesk_core::config::{AppConfig, LoadOptions};
use pulsedesk_core::domain::credential::{CredentialStatus, ProviderCredential, ProviderKind};
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_core::vault::CredentialVault;
use pulsedesk_db::repositories::{CredentialRepository, SqlCredentialRepository};
use pulsedesk_db::{connect_with_settings, migrations, DbPool};

pub fn run(command: CredentialCommand) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "credential",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "credential",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .context("database connection failed")?;
        migrations::run_pending(&pool).await.context("migrations failed")?;

        let message = match command {
            CredentialCommand::Set { tenant, provider, model, api_key } => {
                set(&config, &pool, &tenant, &provider, &model, api_key).await?
            }
            CredentialCommand::Validate { tenant } => validate(&config, &pool, &tenant).await?,
        };
        pool.close().await;
        Ok::<String, anyhow::Error>(message)
    });

    match result {
        Ok(message) => CommandResult::success("credential", message),
        Err(error) => CommandResult::failure("credential", "credential", format!("{error:#}"), 4),
    }
}

async fn set(
    config: &AppConfig,
    pool: &DbPool,
    tenant: &str,
    provider: &str,
    model: &str,
    api_key: String,
) -> Result<String> {
    let provider = match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => ProviderKind::OpenAi,
        "anthropic" => ProviderKind::Anthropic,
        "gemini" => ProviderKind::Gemini,
        other => bail!("unsupported provider `{other}` (expected openai|anthropic|gemini)"),
    };

    let vault = CredentialVault::new(&config.vault.master_key).context("vault key invalid")?;
    let ciphertext =
        vault.encrypt(&SecretString::from(api_key)).context("encryption failed")?;

    let now = Utc::now();
    let tenant_id = TenantId(tenant.to_string());
    SqlCredentialRepository::new(pool.clone())
        .upsert(ProviderCredential {
            tenant_id,
            provider,
            model_name: model.to_string(),
            api_key_ciphertext: ciphertext,
            status: CredentialStatus::Valid,
            is_active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .context("credential store failed")?;

    Ok(format!(
        "stored {} credential for tenant `{tenant}` (model `{model}`); running services must invalidate their resolver cache for this tenant",
        provider.as_str(),
    ))
}

async fn validate(config: &AppConfig, pool: &DbPool, tenant: &str) -> Result<String> {
    let tenant_id = TenantId(tenant.to_string());
    let repository = SqlCredentialRepository::new(pool.clone());

    let Some(credential) = repository
        .find_active(&tenant_id)
        .await
        .context("credential lookup failed")?
    else {
        bail!("tenant `{tenant}` has no active credential to validate");
    };

    let vault = CredentialVault::new(&config.vault.master_key).context("vault key invalid")?;
    let api_key = match vault.decrypt(&credential.api_key_ciphertext) {
        Ok(api_key) => api_key,
        Err(error) => {
            repository
                .mark_invalid(&tenant_id)
                .await
                .context("could not mark credential invalid")?;
            bail!("stored ciphertext failed to decrypt ({error}); credential marked invalid");
        }
    };

    let validator =
        Arc::new(HttpKeyValidator::new(Duration::from_secs(config.agent.validation_timeout_secs))
            .context("http client init failed")?);

    match validator.check(credential.provider, &api_key).await {
        KeyCheck::Valid => Ok(format!(
            "{} key for tenant `{tenant}` validated successfully",
            credential.provider.as_str(),
        )),
        KeyCheck::Unauthorized => {
            repository
                .mark_invalid(&tenant_id)
                .await
                .context("could not mark credential invalid")?;
            bail!("provider rejected the key as unauthorized; credential marked invalid");
        }
        KeyCheck::Indeterminate(detail) => Ok(format!(
            "validation was inconclusive ({detail}); credential status left unchanged",
        )),
    }
}
