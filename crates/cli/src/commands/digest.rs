use std::sync::Arc;

use anyhow::{Context, Result};

use crate::commands::CommandResult;
use pulsedesk_agent::digest::{DigestBuilder, NullKpiSource};
use pulsedesk_core::config::{AppConfig, LoadOptions};
use pulsedesk_core::digest::token_estimate;
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_db::repositories::{SqlDigestRepository, SqlSpendRepository};
use pulsedesk_db::{connect_with_settings, migrations};

pub fn run(tenant: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "digest",
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
                "digest",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(build(&config, &TenantId(tenant.to_string()))) {
        Ok(message) => CommandResult::success("digest", message),
        Err(error) => CommandResult::failure("digest", "digest_build", format!("{error:#}"), 4),
    }
}

async fn build(config: &AppConfig, tenant: &TenantId) -> Result<String> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .context("database connection failed")?;
    migrations::run_pending(&pool).await.context("migrations failed")?;

    let builder = DigestBuilder::new(
        Arc::new(NullKpiSource),
        Arc::new(SqlSpendRepository::new(pool.clone())),
        Arc::new(SqlDigestRepository::new(pool.clone())),
        config.digest.settings(),
    );

    let digest = builder.build_daily(tenant).await.context("digest build failed")?;
    pool.close().await;

    let serialized = serde_json::to_string(&digest).context("digest serialization failed")?;
    Ok(format!(
        "built daily digest for `{}`: period {}, {} accounts, ~{} tokens",
        tenant.as_str(),
        digest.period,
        digest.health.accounts_total,
        token_estimate(serialized.len()),
    ))
}
