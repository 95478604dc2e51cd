use chrono::Utc;

use crate::commands::CommandResult;
use pulsedesk_core::config::{AppConfig, LoadOptions};
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_db::fixtures::demo_spend_events;
use pulsedesk_db::repositories::{SpendRepository, SqlSpendRepository};
use pulsedesk_db::{connect_with_settings, migrations};

pub fn run(tenant: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
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
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let tenant_id = TenantId(tenant.to_string());
    let window_days = i64::from(config.digest.window_days);

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        // Cover both digest comparison windows so trends are non-trivial.
        let events = demo_spend_events(&tenant_id, Utc::now(), window_days * 2);
        let count = events.len();
        SqlSpendRepository::new(pool.clone())
            .insert_batch(events)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(count)
    });

    match result {
        Ok(count) => CommandResult::success(
            "seed",
            format!("loaded {count} demo spend events for tenant `{tenant}`"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
