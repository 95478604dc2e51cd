use std::env;
use std::sync::{Mutex, OnceLock};

use pulsedesk_cli::commands::{digest, migrate, seed};
use serde_json::Value;

// 32 zero bytes, base64.
const TEST_MASTER_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

fn valid_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("PULSEDESK_DATABASE_URL", "sqlite::memory:?cache=shared"),
        ("PULSEDESK_DATABASE_MAX_CONNECTIONS", "1"),
        ("PULSEDESK_VAULT_MASTER_KEY", TEST_MASTER_KEY),
    ]
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&valid_env(), || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_vault_key() {
    with_env(&[("PULSEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_demo_events_and_reports_the_count() {
    with_env(&valid_env(), || {
        let result = seed::run("agency-demo");
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("agency-demo"));
        assert!(message.contains("demo spend events"));
    });
}

#[test]
fn seed_reports_the_same_count_across_runs() {
    with_env(&valid_env(), || {
        let first = parse_payload(&seed::run("agency-demo").output);
        let second = parse_payload(&seed::run("agency-demo").output);

        assert_eq!(first["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn digest_builds_for_a_tenant_without_spend_data() {
    with_env(&valid_env(), || {
        let result = digest::run("agency-empty");
        assert_eq!(result.exit_code, 0, "expected digest build to succeed on empty data");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "digest");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or("").contains("0 accounts"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PULSEDESK_DATABASE_URL",
        "PULSEDESK_DATABASE_MAX_CONNECTIONS",
        "PULSEDESK_DATABASE_TIMEOUT_SECS",
        "PULSEDESK_VAULT_MASTER_KEY",
        "PULSEDESK_FALLBACK_PROVIDER",
        "PULSEDESK_FALLBACK_API_KEY",
        "PULSEDESK_FALLBACK_MODEL",
        "PULSEDESK_DIGEST_WINDOW_DAYS",
        "PULSEDESK_DIGEST_TOKEN_BUDGET",
        "PULSEDESK_AGENT_PROVIDER_CACHE_TTL_SECS",
        "PULSEDESK_AGENT_MODEL_TIMEOUT_SECS",
        "PULSEDESK_LOGGING_LEVEL",
        "PULSEDESK_LOGGING_FORMAT",
        "PULSEDESK_LOG_LEVEL",
        "PULSEDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
