use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use parcelwise_cli::commands::{config, estimate, order, pricing, status};
use parcelwise_core::config::LoadOptions;
use serde_json::Value;

const ENV_KEYS: &[&str] = &[
    "PARCELWISE_BOOKING_GRAPHQL_ENDPOINT",
    "PARCELWISE_BOOKING_AUTH_MODE",
    "PARCELWISE_BOOKING_AUTH_TOKEN",
    "PARCELWISE_BOOKING_ORGANIZATION_ID",
    "PARCELWISE_BOOKING_TIMEOUT_SECS",
    "PARCELWISE_BOOKING_IDP_TOKEN_ENDPOINT",
    "PARCELWISE_BOOKING_IDP_CLIENT_ID",
    "PARCELWISE_BOOKING_IDP_CLIENT_SECRET",
    "PARCELWISE_BOOKING_IDP_SCOPE",
    "PARCELWISE_LLM_PROVIDER",
    "PARCELWISE_LLM_API_KEY",
    "PARCELWISE_LLM_BASE_URL",
    "PARCELWISE_LLM_MODEL",
    "PARCELWISE_LLM_MAX_TOKENS",
    "PARCELWISE_LLM_TIMEOUT_SECS",
    "PARCELWISE_SERVER_BIND_ADDRESS",
    "PARCELWISE_SERVER_PORT",
    "PARCELWISE_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "PARCELWISE_SESSION_MAX_AGE_SECS",
    "PARCELWISE_SESSION_SWEEP_INTERVAL_SECS",
    "PARCELWISE_LOGGING_LEVEL",
    "PARCELWISE_LOGGING_FORMAT",
    "PARCELWISE_LOG_LEVEL",
    "PARCELWISE_LOG_FORMAT",
    "ANTHROPIC_API_KEY",
    "DISPATCH_GRAPHQL_ENDPOINT",
    "DISPATCH_AUTH_TOKEN",
    "DISPATCH_ORGANIZATION_ID",
    "USE_IDP_AUTH",
    "IDP_TOKEN_ENDPOINT",
    "IDP_CLIENT_ID",
    "IDP_CLIENT_SECRET",
    "IDP_SCOPE",
];

#[test]
fn estimate_in_mock_mode_summarizes_first_option() {
    with_env(&[], || {
        let result = estimate::run(&isolated());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert!(result.output.contains("✅ Estimate created successfully!"));
        assert!(result.output.contains("💰 Estimated Cost: $45.99"));
        assert!(result.output.contains("\"availableOrderOptions\""));
    });
}

#[test]
fn order_in_mock_mode_reports_tracking_number() {
    with_env(&[("DISPATCH_ORGANIZATION_ID", "org-test")], || {
        let result = order::run(&isolated());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert!(result.output.contains("🆔 Order ID: ORD-"));
        assert!(result.output.contains("📦 Tracking Number: TRK-"));
        assert!(result.output.contains("📊 Status: pending"));
    });
}

#[test]
fn pricing_walks_all_four_scenarios() {
    with_env(&[], || {
        let result = pricing::run(&isolated());
        assert_eq!(result.exit_code, 0);
        for scenario in 1..=4 {
            assert!(result.output.contains(&format!("📊 Scenario {scenario}: ")));
        }
        assert!(result.output.contains("🎯 Summary:"));
    });
}

#[test]
fn token_mode_without_token_is_a_config_failure() {
    with_env(&[("PARCELWISE_BOOKING_AUTH_MODE", "token")], || {
        let result = estimate::run(&isolated());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "estimate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn explicit_config_path_must_exist() {
    with_env(&[], || {
        let options = LoadOptions {
            config_path: Some("missing/parcelwise.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = status::run(&options);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn status_reports_booking_mode_and_engine() {
    with_env(&[], || {
        let result = status::run(&isolated());
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("🔐 Booking mode: mock"));
        assert!(result.output.contains("   AI available: false"));
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("parcelwise.toml");
    fs::write(
        &path,
        "[booking]\nauth_token = \"file-secret-token\"\n\n[server]\nport = 9090\n",
    )
    .expect("write config");

    with_env(&[("PARCELWISE_LLM_API_KEY", "sk-env-secret")], || {
        let options = LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = config::run(&options);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let output = &result.output;
        assert!(!output.contains("file-secret-token"));
        assert!(!output.contains("sk-env-secret"));
        assert!(output.contains(&format!(
            "- booking.auth_token = <redacted> (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- booking.auth_mode = token"));
        assert!(output.contains("- llm.api_key = <redacted> (source: env (PARCELWISE_LLM_API_KEY))"));
        assert!(output.contains("- server.port = 9090"));
        assert!(output.contains("- logging.level = info (source: default)"));
    });
}

fn isolated() -> LoadOptions {
    LoadOptions {
        config_path: Some("this/file/does/not/exist.toml".into()),
        ..LoadOptions::default()
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let previous_values: Vec<(&str, Option<String>)> =
        ENV_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in ENV_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
