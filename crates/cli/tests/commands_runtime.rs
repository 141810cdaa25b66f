use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use landlord_cli::commands::doctor::{build_report, CheckStatus};
use landlord_cli::commands::screen::ScreenArgs;
use landlord_cli::commands::{chat, config, doctor, screen};
use landlord_core::config::{ConfigOverrides, LoadOptions};
use serde_json::Value;

fn applicant(employment_status: &str) -> ScreenArgs {
    ScreenArgs {
        credit_score: 750,
        income: 5000.0,
        rent: 1200.0,
        employment_status: employment_status.to_string(),
        eviction_record: false,
    }
}

#[test]
fn screen_accepts_a_strong_applicant() {
    let result = screen::run(&applicant("employed"));
    assert_eq!(result.exit_code, 0, "expected successful screening");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "screen");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["data"]["recommendation"], "Accept");
    assert_eq!(payload["data"]["risk_score"], 0);
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("✅ **Tenant Approved:**"));
}

#[test]
fn screen_rejects_blank_employment_status() {
    let result = screen::run(&applicant("   "));
    assert_eq!(result.exit_code, 2, "expected input validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "invalid_input");
    assert!(payload["message"].as_str().unwrap_or_default().contains("employment_status"));
}

#[test]
fn config_redacts_api_key_and_names_env_source() {
    with_env(
        &[("LANDLORD_LLM_PROVIDER", "openai"), ("LANDLORD_LLM_API_KEY", "sk-super-secret")],
        || {
            let output = config::run(LoadOptions::default());

            assert!(output.starts_with("effective config"));
            assert!(
                output.contains("- llm.provider = openai (source: env (LANDLORD_LLM_PROVIDER))")
            );
            assert!(output.contains("- llm.api_key = sk-*** (source: env (LANDLORD_LLM_API_KEY))"));
            assert!(output.contains("- server.port = 8080 (source: default)"));
            assert!(!output.contains("super-secret"));
        },
    );
}

#[test]
fn config_reports_file_sources() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("landlord.toml");
        fs::write(&path, "[server]\nport = 9090\n").expect("write config");

        let output = config::run(file_options(path.clone()));

        assert!(output.contains(&format!(
            "- server.port = 9090 (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- logging.level = info (source: default)"));
    });
}

#[test]
fn doctor_skips_unset_artefacts_and_passes() {
    with_env(&[], || {
        let report = build_report(LoadOptions::default());

        assert_eq!(report.overall_status, CheckStatus::Pass);
        let rent = report.checks.iter().find(|check| check.name == "rent_model");
        assert_eq!(rent.map(|check| check.status), Some(CheckStatus::Skipped));
    });
}

#[test]
fn doctor_fails_when_a_configured_model_is_missing() {
    with_env(&[], || {
        let options = LoadOptions {
            overrides: ConfigOverrides {
                rent_model_path: Some(PathBuf::from("/nonexistent/rent_model.json")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };

        let (passed, output) = doctor::run(options, true);

        assert!(!passed);
        let payload = parse_payload(&output);
        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        assert!(checks
            .iter()
            .any(|check| check["name"] == "resource_loading" && check["status"] == "fail"));
    });
}

#[test]
fn doctor_passes_with_every_artefact_present() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("address_map.json"), r#"{"Kensington": 1}"#).expect("write");
        fs::write(dir.path().join("subdistrict_code_map.json"), r#"{"W86AB": 2}"#).expect("write");
        fs::write(dir.path().join("property_type_map.json"), r#"{"Flat": 3}"#).expect("write");
        let model = dir.path().join("rent_model.json");
        fs::write(&model, r#"{"model_id":"rent-v1","intercept":7.0,"weights":{}}"#)
            .expect("write");

        let options = LoadOptions {
            overrides: ConfigOverrides {
                rent_model_path: Some(model),
                lookup_dir: Some(dir.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };
        let report = build_report(options);

        assert_eq!(report.overall_status, CheckStatus::Pass);
        let loading = report.checks.iter().find(|check| check.name == "resource_loading");
        assert!(loading.is_some_and(|check| check.details.contains("rent_model=true")));
    });
}

#[test]
fn chat_greeting_creates_and_updates_the_session_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("session.json");

        let result = chat::run(LoadOptions::default(), &state, "hello");
        assert_eq!(result.exit_code, 0, "expected greeting turn to succeed");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["data"]["action"], "greeting");

        let session = chat::ChatSession::load(&state).expect("session saved");
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.state.active_task, None);

        let second = chat::run(LoadOptions::default(), &state, "thanks");
        assert_eq!(second.exit_code, 0);
        let session = chat::ChatSession::load(&state).expect("session saved");
        assert_eq!(session.history.len(), 4);
    });
}

#[test]
fn chat_rejects_a_corrupt_session_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("session.json");
        fs::write(&state, "not json").expect("write");

        let result = chat::run(LoadOptions::default(), &state, "hello");

        assert_eq!(result.exit_code, 4);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "session");
    });
}

#[test]
fn chat_reports_unloadable_artefacts_as_resource_failure() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("session.json");
        let options = LoadOptions {
            overrides: ConfigOverrides {
                rent_model_path: Some(PathBuf::from("/nonexistent/rent_model.json")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };

        let result = chat::run(options, &state, "hello");

        assert_eq!(result.exit_code, 3);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "resources");
        assert!(payload["message"].as_str().unwrap_or_default().contains("rent_model.json"));
        assert!(!state.exists());
    });
}

#[test]
fn chat_rejects_an_invalid_config_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("landlord.toml");
        fs::write(&path, "[server]\nport = 0\n").expect("write config");

        let result = chat::run(file_options(path), &dir.path().join("session.json"), "hello");

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn file_options(path: PathBuf) -> LoadOptions {
    LoadOptions { config_path: Some(path), require_file: true, ..LoadOptions::default() }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LANDLORD_LLM_PROVIDER",
        "LANDLORD_LLM_API_KEY",
        "LANDLORD_LLM_BASE_URL",
        "LANDLORD_LLM_MODEL",
        "LANDLORD_LLM_TIMEOUT_SECS",
        "LANDLORD_LLM_TEMPERATURE",
        "LANDLORD_SERVER_BIND_ADDRESS",
        "LANDLORD_SERVER_PORT",
        "LANDLORD_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LANDLORD_RESOURCES_RENT_MODEL_PATH",
        "LANDLORD_RESOURCES_MAINTENANCE_MODEL_PATH",
        "LANDLORD_RESOURCES_LOOKUP_DIR",
        "LANDLORD_RESOURCES_LISTINGS_PATH",
        "LANDLORD_DIALOGUE_HISTORY_WINDOW",
        "LANDLORD_DIALOGUE_LONG_MESSAGE_WORDS",
        "LANDLORD_LOGGING_LEVEL",
        "LANDLORD_LOGGING_FORMAT",
        "LANDLORD_LOG_LEVEL",
        "LANDLORD_LOG_FORMAT",
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
