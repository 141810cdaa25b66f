use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use landlord_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, FALLBACK_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let explicit = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let path = explicit.or_else(detect_config_path);
    let doc = load_config_file_doc(path.as_deref());
    render(&config, doc.as_ref(), path.as_deref())
}

/// One line per effective setting, with where its value came from. Secrets never print.
pub fn render(config: &AppConfig, doc: Option<&Value>, path: Option<&Path>) -> String {
    let path_text = |value: &Option<PathBuf>| {
        value.as_ref().map_or_else(|| "<unset>".to_string(), |path| path.display().to_string())
    };
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map_or_else(|| "<unset>".to_string(), |key| redact_secret(key.expose_secret()));

    let entries: Vec<(&str, String, &str)> = vec![
        ("llm.provider", config.llm.provider.as_str().to_string(), "LANDLORD_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "LANDLORD_LLM_MODEL"),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "LANDLORD_LLM_BASE_URL",
        ),
        ("llm.api_key", api_key, "LANDLORD_LLM_API_KEY"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "LANDLORD_LLM_TIMEOUT_SECS"),
        ("llm.temperature", config.llm.temperature.to_string(), "LANDLORD_LLM_TEMPERATURE"),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            "LANDLORD_SERVER_BIND_ADDRESS",
        ),
        ("server.port", config.server.port.to_string(), "LANDLORD_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "LANDLORD_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        (
            "resources.rent_model_path",
            path_text(&config.resources.rent_model_path),
            "LANDLORD_RESOURCES_RENT_MODEL_PATH",
        ),
        (
            "resources.maintenance_model_path",
            path_text(&config.resources.maintenance_model_path),
            "LANDLORD_RESOURCES_MAINTENANCE_MODEL_PATH",
        ),
        (
            "resources.lookup_dir",
            path_text(&config.resources.lookup_dir),
            "LANDLORD_RESOURCES_LOOKUP_DIR",
        ),
        (
            "resources.listings_path",
            path_text(&config.resources.listings_path),
            "LANDLORD_RESOURCES_LISTINGS_PATH",
        ),
        (
            "dialogue.history_window",
            config.dialogue.history_window.to_string(),
            "LANDLORD_DIALOGUE_HISTORY_WINDOW",
        ),
        (
            "dialogue.long_message_words",
            config.dialogue.long_message_words.to_string(),
            "LANDLORD_DIALOGUE_LONG_MESSAGE_WORDS",
        ),
        ("logging.level", config.logging.level.clone(), "LANDLORD_LOGGING_LEVEL"),
        ("logging.format", config.logging.format.as_str().to_string(), "LANDLORD_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        lines.push(render_line(key, &value, field_source(key, env_key, doc, path)));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILE, FALLBACK_CONFIG_FILE].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_key: &str, doc: Option<&Value>, path: Option<&Path>) -> String {
    if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
        return format!("env ({env_key})");
    }

    if doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file = path.map_or_else(|| "config file".to_string(), |p| p.display().to_string());
        return format!("file ({file})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
