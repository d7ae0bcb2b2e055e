use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tender_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct FieldSpec<'a> {
    key_path: &'static str,
    env_key: &'static str,
    value: &'a str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let max_connections = config.database.max_connections.to_string();
    let db_timeout = config.database.timeout_secs.to_string();
    let messaging_enabled = config.messaging.enabled.to_string();
    let auth_token = if config.messaging.auth_token.is_some() { "<redacted>" } else { "<unset>" };
    let messaging_timeout = config.messaging.timeout_secs.to_string();
    let max_retries = config.messaging.max_retries.to_string();
    let sweep_interval = config.lifecycle.sweep_interval_secs.to_string();
    let window_minutes = config.lifecycle.default_counter_proposal_minutes.to_string();
    let reminder_percent = config.lifecycle.default_reminder_percent.to_string();
    let health_port = config.server.health_check_port.to_string();
    let shutdown_secs = config.server.graceful_shutdown_secs.to_string();

    let fields = [
        FieldSpec {
            key_path: "database.url",
            env_key: "TENDER_DATABASE_URL",
            value: &config.database.url,
        },
        FieldSpec {
            key_path: "database.max_connections",
            env_key: "TENDER_DATABASE_MAX_CONNECTIONS",
            value: &max_connections,
        },
        FieldSpec {
            key_path: "database.timeout_secs",
            env_key: "TENDER_DATABASE_TIMEOUT_SECS",
            value: &db_timeout,
        },
        FieldSpec {
            key_path: "messaging.enabled",
            env_key: "TENDER_MESSAGING_ENABLED",
            value: &messaging_enabled,
        },
        FieldSpec {
            key_path: "messaging.webhook_url",
            env_key: "TENDER_MESSAGING_WEBHOOK_URL",
            value: config.messaging.webhook_url.as_deref().unwrap_or("<unset>"),
        },
        FieldSpec {
            key_path: "messaging.auth_token",
            env_key: "TENDER_MESSAGING_AUTH_TOKEN",
            value: auth_token,
        },
        FieldSpec {
            key_path: "messaging.timeout_secs",
            env_key: "TENDER_MESSAGING_TIMEOUT_SECS",
            value: &messaging_timeout,
        },
        FieldSpec {
            key_path: "messaging.max_retries",
            env_key: "TENDER_MESSAGING_MAX_RETRIES",
            value: &max_retries,
        },
        FieldSpec {
            key_path: "lifecycle.sweep_interval_secs",
            env_key: "TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS",
            value: &sweep_interval,
        },
        FieldSpec {
            key_path: "lifecycle.default_counter_proposal_minutes",
            env_key: "TENDER_LIFECYCLE_COUNTER_PROPOSAL_MINUTES",
            value: &window_minutes,
        },
        FieldSpec {
            key_path: "lifecycle.default_reminder_percent",
            env_key: "TENDER_LIFECYCLE_REMINDER_PERCENT",
            value: &reminder_percent,
        },
        FieldSpec {
            key_path: "lifecycle.portal_base_url",
            env_key: "TENDER_LIFECYCLE_PORTAL_BASE_URL",
            value: config.lifecycle.portal_base_url.as_deref().unwrap_or("<unset>"),
        },
        FieldSpec {
            key_path: "server.bind_address",
            env_key: "TENDER_SERVER_BIND_ADDRESS",
            value: &config.server.bind_address,
        },
        FieldSpec {
            key_path: "server.health_check_port",
            env_key: "TENDER_SERVER_HEALTH_CHECK_PORT",
            value: &health_port,
        },
        FieldSpec {
            key_path: "server.graceful_shutdown_secs",
            env_key: "TENDER_SERVER_GRACEFUL_SHUTDOWN_SECS",
            value: &shutdown_secs,
        },
        FieldSpec {
            key_path: "logging.level",
            env_key: "TENDER_LOGGING_LEVEL",
            value: &config.logging.level,
        },
        FieldSpec {
            key_path: "logging.format",
            env_key: "TENDER_LOGGING_FORMAT",
            value: config.logging.format.as_str(),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        lines.push(render_line(
            field.key_path,
            field.value,
            field_source(
                field.key_path,
                field.env_key,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tender.toml"), PathBuf::from("config/tender.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc: toml::Value =
            "[lifecycle]\nsweep_interval_secs = 30\n".parse().expect("valid toml");
        assert!(contains_path(&doc, "lifecycle.sweep_interval_secs"));
        assert!(!contains_path(&doc, "lifecycle.portal_base_url"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
