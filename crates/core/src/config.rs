use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub messaging: MessagingConfig,
    pub lifecycle: LifecycleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub auth_token: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    pub sweep_interval_secs: u64,
    pub default_counter_proposal_minutes: u32,
    pub default_reminder_percent: u8,
    /// Prefix for notification deep links; relative paths are used when absent.
    pub portal_base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub messaging_enabled: Option<bool>,
    pub messaging_webhook_url: Option<String>,
    pub messaging_auth_token: Option<String>,
    pub sweep_interval_secs: Option<u64>,
    pub portal_base_url: Option<String>,
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
                url: "sqlite://tender.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            messaging: MessagingConfig {
                enabled: false,
                webhook_url: None,
                auth_token: None,
                timeout_secs: 10,
                max_retries: 3,
                base_delay_ms: 250,
                max_delay_ms: 5_000,
            },
            lifecycle: LifecycleConfig {
                sweep_interval_secs: 60,
                default_counter_proposal_minutes: 15,
                default_reminder_percent: 67,
                portal_base_url: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tender.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(messaging) = patch.messaging {
            if let Some(enabled) = messaging.enabled {
                self.messaging.enabled = enabled;
            }
            if let Some(webhook_url) = messaging.webhook_url {
                self.messaging.webhook_url = Some(webhook_url);
            }
            if let Some(token) = messaging.auth_token {
                self.messaging.auth_token = Some(secret_value(token));
            }
            if let Some(timeout_secs) = messaging.timeout_secs {
                self.messaging.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = messaging.max_retries {
                self.messaging.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = messaging.base_delay_ms {
                self.messaging.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = messaging.max_delay_ms {
                self.messaging.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(lifecycle) = patch.lifecycle {
            if let Some(sweep_interval_secs) = lifecycle.sweep_interval_secs {
                self.lifecycle.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(minutes) = lifecycle.default_counter_proposal_minutes {
                self.lifecycle.default_counter_proposal_minutes = minutes;
            }
            if let Some(percent) = lifecycle.default_reminder_percent {
                self.lifecycle.default_reminder_percent = percent;
            }
            if let Some(portal_base_url) = lifecycle.portal_base_url {
                self.lifecycle.portal_base_url = Some(portal_base_url);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TENDER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TENDER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TENDER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TENDER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TENDER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDER_MESSAGING_ENABLED") {
            self.messaging.enabled = parse_bool("TENDER_MESSAGING_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TENDER_MESSAGING_WEBHOOK_URL") {
            self.messaging.webhook_url = Some(value);
        }
        if let Some(value) = read_env("TENDER_MESSAGING_AUTH_TOKEN") {
            self.messaging.auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("TENDER_MESSAGING_TIMEOUT_SECS") {
            self.messaging.timeout_secs = parse_u64("TENDER_MESSAGING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDER_MESSAGING_MAX_RETRIES") {
            self.messaging.max_retries = parse_u32("TENDER_MESSAGING_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS") {
            self.lifecycle.sweep_interval_secs =
                parse_u64("TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDER_LIFECYCLE_COUNTER_PROPOSAL_MINUTES") {
            self.lifecycle.default_counter_proposal_minutes =
                parse_u32("TENDER_LIFECYCLE_COUNTER_PROPOSAL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("TENDER_LIFECYCLE_REMINDER_PERCENT") {
            self.lifecycle.default_reminder_percent =
                parse_u8("TENDER_LIFECYCLE_REMINDER_PERCENT", &value)?;
        }
        if let Some(value) = read_env("TENDER_LIFECYCLE_PORTAL_BASE_URL") {
            self.lifecycle.portal_base_url = Some(value);
        }

        if let Some(value) = read_env("TENDER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TENDER_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("TENDER_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("TENDER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TENDER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("TENDER_LOGGING_LEVEL").or_else(|| read_env("TENDER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TENDER_LOGGING_FORMAT").or_else(|| read_env("TENDER_LOG_FORMAT"));
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
        if let Some(enabled) = overrides.messaging_enabled {
            self.messaging.enabled = enabled;
        }
        if let Some(webhook_url) = overrides.messaging_webhook_url {
            self.messaging.webhook_url = Some(webhook_url);
        }
        if let Some(token) = overrides.messaging_auth_token {
            self.messaging.auth_token = Some(secret_value(token));
        }
        if let Some(sweep_interval_secs) = overrides.sweep_interval_secs {
            self.lifecycle.sweep_interval_secs = sweep_interval_secs;
        }
        if let Some(portal_base_url) = overrides.portal_base_url {
            self.lifecycle.portal_base_url = Some(portal_base_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_messaging(&self.messaging)?;
        validate_lifecycle(&self.lifecycle)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tender.toml"), PathBuf::from("config/tender.toml")]
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

fn validate_messaging(messaging: &MessagingConfig) -> Result<(), ConfigError> {
    if let Some(url) = &messaging.webhook_url {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(
                "messaging.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if messaging.enabled {
        let missing =
            messaging.webhook_url.as_ref().map(|url| url.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "messaging.webhook_url is required when messaging.enabled is true (set it in tender.toml or TENDER_MESSAGING_WEBHOOK_URL)"
                    .to_string(),
            ));
        }
        let blank_token = messaging
            .auth_token
            .as_ref()
            .map(|token| token.expose_secret().trim().is_empty())
            .unwrap_or(false);
        if blank_token {
            return Err(ConfigError::Validation(
                "messaging.auth_token must not be blank when set".to_string(),
            ));
        }
    }

    if messaging.timeout_secs == 0 || messaging.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "messaging.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if messaging.base_delay_ms == 0 || messaging.base_delay_ms > messaging.max_delay_ms {
        return Err(ConfigError::Validation(
            "messaging.base_delay_ms must be greater than zero and at most messaging.max_delay_ms"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_lifecycle(lifecycle: &LifecycleConfig) -> Result<(), ConfigError> {
    if lifecycle.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "lifecycle.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if lifecycle.default_counter_proposal_minutes == 0 {
        return Err(ConfigError::Validation(
            "lifecycle.default_counter_proposal_minutes must be greater than zero".to_string(),
        ));
    }

    if lifecycle.default_reminder_percent > 100 {
        return Err(ConfigError::Validation(
            "lifecycle.default_reminder_percent must be in range 0..=100".to_string(),
        ));
    }

    if let Some(base_url) = &lifecycle.portal_base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "lifecycle.portal_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.trim().parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    messaging: Option<MessagingPatch>,
    lifecycle: Option<LifecyclePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagingPatch {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    auth_token: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LifecyclePatch {
    sweep_interval_secs: Option<u64>,
    default_counter_proposal_minutes: Option<u32>,
    default_reminder_percent: Option<u8>,
    portal_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

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

        env::set_var("TEST_TENDER_WEBHOOK", "https://bridge.example.com/send");
        env::set_var("TEST_TENDER_TOKEN", "bridge-token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tender.toml");
            fs::write(
                &path,
                r#"
[messaging]
enabled = true
webhook_url = "${TEST_TENDER_WEBHOOK}"
auth_token = "${TEST_TENDER_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.messaging.webhook_url.as_deref() == Some("https://bridge.example.com/send"),
                "webhook url should be interpolated from environment",
            )?;
            ensure(
                config
                    .messaging
                    .auth_token
                    .as_ref()
                    .map(|token| token.expose_secret() == "bridge-token-from-env")
                    .unwrap_or(false),
                "auth token should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_TENDER_WEBHOOK", "TEST_TENDER_TOKEN"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_TENDER_UNSET_VAR"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("tender.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_TENDER_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "TEST_TENDER_UNSET_VAR", "error should name the missing variable")
            }
            other => Err(format!("expected MissingEnvInterpolation, got {other:?}")),
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDER_LOG_LEVEL", "warn");
        env::set_var("TENDER_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDER_LOG_LEVEL", "TENDER_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS", "45");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tender.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[lifecycle]
sweep_interval_secs = 5
default_counter_proposal_minutes = 20

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
                config.lifecycle.sweep_interval_secs == 45,
                "env sweep interval should win over file",
            )?;
            ensure(
                config.lifecycle.default_counter_proposal_minutes == 20,
                "file window should win over defaults",
            )?;
            ensure(
                config.lifecycle.default_reminder_percent == 67,
                "reminder percent should keep its default",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDER_DATABASE_URL", "TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDER_MESSAGING_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("messaging.webhook_url")
            );
            ensure(has_message, "validation failure should mention messaging.webhook_url")
        })();

        clear_vars(&["TENDER_MESSAGING_ENABLED"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDER_LIFECYCLE_REMINDER_PERCENT", "sixty");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "TENDER_LIFECYCLE_REMINDER_PERCENT",
                "error should name the offending key",
            ),
            other => Err(format!("expected InvalidEnvOverride, got {other:?}")),
        };

        clear_vars(&["TENDER_LIFECYCLE_REMINDER_PERCENT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDER_MESSAGING_AUTH_TOKEN", "bridge-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("bridge-secret-value"),
                "debug output should not contain the messaging token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDER_MESSAGING_AUTH_TOKEN"]);
        result
    }
}
