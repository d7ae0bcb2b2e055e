use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::{Duration, Utc};
use serde_json::Value;
use tender_cli::commands::sweep::SweepOptions;
use tender_cli::commands::{config, doctor, migrate, sweep};
use tender_core::domain::quotation::{
    BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
};
use tender_core::domain::supplier::SupplierId;
use tender_core::store::QuotationStore;
use tender_db::{connect, migrations, SqlTenderStore};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("TENDER_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(false);
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["newly_applied"], serde_json::json!([1]));
        assert_eq!(payload["data"]["applied"], serde_json::json!([1]));
    });
}

#[test]
fn migrate_status_reports_pending_without_applying() {
    with_env(&[("TENDER_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["pending"], serde_json::json!([1]));
        assert_eq!(payload["data"]["applied"], serde_json::json!([]));
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_override() {
    with_env(&[("TENDER_LIFECYCLE_REMINDER_PERCENT", "sixty")], || {
        let result = migrate::run(false);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_rejects_non_sqlite_urls() {
    with_env(&[("TENDER_DATABASE_URL", "postgres://localhost/tender")], || {
        let result = migrate::run(false);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn sweep_closes_expired_quotations_in_a_file_database() {
    let directory = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", directory.path().join("tender.db").display());
    seed_expired_quotation(&url);

    with_env(&[("TENDER_DATABASE_URL", url.as_str())], || {
        let result = sweep::run(SweepOptions::once());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sweep");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["passes"], 1);
        assert_eq!(payload["data"]["sweep"]["examined"], 1);
        assert_eq!(payload["data"]["sweep"]["closed"], 1);
        assert!(payload["data"].get("relay").is_none(), "messaging is disabled by default");

        let again = parse_payload(&sweep::run(SweepOptions::once()).output);
        assert_eq!(again["data"]["sweep"]["examined"], 0);
    });
}

#[test]
fn sweep_returns_config_failure_when_messaging_has_no_webhook() {
    with_env(
        &[("TENDER_DATABASE_URL", "sqlite::memory:"), ("TENDER_MESSAGING_ENABLED", "true")],
        || {
            let result = sweep::run(SweepOptions::once());
            assert_eq!(result.exit_code, 2);
            assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
        },
    );
}

#[test]
fn doctor_reports_pending_migrations_as_json() {
    with_env(&[("TENDER_DATABASE_URL", "sqlite::memory:")], || {
        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");
        assert_eq!(report["overall_status"], "fail");

        let checks = report["checks"].as_array().expect("checks");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("messaging_readiness"), "pass");
        assert_eq!(status_of("database_connectivity"), "pass");
        assert_eq!(status_of("migrations_current"), "fail");
    });
}

#[test]
fn config_output_attributes_env_sources_and_redacts_tokens() {
    with_env(
        &[
            ("TENDER_DATABASE_URL", "sqlite::memory:"),
            ("TENDER_MESSAGING_AUTH_TOKEN", "bridge-secret-value"),
        ],
        || {
            let output = config::run();
            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (TENDER_DATABASE_URL))"));
            assert!(output.contains("- messaging.auth_token = <redacted>"));
            assert!(!output.contains("bridge-secret-value"));
            assert!(output.contains("- logging.format = compact (source: default)"));
        },
    );
}

fn seed_expired_quotation(url: &str) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let pool = connect(url).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = SqlTenderStore::new(pool.clone());
        let created = Utc::now() - Duration::hours(2);
        store
            .save_quotation(Quotation {
                id: QuotationId::new("QT-EXPIRED"),
                name: "Expired list".to_owned(),
                status: QuotationStatus::Open,
                deadline: Utc::now() - Duration::minutes(5),
                counter_proposal_window_minutes: 15,
                counter_proposal_reminder_percent: 67,
                invited_suppliers: vec![SupplierId::new("SP-1")],
                shopping_list_id: ShoppingListId::new("SL-1"),
                buyer_id: BuyerId::new("BY-1"),
                created_at: created,
                updated_at: created,
            })
            .await
            .expect("save quotation");
        pool.close().await;
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
        "TENDER_DATABASE_URL",
        "TENDER_DATABASE_MAX_CONNECTIONS",
        "TENDER_DATABASE_TIMEOUT_SECS",
        "TENDER_MESSAGING_ENABLED",
        "TENDER_MESSAGING_WEBHOOK_URL",
        "TENDER_MESSAGING_AUTH_TOKEN",
        "TENDER_MESSAGING_TIMEOUT_SECS",
        "TENDER_MESSAGING_MAX_RETRIES",
        "TENDER_LIFECYCLE_SWEEP_INTERVAL_SECS",
        "TENDER_LIFECYCLE_COUNTER_PROPOSAL_MINUTES",
        "TENDER_LIFECYCLE_REMINDER_PERCENT",
        "TENDER_LIFECYCLE_PORTAL_BASE_URL",
        "TENDER_SERVER_BIND_ADDRESS",
        "TENDER_SERVER_HEALTH_CHECK_PORT",
        "TENDER_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TENDER_LOGGING_LEVEL",
        "TENDER_LOGGING_FORMAT",
        "TENDER_LOG_LEVEL",
        "TENDER_LOG_FORMAT",
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
