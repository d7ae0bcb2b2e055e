use std::sync::Arc;

use tender_core::audit::TracingAuditSink;
use tender_core::config::{AppConfig, ConfigError, LoadOptions};
use tender_db::{connect_with_config, migrations, DbPool, TenderEngine};
use tender_messaging::{bridge_from_config, BridgeError, MessagingBridge};
use thiserror::Error;
use tracing::info;

use crate::worker::SweepWorker;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub worker: Arc<SweepWorker>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("messaging bridge setup failed: {0}")]
    Messaging(#[from] BridgeError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let bridge: Option<Arc<dyn MessagingBridge>> =
        if config.messaging.enabled { Some(bridge_from_config(&config.messaging)?) } else { None };
    info!(
        event_name = "system.bootstrap.messaging",
        correlation_id = "bootstrap",
        transport_mode = if bridge.is_some() { "webhook" } else { "disabled" },
        "messaging bridge initialized"
    );

    let engine =
        Arc::new(TenderEngine::assemble(db_pool.clone(), &config, Arc::new(TracingAuditSink)));
    let worker = Arc::new(SweepWorker::new(
        engine,
        bridge,
        config.messaging.max_retries.saturating_add(1),
    ));

    Ok(Application { config, db_pool, worker })
}

#[cfg(test)]
mod tests {
    use tender_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_when_messaging_has_no_webhook() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                messaging_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("messaging.webhook_url"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_engine() {
        let directory = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", directory.path().join("tender.db").display());
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(url),
                sweep_interval_secs: Some(5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('quotation', 'requested_item', 'offer', 'outbound_message')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected tender tables to be available after bootstrap");
        assert_eq!(table_count, 4);
        assert_eq!(app.config.lifecycle.sweep_interval_secs, 5);

        let report = app.worker.run_pass(chrono::Utc::now()).await.expect("empty sweep");
        assert_eq!(report.examined, 0);

        app.db_pool.close().await;
    }
}
