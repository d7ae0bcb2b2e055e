use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tender_core::audit::TracingAuditSink;
use tender_core::config::AppConfig;
use tender_core::lifecycle::SweepReport;
use tender_db::{connect_with_config, migrations, relay_pending, RelayReport, TenderEngine};
use tender_messaging::{bridge_from_config, MessagingBridge};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{build_runtime, load_config, CommandResult};

#[derive(Clone, Copy, Debug)]
pub struct SweepOptions {
    pub watch: bool,
    pub interval_secs: Option<u64>,
    pub relay_limit: u32,
}

impl SweepOptions {
    pub fn once() -> Self {
        Self { watch: false, interval_secs: None, relay_limit: 100 }
    }
}

#[derive(Debug, Default, Serialize)]
struct SweepTotals {
    passes: u32,
    sweep: SweepReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    relay: Option<RelayReport>,
}

impl SweepTotals {
    fn absorb(&mut self, sweep: SweepReport, relay: Option<RelayReport>) {
        self.passes = self.passes.saturating_add(1);
        self.sweep.examined = self.sweep.examined.saturating_add(sweep.examined);
        self.sweep.closed = self.sweep.closed.saturating_add(sweep.closed);
        self.sweep.items_closed = self.sweep.items_closed.saturating_add(sweep.items_closed);
        self.sweep.already_closed = self.sweep.already_closed.saturating_add(sweep.already_closed);
        self.sweep.not_expired = self.sweep.not_expired.saturating_add(sweep.not_expired);
        self.sweep.failures = self.sweep.failures.saturating_add(sweep.failures);
        if let Some(relay) = relay {
            let total = self.relay.get_or_insert_with(RelayReport::default);
            total.attempted = total.attempted.saturating_add(relay.attempted);
            total.sent = total.sent.saturating_add(relay.sent);
            total.retrying = total.retrying.saturating_add(relay.retrying);
            total.failed = total.failed.saturating_add(relay.failed);
        }
    }
}

pub fn run(options: SweepOptions) -> CommandResult {
    let config = match load_config("sweep") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("sweep") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    if options.watch {
        init_stderr_logging(&config);
    }

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let bridge = if config.messaging.enabled {
            Some(
                bridge_from_config(&config.messaging)
                    .map_err(|error| ("messaging", error.to_string(), 6u8))?,
            )
        } else {
            None
        };
        let engine = TenderEngine::assemble(pool.clone(), &config, Arc::new(TracingAuditSink));
        let max_attempts = config.messaging.max_retries.saturating_add(1);

        let mut totals = SweepTotals::default();
        if options.watch {
            let interval = options.interval_secs.unwrap_or(config.lifecycle.sweep_interval_secs);
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(event_name = "cli.sweep.watching", interval_secs = interval, "watching deadlines");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        match sweep_once(&engine, bridge.as_deref(), options.relay_limit, max_attempts).await {
                            Ok((sweep, relay)) => totals.absorb(sweep, relay),
                            Err((_, message, _)) => warn!(
                                event_name = "cli.sweep.pass_failed",
                                error = %message,
                                "sweep pass failed; retrying on next tick"
                            ),
                        }
                    }
                }
            }
        } else {
            let (sweep, relay) =
                sweep_once(&engine, bridge.as_deref(), options.relay_limit, max_attempts).await?;
            totals.absorb(sweep, relay);
        }

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(totals)
    });

    match result {
        Ok(totals) => {
            let message = format!(
                "closed {} of {} expired quotation(s), {} item(s) moved to review",
                totals.sweep.closed, totals.sweep.examined, totals.sweep.items_closed
            );
            let data = serde_json::to_value(&totals).unwrap_or_else(|_| json!({}));
            CommandResult::success_with("sweep", message, Some(data))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}

async fn sweep_once(
    engine: &TenderEngine,
    bridge: Option<&dyn MessagingBridge>,
    relay_limit: u32,
    max_attempts: u32,
) -> Result<(SweepReport, Option<RelayReport>), (&'static str, String, u8)> {
    let now = Utc::now();
    let sweep =
        engine.sweeper.sweep(now).await.map_err(|error| ("sweep", error.to_string(), 7u8))?;
    let relay = match bridge {
        Some(bridge) => Some(
            relay_pending(&engine.outbox, bridge, relay_limit, max_attempts, now)
                .await
                .map_err(|error| ("outbox", error.to_string(), 7u8))?,
        ),
        None => None,
    };
    Ok((sweep, relay))
}

fn init_stderr_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
