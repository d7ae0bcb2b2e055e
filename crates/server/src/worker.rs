//! Background deadline sweeps plus outbox relay, with a status snapshot for `/health`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tender_core::lifecycle::SweepReport;
use tender_db::{relay_pending, RelayReport, TenderEngine};
use tender_messaging::MessagingBridge;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

const RELAY_BATCH: u32 = 100;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("deadline sweep failed: {0}")]
    Sweep(String),
    #[error("outbox relay failed: {0}")]
    Relay(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepStatus {
    pub passes: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
    pub last_relay: Option<RelayReport>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl SweepStatus {
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }
}

pub type SweepStatusHandle = Arc<RwLock<SweepStatus>>;

pub struct SweepWorker {
    engine: Arc<TenderEngine>,
    bridge: Option<Arc<dyn MessagingBridge>>,
    max_attempts: u32,
    status: SweepStatusHandle,
}

impl SweepWorker {
    pub fn new(
        engine: Arc<TenderEngine>,
        bridge: Option<Arc<dyn MessagingBridge>>,
        max_attempts: u32,
    ) -> Self {
        Self { engine, bridge, max_attempts, status: SweepStatusHandle::default() }
    }

    pub fn status(&self) -> SweepStatusHandle {
        self.status.clone()
    }

    /// One sweep followed by one relay batch; the outcome is recorded in the status snapshot.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<SweepReport, WorkerError> {
        let outcome = self.sweep_and_relay(now).await;
        let mut status = self.status.write().await;
        status.passes = status.passes.saturating_add(1);
        match &outcome {
            Ok((report, relay)) => {
                status.last_completed_at = Some(now);
                status.last_report = Some(report.clone());
                status.last_relay = *relay;
                status.consecutive_failures = 0;
                status.last_error = None;
            }
            Err(error) => {
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                status.last_error = Some(error.to_string());
            }
        }
        outcome.map(|(report, _)| report)
    }

    async fn sweep_and_relay(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(SweepReport, Option<RelayReport>), WorkerError> {
        let report = self
            .engine
            .sweeper
            .sweep(now)
            .await
            .map_err(|error| WorkerError::Sweep(error.to_string()))?;

        let relay = match &self.bridge {
            Some(bridge) => Some(
                relay_pending(
                    &self.engine.outbox,
                    bridge.as_ref(),
                    RELAY_BATCH,
                    self.max_attempts,
                    now,
                )
                .await
                .map_err(|error| WorkerError::Relay(error.to_string()))?,
            ),
            None => None,
        };
        Ok((report, relay))
    }

    /// Runs passes every `interval` until `shutdown` flips to `true`.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            event_name = "system.worker.start",
            correlation_id = "bootstrap",
            interval_secs = interval.as_secs(),
            "deadline sweep worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.run_pass(Utc::now()).await {
                        warn!(
                            event_name = "system.worker.pass_failed",
                            correlation_id = "worker",
                            error = %error,
                            "sweep pass failed; retrying on next tick"
                        );
                    }
                }
            }
        }

        info!(
            event_name = "system.worker.stopped",
            correlation_id = "shutdown",
            "deadline sweep worker stopped"
        );
    }
}
