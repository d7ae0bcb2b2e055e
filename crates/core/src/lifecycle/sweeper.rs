use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::AuditContext;
use crate::errors::ApplicationError;
use crate::lifecycle::service::{CloseOutcome, LifecycleService};
use crate::store::QuotationStore;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: u32,
    pub closed: u32,
    pub items_closed: u32,
    pub already_closed: u32,
    /// Listed as expired but resumed with a later deadline before the close ran.
    pub not_expired: u32,
    pub failures: u32,
}

/// Closes every Open quotation whose deadline has passed.
///
/// Any number of sweepers, and any number of clients calling `auto_close` directly, may run at
/// the same time: the store's conditional close picks exactly one winner per quotation.
pub struct DeadlineSweeper {
    store: Arc<dyn QuotationStore>,
    lifecycle: Arc<LifecycleService>,
}

impl DeadlineSweeper {
    pub fn new(store: Arc<dyn QuotationStore>, lifecycle: Arc<LifecycleService>) -> Self {
        Self { store, lifecycle }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ApplicationError> {
        let audit = AuditContext::system(format!("sweep-{}", now.timestamp_millis()));
        let expired = self.store.list_expired(now).await?;
        let mut report = SweepReport::default();

        for quotation in expired {
            report.examined = report.examined.saturating_add(1);
            match self.lifecycle.auto_close(&quotation.id, now, &audit).await {
                Ok(CloseOutcome::Closed { items_closed }) => {
                    report.closed = report.closed.saturating_add(1);
                    report.items_closed = report.items_closed.saturating_add(items_closed);
                }
                Ok(CloseOutcome::AlreadyClosed) => {
                    report.already_closed = report.already_closed.saturating_add(1);
                }
                Ok(CloseOutcome::NotExpired) => {
                    report.not_expired = report.not_expired.saturating_add(1);
                }
                Err(error) => {
                    report.failures = report.failures.saturating_add(1);
                    warn!(
                        event_name = "lifecycle.sweep.close_failed",
                        correlation_id = %audit.correlation_id,
                        quotation_id = %quotation.id,
                        error = %error,
                        "failed to close expired quotation"
                    );
                }
            }
        }

        info!(
            event_name = "lifecycle.sweep.completed",
            correlation_id = %audit.correlation_id,
            examined = report.examined,
            closed = report.closed,
            items_closed = report.items_closed,
            already_closed = report.already_closed,
            not_expired = report.not_expired,
            failures = report.failures,
            "deadline sweep completed"
        );
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` resolves.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(event_name = "lifecycle.sweep.stopped", "deadline sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep(Utc::now()).await {
                        warn!(
                            event_name = "lifecycle.sweep.failed",
                            error = %error,
                            "deadline sweep failed; retrying on next tick"
                        );
                    }
                }
            }
        }
    }
}
