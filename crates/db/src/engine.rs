//! SQL-backed assembly of the workflow services.
//!
//! The CLI and the server both run the engine over one pool; this is the single place that decides
//! which sink, observer and directory sit behind each service.

use std::sync::Arc;
use std::time::Duration;

use tender_core::audit::AuditSink;
use tender_core::config::AppConfig;
use tender_core::directory::CachedSupplierDirectory;
use tender_core::lifecycle::{DeadlineSweeper, LifecycleDefaults, LifecycleService};
use tender_core::notify::{NotificationRouter, NotificationSink, StoredNotificationSink};
use tender_core::observer::{NoopObserver, QuotationObserver};
use tender_core::{AdjustmentService, OfferService, ProposalService};
use tender_messaging::TenderNotifier;

use crate::directory::SqlSupplierDirectory;
use crate::outbox::{OutboxBridge, SqlOutboxRepository};
use crate::repositories::SqlTenderStore;
use crate::DbPool;

const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(300);

pub struct TenderEngine {
    pub store: Arc<SqlTenderStore>,
    pub lifecycle: Arc<LifecycleService>,
    pub offers: Arc<OfferService>,
    pub adjustments: Arc<AdjustmentService>,
    pub proposals: Arc<ProposalService>,
    pub sweeper: Arc<DeadlineSweeper>,
    pub outbox: Arc<SqlOutboxRepository>,
}

impl TenderEngine {
    /// Wires every service over `pool`. Chat messages are only queued when messaging is enabled.
    pub fn assemble(pool: DbPool, config: &AppConfig, audit: Arc<dyn AuditSink>) -> Self {
        let store = Arc::new(SqlTenderStore::new(pool.clone()));
        let portal_base_url = config.lifecycle.portal_base_url.clone();

        let notifications: Arc<dyn NotificationSink> = Arc::new(StoredNotificationSink::new(
            NotificationRouter::new(portal_base_url.clone()),
            store.clone(),
        ));

        let observer: Arc<dyn QuotationObserver> = if config.messaging.enabled {
            let directory = CachedSupplierDirectory::new(
                SqlSupplierDirectory::new(pool.clone()),
                DIRECTORY_CACHE_TTL,
            );
            Arc::new(
                TenderNotifier::new(Arc::new(OutboxBridge::new(pool.clone())), directory)
                    .with_portal_base_url(portal_base_url),
            )
        } else {
            Arc::new(NoopObserver)
        };

        let defaults = LifecycleDefaults {
            counter_proposal_minutes: config.lifecycle.default_counter_proposal_minutes,
            reminder_percent: config.lifecycle.default_reminder_percent,
        };
        let lifecycle = Arc::new(
            LifecycleService::new(
                store.clone(),
                notifications.clone(),
                observer.clone(),
                audit.clone(),
            )
            .with_defaults(defaults),
        );
        let offers = Arc::new(OfferService::new(
            store.clone(),
            notifications.clone(),
            observer,
            audit.clone(),
        ));
        let adjustments =
            Arc::new(AdjustmentService::new(store.clone(), notifications.clone(), audit.clone()));
        let proposals =
            Arc::new(ProposalService::new(store.clone(), offers.clone(), notifications, audit));
        let sweeper = Arc::new(DeadlineSweeper::new(store.clone(), lifecycle.clone()));

        Self {
            store,
            lifecycle,
            offers,
            adjustments,
            proposals,
            sweeper,
            outbox: Arc::new(SqlOutboxRepository::new(pool)),
        }
    }
}
