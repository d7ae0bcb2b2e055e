use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::item::{ItemStatus, ProductId, RequestedItem, UnitOfMeasure};
use crate::domain::quotation::{
    BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
    DEFAULT_COUNTER_PROPOSAL_MINUTES,
};
use crate::domain::supplier::SupplierId;
use crate::errors::{ApplicationError, DomainError};
use crate::lifecycle::machine::{evaluate_deadline, LifecycleEvent, LifecycleMachine};
use crate::notify::{notify_best_effort, NotificationSink, TenderEvent};
use crate::observer::QuotationObserver;
use crate::store::{StatusUpdate, TenderStore};

/// Closing may race with pause/resume on another client; after this many lost races the caller
/// gets the fresh state as an error instead of retrying forever.
const MAX_CLOSE_ATTEMPTS: usize = 3;

pub const DEFAULT_REMINDER_PERCENT: u8 = 67;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit: UnitOfMeasure,
    pub requested_quantity: Decimal,
    pub preferred_brands: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub name: String,
    pub buyer_id: BuyerId,
    pub shopping_list_id: ShoppingListId,
    pub deadline: DateTime<Utc>,
    pub invited_suppliers: Vec<SupplierId>,
    pub counter_proposal_window_minutes: Option<u32>,
    pub counter_proposal_reminder_percent: Option<u8>,
    pub items: Vec<NewItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CloseOutcome {
    /// This caller performed the transition.
    Closed { items_closed: u32 },
    /// Somebody else already closed it; nothing was written.
    AlreadyClosed,
    /// The quotation is not Open with a passed deadline.
    NotExpired,
}

impl CloseOutcome {
    pub fn items_closed(&self) -> u32 {
        match self {
            Self::Closed { items_closed } => *items_closed,
            Self::AlreadyClosed | Self::NotExpired => 0,
        }
    }
}

/// Lifecycle defaults applied to quotations that do not carry their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecycleDefaults {
    pub counter_proposal_minutes: u32,
    pub reminder_percent: u8,
}

impl Default for LifecycleDefaults {
    fn default() -> Self {
        Self {
            counter_proposal_minutes: DEFAULT_COUNTER_PROPOSAL_MINUTES,
            reminder_percent: DEFAULT_REMINDER_PERCENT,
        }
    }
}

pub struct LifecycleService {
    store: Arc<dyn TenderStore>,
    notifications: Arc<dyn NotificationSink>,
    observer: Arc<dyn QuotationObserver>,
    audit: Arc<dyn AuditSink>,
    machine: LifecycleMachine,
    defaults: LifecycleDefaults,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn TenderStore>,
        notifications: Arc<dyn NotificationSink>,
        observer: Arc<dyn QuotationObserver>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            notifications,
            observer,
            audit,
            machine: LifecycleMachine,
            defaults: LifecycleDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: LifecycleDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Publishes a quotation: it starts Open with every item Pending.
    pub async fn start(
        &self,
        draft: NewQuotation,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<Quotation, ApplicationError> {
        if draft.deadline <= now {
            return Err(DomainError::InvalidDeadline { deadline: draft.deadline, now }.into());
        }
        if draft.name.trim().is_empty() {
            return Err(DomainError::InvalidInput("quotation name must not be empty".to_owned()).into());
        }
        if draft.items.is_empty() {
            return Err(DomainError::InvalidInput("a quotation needs at least one item".to_owned()).into());
        }
        if let Some(item) = draft.items.iter().find(|item| item.requested_quantity <= Decimal::ZERO) {
            return Err(DomainError::InvalidInput(format!(
                "requested quantity for `{}` must be greater than zero",
                item.product_id
            ))
            .into());
        }

        let quotation = Quotation {
            id: QuotationId::generate(),
            name: draft.name.trim().to_owned(),
            status: QuotationStatus::Open,
            deadline: draft.deadline,
            counter_proposal_window_minutes: draft
                .counter_proposal_window_minutes
                .unwrap_or(self.defaults.counter_proposal_minutes),
            counter_proposal_reminder_percent: draft
                .counter_proposal_reminder_percent
                .unwrap_or(self.defaults.reminder_percent),
            invited_suppliers: draft.invited_suppliers,
            shopping_list_id: draft.shopping_list_id,
            buyer_id: draft.buyer_id,
            created_at: now,
            updated_at: now,
        };
        quotation.validate()?;

        self.store.save_quotation(quotation.clone()).await?;
        for item in draft.items {
            self.store
                .save_item(RequestedItem {
                    product_id: item.product_id,
                    quotation_id: quotation.id.clone(),
                    name: item.name,
                    unit: item.unit,
                    requested_quantity: item.requested_quantity,
                    preferred_brands: item.preferred_brands,
                    status: ItemStatus::Pending,
                })
                .await?;
        }

        info!(
            event_name = "lifecycle.quotation.started",
            correlation_id = %audit.correlation_id,
            quotation_id = %quotation.id,
            deadline = %quotation.deadline.to_rfc3339(),
            invited_suppliers = quotation.invited_suppliers.len(),
            "quotation started"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                audit,
                "lifecycle.quotation_started",
                AuditCategory::Lifecycle,
                AuditOutcome::Success,
            )
            .with_metadata("deadline", quotation.deadline.to_rfc3339()),
        );
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::QuotationStarted {
                quotation_id: quotation.id.clone(),
                deadline: quotation.deadline,
            },
            &audit.correlation_id,
        )
        .await;
        self.observer.quotation_started(&quotation).await;

        Ok(quotation)
    }

    pub async fn pause(
        &self,
        quotation_id: &QuotationId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<Quotation, ApplicationError> {
        self.apply_status_change(quotation_id, LifecycleEvent::Pause, now, audit).await
    }

    pub async fn resume(
        &self,
        quotation_id: &QuotationId,
        new_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<Quotation, ApplicationError> {
        self.apply_status_change(
            quotation_id,
            LifecycleEvent::Resume { deadline: new_deadline },
            now,
            audit,
        )
        .await
    }

    /// Closed to Completed, once downstream fulfilment is recorded.
    pub async fn complete(
        &self,
        quotation_id: &QuotationId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<Quotation, ApplicationError> {
        self.apply_status_change(quotation_id, LifecycleEvent::Complete, now, audit).await
    }

    pub async fn evaluate_deadline(
        &self,
        quotation_id: &QuotationId,
        now: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let quotation = self.load(quotation_id).await?;
        Ok(evaluate_deadline(&quotation, now))
    }

    /// Manual close from Open or Paused. Closing an already closed quotation is a no-op.
    pub async fn close(
        &self,
        quotation_id: &QuotationId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<CloseOutcome, ApplicationError> {
        self.close_with(quotation_id, LifecycleEvent::Close, now, audit).await
    }

    /// Deadline-driven close. Safe to call from any number of observers at once: exactly one
    /// caller gets `Closed` and runs the side effects, everyone else gets a no-op.
    pub async fn auto_close(
        &self,
        quotation_id: &QuotationId,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<CloseOutcome, ApplicationError> {
        self.close_with(quotation_id, LifecycleEvent::DeadlineExpired, now, audit).await
    }

    async fn close_with(
        &self,
        quotation_id: &QuotationId,
        event: LifecycleEvent,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<CloseOutcome, ApplicationError> {
        for _ in 0..MAX_CLOSE_ATTEMPTS {
            let quotation = self.load(quotation_id).await?;
            if quotation.status.is_terminal_for_bidding() {
                self.record_skip(&quotation, event, "already_closed", audit);
                return Ok(CloseOutcome::AlreadyClosed);
            }
            if event == LifecycleEvent::DeadlineExpired && !evaluate_deadline(&quotation, now) {
                self.record_skip(&quotation, event, "not_expired", audit);
                return Ok(CloseOutcome::NotExpired);
            }

            let transition =
                self.machine.apply_with_audit(&quotation, event, now, self.audit.as_ref(), audit)?;
            let expired_by = (event == LifecycleEvent::DeadlineExpired).then_some(now);
            let Some(items_closed) =
                self.store.close_quotation(quotation_id, transition.from, expired_by, now).await?
            else {
                // Status or deadline moved underneath us; re-read and decide again.
                continue;
            };

            let mut closed = quotation;
            closed.status = QuotationStatus::Closed;
            closed.updated_at = now;
            self.after_close(&closed, event, items_closed, audit).await;
            return Ok(CloseOutcome::Closed { items_closed });
        }

        let quotation = self.load(quotation_id).await?;
        if quotation.status.is_terminal_for_bidding() {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        Err(DomainError::InvalidQuotationTransition {
            from: quotation.status,
            to: QuotationStatus::Closed,
        }
        .into())
    }

    async fn after_close(
        &self,
        quotation: &Quotation,
        event: LifecycleEvent,
        items_closed: u32,
        audit: &AuditContext,
    ) {
        info!(
            event_name = "lifecycle.quotation.closed",
            correlation_id = %audit.correlation_id,
            quotation_id = %quotation.id,
            trigger = event.as_str(),
            items_closed,
            "quotation closed"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                audit,
                "lifecycle.quotation_closed",
                AuditCategory::Lifecycle,
                AuditOutcome::Success,
            )
            .with_metadata("trigger", event.as_str())
            .with_metadata("items_closed", items_closed.to_string()),
        );
        notify_best_effort(
            self.notifications.as_ref(),
            TenderEvent::QuotationClosed { quotation_id: quotation.id.clone(), items_closed },
            &audit.correlation_id,
        )
        .await;
        self.observer.quotation_closed(quotation, items_closed).await;
    }

    fn record_skip(
        &self,
        quotation: &Quotation,
        event: LifecycleEvent,
        reason: &str,
        audit: &AuditContext,
    ) {
        info!(
            event_name = "lifecycle.quotation.close_skipped",
            correlation_id = %audit.correlation_id,
            quotation_id = %quotation.id,
            trigger = event.as_str(),
            status = quotation.status.as_str(),
            reason,
            "close was a no-op"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quotation.id.clone()),
                audit,
                "lifecycle.close_skipped",
                AuditCategory::Lifecycle,
                AuditOutcome::Skipped,
            )
            .with_metadata("reason", reason),
        );
    }

    async fn apply_status_change(
        &self,
        quotation_id: &QuotationId,
        event: LifecycleEvent,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<Quotation, ApplicationError> {
        let quotation = self.load(quotation_id).await?;
        let transition =
            self.machine.apply_with_audit(&quotation, event, now, self.audit.as_ref(), audit)?;

        let update =
            StatusUpdate { status: transition.to, deadline: transition.deadline, updated_at: now };
        if !self.store.compare_and_set_status(quotation_id, transition.from, update).await? {
            let current = self.load(quotation_id).await?;
            warn!(
                event_name = "lifecycle.quotation.transition_conflict",
                correlation_id = %audit.correlation_id,
                quotation_id = %quotation_id,
                expected = transition.from.as_str(),
                actual = current.status.as_str(),
                "quotation status changed concurrently"
            );
            return Err(DomainError::InvalidQuotationTransition {
                from: current.status,
                to: transition.to,
            }
            .into());
        }

        info!(
            event_name = "lifecycle.quotation.transitioned",
            correlation_id = %audit.correlation_id,
            quotation_id = %quotation_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "quotation status changed"
        );

        let mut updated = quotation;
        updated.status = transition.to;
        updated.deadline = transition.deadline;
        updated.updated_at = now;
        Ok(updated)
    }

    async fn load(&self, quotation_id: &QuotationId) -> Result<Quotation, ApplicationError> {
        self.store
            .find_quotation(quotation_id)
            .await?
            .ok_or_else(|| DomainError::QuotationNotFound(quotation_id.clone()).into())
    }
}
