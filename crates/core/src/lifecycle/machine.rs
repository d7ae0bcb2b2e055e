use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::quotation::{Quotation, QuotationStatus};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Pause,
    Resume { deadline: DateTime<Utc> },
    Close,
    DeadlineExpired,
    Complete,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume { .. } => "resume",
            Self::Close => "close",
            Self::DeadlineExpired => "deadline_expired",
            Self::Complete => "complete",
        }
    }

    fn target(&self) -> QuotationStatus {
        match self {
            Self::Pause => QuotationStatus::Paused,
            Self::Resume { .. } => QuotationStatus::Open,
            Self::Close | Self::DeadlineExpired => QuotationStatus::Closed,
            Self::Complete => QuotationStatus::Completed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTransition {
    pub from: QuotationStatus,
    pub to: QuotationStatus,
    pub event: LifecycleEvent,
    /// Deadline after the transition; unchanged except on resume.
    pub deadline: DateTime<Utc>,
}

/// `true` iff the quotation is Open and its deadline is at or before `now`.
///
/// Paused quotations never expire: their deadline is kept but not evaluated.
pub fn evaluate_deadline(quotation: &Quotation, now: DateTime<Utc>) -> bool {
    quotation.status == QuotationStatus::Open && quotation.deadline <= now
}

pub fn transition(
    quotation: &Quotation,
    event: LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<LifecycleTransition, DomainError> {
    use LifecycleEvent::{Close, Complete, DeadlineExpired, Pause, Resume};
    use QuotationStatus::{Closed, Completed, Open, Paused};

    let from = quotation.status;
    let rejected = || DomainError::InvalidQuotationTransition { from, to: event.target() };

    let (to, deadline) = match (from, event) {
        (Open, Pause) => (Paused, quotation.deadline),
        (Paused, Resume { deadline }) => {
            if deadline <= now {
                return Err(DomainError::InvalidDeadline { deadline, now });
            }
            (Open, deadline)
        }
        (Open, Close) | (Paused, Close) => (Closed, quotation.deadline),
        (Open, DeadlineExpired) => {
            if !evaluate_deadline(quotation, now) {
                return Err(rejected());
            }
            (Closed, quotation.deadline)
        }
        (Closed, Complete) => (Completed, quotation.deadline),
        (Open | Paused | Closed | Completed, _) => return Err(rejected()),
    };

    Ok(LifecycleTransition { from, to, event, deadline })
}

/// Applies lifecycle transitions and records each attempt in the audit trail.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleMachine;

impl LifecycleMachine {
    pub fn apply(
        &self,
        quotation: &Quotation,
        event: LifecycleEvent,
        now: DateTime<Utc>,
    ) -> Result<LifecycleTransition, DomainError> {
        transition(quotation, event, now)
    }

    pub fn apply_with_audit<S>(
        &self,
        quotation: &Quotation,
        event: LifecycleEvent,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<LifecycleTransition, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(quotation, event, now);
        match &result {
            Ok(outcome) => sink.emit(
                AuditEvent::new(
                    Some(quotation.id.clone()),
                    audit,
                    "lifecycle.transition_applied",
                    AuditCategory::Lifecycle,
                    AuditOutcome::Success,
                )
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str())
                .with_metadata("event", event.as_str()),
            ),
            Err(error) => sink.emit(
                AuditEvent::new(
                    Some(quotation.id.clone()),
                    audit,
                    "lifecycle.transition_rejected",
                    AuditCategory::Lifecycle,
                    AuditOutcome::Rejected,
                )
                .with_metadata("event", event.as_str())
                .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{evaluate_deadline, transition, LifecycleEvent, LifecycleMachine};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::quotation::{
        BuyerId, Quotation, QuotationId, QuotationStatus, ShoppingListId,
    };
    use crate::errors::DomainError;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid instant")
    }

    fn quotation(status: QuotationStatus, deadline: DateTime<Utc>) -> Quotation {
        Quotation {
            id: QuotationId::new("QT-1"),
            name: "Weekly produce".to_owned(),
            status,
            deadline,
            counter_proposal_window_minutes: 15,
            counter_proposal_reminder_percent: 67,
            invited_suppliers: Vec::new(),
            shopping_list_id: ShoppingListId::new("SL-1"),
            buyer_id: BuyerId::new("BY-1"),
            created_at: now() - Duration::days(1),
            updated_at: now() - Duration::days(1),
        }
    }

    #[test]
    fn pause_keeps_the_deadline_and_suspends_expiry() {
        let deadline = now() - Duration::minutes(5);
        let open = quotation(QuotationStatus::Open, deadline);
        assert!(evaluate_deadline(&open, now()));

        let paused = transition(&open, LifecycleEvent::Pause, now()).expect("pause");
        assert_eq!(paused.to, QuotationStatus::Paused);
        assert_eq!(paused.deadline, deadline);
        assert!(!evaluate_deadline(&quotation(QuotationStatus::Paused, deadline), now()));
    }

    #[test]
    fn resume_requires_a_future_deadline() {
        let paused = quotation(QuotationStatus::Paused, now() - Duration::hours(1));

        let error = transition(&paused, LifecycleEvent::Resume { deadline: now() }, now())
            .expect_err("deadline equal to now is rejected");
        assert_eq!(error, DomainError::InvalidDeadline { deadline: now(), now: now() });

        let next = now() + Duration::hours(2);
        let resumed =
            transition(&paused, LifecycleEvent::Resume { deadline: next }, now()).expect("resume");
        assert_eq!((resumed.to, resumed.deadline), (QuotationStatus::Open, next));
    }

    #[test]
    fn terminal_states_reject_bidding_transitions() {
        let closed = quotation(QuotationStatus::Closed, now());
        for event in [LifecycleEvent::Pause, LifecycleEvent::Close, LifecycleEvent::DeadlineExpired] {
            assert!(matches!(
                transition(&closed, event, now()),
                Err(DomainError::InvalidQuotationTransition { from: QuotationStatus::Closed, .. })
            ));
        }
        let completed = transition(&closed, LifecycleEvent::Complete, now()).expect("complete");
        assert_eq!(completed.to, QuotationStatus::Completed);
    }

    #[test]
    fn deadline_expiry_only_closes_expired_open_quotations() {
        let running = quotation(QuotationStatus::Open, now() + Duration::minutes(1));
        assert!(transition(&running, LifecycleEvent::DeadlineExpired, now()).is_err());

        let expired = quotation(QuotationStatus::Open, now());
        let closed = transition(&expired, LifecycleEvent::DeadlineExpired, now()).expect("expire");
        assert_eq!(closed.to, QuotationStatus::Closed);
    }

    #[test]
    fn audit_records_applied_and_rejected_transitions() {
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new("req-1", "buyer:BY-1");
        let machine = LifecycleMachine;
        let open = quotation(QuotationStatus::Open, now() + Duration::hours(1));

        machine
            .apply_with_audit(&open, LifecycleEvent::Pause, now(), &sink, &audit)
            .expect("pause");
        machine
            .apply_with_audit(&open, LifecycleEvent::Complete, now(), &sink, &audit)
            .expect_err("open quotations cannot complete");

        assert_eq!(
            sink.event_types(),
            vec!["lifecycle.transition_applied", "lifecycle.transition_rejected"]
        );
        assert_eq!(sink.events()[0].metadata.get("to").map(String::as_str), Some("paused"));
    }
}
