//! Applies a chosen resolution to a quantity variation record and its offer.
//!
//! The record's Unresolved to Applied transition is the serialization point: the store commits
//! it together with the corrected offer only while the record is still Unresolved, so of two
//! concurrent calls exactly one wins and the other gets `AlreadyApplied`. The offer write is also
//! conditional on the offer being unchanged since it was read; a supplier edit in between yields
//! `OfferChanged` instead of being overwritten.
//!
//! Suggestions are taken from the offer as it stands. The set stored on the record is reused only
//! while the offer still matches its `offered` echo.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::offer::{ActingParty, AdjustmentEntry, Offer, Packaging};
use crate::domain::variation::{
    QuantityVariationRecord, ResolutionPath, ResolutionStatus, Suggestion, SuggestionKind,
    SuggestionSet, VariationClass, VariationRecordId,
};
use crate::errors::{ApplicationError, DomainError};
use crate::notify::{notify_best_effort, CommittedFigures, NotificationSink, TenderEvent};
use crate::reconcile::engine::{assess, suggest, VariationAssessment};
use crate::store::{CommitOutcome, ResolutionCommit, TenderStore};

/// Share of the request below which a cached content of exactly one is treated as corrupt.
const LEGACY_CONTENT_FLOOR_PERCENT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum Resolution {
    /// Take the package count of a stored suggestion.
    AcceptSuggestion { suggestion: SuggestionKind },
    /// Keep the shortfall; the offer is not modified.
    StockShortage,
    /// Replace the packaging figures that were typed wrong.
    TypingError { corrected: Packaging },
    /// Buyer approves receiving more than requested, either as offered or with corrected figures.
    BuyerApprovalExcess { corrected: Option<Packaging> },
}

impl Resolution {
    pub fn path(&self) -> ResolutionPath {
        match self {
            Self::AcceptSuggestion { .. } => ResolutionPath::AcceptSuggestion,
            Self::StockShortage => ResolutionPath::StockShortage,
            Self::TypingError { .. } => ResolutionPath::TypingError,
            Self::BuyerApprovalExcess { .. } => ResolutionPath::BuyerApprovalExcess,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySuggestion {
    pub record_id: VariationRecordId,
    pub resolution: Resolution,
    pub acting_party: ActingParty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub record: QuantityVariationRecord,
    pub offer: Offer,
    /// Whether the counterpart notification was accepted by the sink.
    pub notified: bool,
}

pub struct AdjustmentService {
    store: Arc<dyn TenderStore>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl AdjustmentService {
    pub fn new(
        store: Arc<dyn TenderStore>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, notifications, audit }
    }

    pub async fn apply_suggestion(
        &self,
        request: ApplySuggestion,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<AdjustmentOutcome, ApplicationError> {
        let result = self.apply_inner(&request, now, audit).await;
        if let Err(error) = &result {
            self.audit.emit(
                AuditEvent::new(
                    None,
                    audit,
                    "adjustment.rejected",
                    AuditCategory::Adjustment,
                    AuditOutcome::Rejected,
                )
                .with_metadata("record_id", request.record_id.to_string())
                .with_metadata("path", request.resolution.path().as_str())
                .with_metadata("error", error.to_string()),
            );
        }
        result
    }

    async fn apply_inner(
        &self,
        request: &ApplySuggestion,
        now: DateTime<Utc>,
        audit: &AuditContext,
    ) -> Result<AdjustmentOutcome, ApplicationError> {
        let record = self
            .store
            .find_variation(&request.record_id)
            .await?
            .ok_or_else(|| DomainError::VariationRecordNotFound(request.record_id.clone()))?;

        let quotation = self
            .store
            .find_quotation(&record.quotation_id)
            .await?
            .ok_or_else(|| DomainError::QuotationNotFound(record.quotation_id.clone()))?;
        if quotation.status.is_terminal_for_bidding() {
            return Err(DomainError::QuotationNotOpen {
                quotation_id: quotation.id.clone(),
                status: quotation.status,
            }
            .into());
        }
        if record.is_applied() {
            return Err(DomainError::AlreadyApplied { record_id: record.id.clone() }.into());
        }

        let offer = self
            .store
            .find_offer(&record.offer_id)
            .await?
            .filter(|offer| offer.supplier_id == record.supplier_id)
            .ok_or_else(|| DomainError::OfferNotFound { offer_id: record.offer_id.clone() })?;

        let path = request.resolution.path();
        let packaging = resolve_packaging(&record, &offer, request)?;

        let (applied_packages, committed_offer) = match packaging {
            None => (offer.packaging.package_count, None),
            Some(packaging) => {
                let mut updated = offer.clone();
                updated.packaging = packaging;
                updated.recompute_derived();
                updated.updated_at = now;
                updated.adjustment_history.push(AdjustmentEntry {
                    previous_packages: offer.packaging.package_count,
                    new_packages: packaging.package_count,
                    path,
                    acting_party: request.acting_party,
                    adjusted_at: now,
                });
                (packaging.package_count, Some(updated))
            }
        };

        let commit = ResolutionCommit {
            record_id: record.id.clone(),
            applied_packages,
            path,
            resolved_by: request.acting_party,
            resolved_at: now,
            offer: committed_offer.clone(),
            observed_offer_at: Some(offer.updated_at),
        };
        match self.store.commit_resolution(commit).await? {
            CommitOutcome::Applied => {}
            CommitOutcome::AlreadyApplied => {
                return Err(DomainError::AlreadyApplied { record_id: record.id.clone() }.into());
            }
            CommitOutcome::OfferChanged => {
                return Err(DomainError::OfferChanged { offer_id: offer.id.clone() }.into());
            }
        }

        let mut applied = record;
        applied.status = ResolutionStatus::Applied;
        applied.applied_packages = Some(applied_packages);
        applied.resolution_path = Some(path);
        applied.resolved_by = Some(request.acting_party);
        applied.resolved_at = Some(now);
        let offer = committed_offer.unwrap_or(offer);

        info!(
            event_name = "adjustment.applied",
            correlation_id = %audit.correlation_id,
            quotation_id = %applied.quotation_id,
            offer_id = %offer.id,
            record_id = %applied.id,
            path = path.as_str(),
            acting_party = request.acting_party.as_str(),
            applied_packages,
            "quantity adjustment applied"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(applied.quotation_id.clone()),
                audit,
                "adjustment.applied",
                AuditCategory::Adjustment,
                AuditOutcome::Success,
            )
            .with_metadata("record_id", applied.id.to_string())
            .with_metadata("offer_id", offer.id.to_string())
            .with_metadata("path", path.as_str())
            .with_metadata("applied_packages", applied_packages.to_string()),
        );

        let notified = notify_best_effort(
            self.notifications.as_ref(),
            counterpart_event(&applied, &offer, request.acting_party),
            &audit.correlation_id,
        )
        .await;

        Ok(AdjustmentOutcome { record: applied, offer, notified })
    }
}

/// The packaging the offer ends up with, or `None` when the offer is left as is.
fn resolve_packaging(
    record: &QuantityVariationRecord,
    offer: &Offer,
    request: &ApplySuggestion,
) -> Result<Option<Packaging>, DomainError> {
    let path = request.resolution.path();
    let not_applicable = || DomainError::ResolutionNotApplicable { path };

    match request.resolution {
        Resolution::AcceptSuggestion { suggestion } => {
            let chosen =
                current_suggestions(record, offer).get(suggestion).ok_or_else(not_applicable)?;
            Ok(Some(accept_suggestion(offer, &chosen, record.requested_quantity)))
        }
        Resolution::StockShortage => {
            let current = assess(record.requested_quantity, offer.total_quantity);
            if matches!(
                current.classification,
                VariationClass::Insufficient | VariationClass::VeryInsufficient
            ) {
                Ok(None)
            } else {
                Err(not_applicable())
            }
        }
        Resolution::TypingError { corrected } => {
            validate_packaging(&corrected)?;
            Ok(Some(corrected))
        }
        Resolution::BuyerApprovalExcess { corrected } => {
            if request.acting_party != ActingParty::Buyer {
                return Err(not_applicable());
            }
            let packaging = corrected.unwrap_or(offer.packaging);
            validate_packaging(&packaging)?;
            let assessment: VariationAssessment = assess(
                record.requested_quantity,
                packaging.total_quantity(offer.unit_class),
            );
            if assessment.classification != VariationClass::Excess {
                return Err(not_applicable());
            }
            Ok(Some(packaging))
        }
    }
}

/// The suggestion set for the offer's current figures. A resubmitted offer gets a fresh set; an
/// untouched one keeps the stored set, which is what legacy content recovery relies on.
fn current_suggestions(record: &QuantityVariationRecord, offer: &Offer) -> SuggestionSet {
    let echo = record.suggestions.offered;
    let unchanged = echo.packages == offer.packaging.package_count
        && echo.total_quantity == offer.total_quantity
        && echo.total_price == offer.total_price();
    if unchanged {
        record.suggestions
    } else {
        suggest(record.requested_quantity, offer.unit_class, &offer.packaging)
    }
}

/// Takes the suggestion's package count, keeping content and price.
///
/// Legacy offers were sometimes stored with a content per package of exactly one. When that
/// value would leave the offer under half the request, the content is recovered from the
/// suggestion's own total instead.
fn accept_suggestion(offer: &Offer, chosen: &Suggestion, requested: Decimal) -> Packaging {
    let mut packaging = Packaging { package_count: chosen.packages, ..offer.packaging };

    let resulting = packaging.total_quantity(offer.unit_class);
    let threshold = requested
        .checked_mul(LEGACY_CONTENT_FLOOR_PERCENT)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO);
    if offer.packaging.content_per_package == Decimal::ONE
        && resulting < threshold
        && chosen.packages > 0
    {
        if let Some(recovered) =
            chosen.total_quantity.checked_div(Decimal::from(chosen.packages))
        {
            packaging.content_per_package = recovered;
        }
    }
    packaging
}

fn validate_packaging(packaging: &Packaging) -> Result<(), DomainError> {
    if packaging.content_per_package < Decimal::ZERO {
        return Err(DomainError::InvalidInput(
            "content per package must not be negative".to_owned(),
        ));
    }
    if packaging.price_per_package < Decimal::ZERO {
        return Err(DomainError::InvalidInput("price per package must not be negative".to_owned()));
    }
    Ok(())
}

fn counterpart_event(
    record: &QuantityVariationRecord,
    offer: &Offer,
    acting_party: ActingParty,
) -> TenderEvent {
    let committed = CommittedFigures {
        packages: offer.packaging.package_count,
        total_quantity: offer.total_quantity,
        total_price: offer.total_price(),
    };
    match acting_party {
        ActingParty::Buyer => TenderEvent::BuyerAdjustmentApplied {
            quotation_id: record.quotation_id.clone(),
            product_id: record.product_id.clone(),
            supplier_id: record.supplier_id.clone(),
            record_id: record.id.clone(),
            committed,
        },
        ActingParty::Supplier => TenderEvent::QuantityAdjustmentApproved {
            quotation_id: record.quotation_id.clone(),
            product_id: record.product_id.clone(),
            supplier_id: record.supplier_id.clone(),
            record_id: record.id.clone(),
            committed,
        },
    }
}
