use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::brand::{BrandProposalId, ProposalStatus};
use crate::domain::offer::OfferId;
use crate::domain::quotation::{QuotationId, QuotationStatus};
use crate::domain::variation::{ResolutionPath, VariationRecordId};
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("deadline {deadline} is not after the current instant {now}")]
    InvalidDeadline { deadline: DateTime<Utc>, now: DateTime<Utc> },
    #[error("invalid quotation transition from {from:?} to {to:?}")]
    InvalidQuotationTransition { from: QuotationStatus, to: QuotationStatus },
    #[error("quotation {quotation_id} is not open (status {status:?})")]
    QuotationNotOpen { quotation_id: QuotationId, status: QuotationStatus },
    #[error("quotation {0} was not found")]
    QuotationNotFound(QuotationId),
    #[error("offer {offer_id} was not found")]
    OfferNotFound { offer_id: OfferId },
    #[error("quantity variation record {0} was not found")]
    VariationRecordNotFound(VariationRecordId),
    #[error("quantity variation record {record_id} was already applied")]
    AlreadyApplied { record_id: VariationRecordId },
    #[error("offer {offer_id} was changed by another party; review it and try again")]
    OfferChanged { offer_id: OfferId },
    #[error("brand proposal {0} was not found")]
    ProposalNotFound(BrandProposalId),
    #[error("brand proposal {proposal_id} cannot change state from {status:?}")]
    InvalidProposalState { proposal_id: BrandProposalId, status: ProposalStatus },
    #[error("resolution path {path:?} is not applicable to these figures")]
    ResolutionNotApplicable { path: ResolutionPath },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "This quotation changed in the meantime. Refresh and review the latest state."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(
                error @ (DomainError::AlreadyApplied { .. }
                | DomainError::OfferChanged { .. }
                | DomainError::InvalidProposalState { .. }
                | DomainError::QuotationNotOpen { .. }
                | DomainError::InvalidQuotationTransition { .. }),
            ) => Self::Conflict { message: error.to_string(), correlation_id: unassigned() },
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::offer::OfferId;
    use crate::domain::quotation::{QuotationId, QuotationStatus};
    use crate::domain::variation::VariationRecordId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::store::StoreError;

    #[test]
    fn missing_offer_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::OfferNotFound {
            offer_id: OfferId("OF-1".to_owned()),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("OF-1")
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn terminal_state_errors_map_to_conflict() {
        let already_applied = ApplicationError::from(DomainError::AlreadyApplied {
            record_id: VariationRecordId("QV-1".to_owned()),
        })
        .into_interface("req-2");
        let not_open = ApplicationError::from(DomainError::QuotationNotOpen {
            quotation_id: QuotationId("QT-1".to_owned()),
            status: QuotationStatus::Closed,
        })
        .into_interface("req-3");

        assert!(matches!(already_applied, InterfaceError::Conflict { .. }));
        assert!(matches!(not_open, InterfaceError::Conflict { .. }));
    }

    #[test]
    fn store_error_maps_to_service_unavailable() {
        let interface = ApplicationError::from(StoreError::Backend("database is locked".to_owned()))
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("missing webhook url".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
