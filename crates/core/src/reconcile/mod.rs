//! Quantity reconciliation: compares requested and offered quantities, classifies the gap, and
//! proposes package-count corrections. Everything here is pure and panic-free.

pub mod correction;
pub mod engine;

pub use crate::domain::variation::ResolutionPath;
pub use correction::{available_paths, preview_correction, CorrectionPreview};
pub use engine::{
    assess, reconcile, suggest, Reconciliation, VariationAssessment, INSUFFICIENT_LIMIT_PERCENT,
};
