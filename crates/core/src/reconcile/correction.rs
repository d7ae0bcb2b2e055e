use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::UnitClass;
use crate::domain::offer::Packaging;
use crate::domain::variation::{ResolutionPath, VariationClass};
use crate::packaging;
use crate::reconcile::engine::{assess, VariationAssessment};

/// Live recomputation of a typed correction. Never writes state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPreview {
    pub packaging: Packaging,
    pub total_quantity: Decimal,
    pub total_price: Decimal,
    pub price_per_unit: Option<Decimal>,
    pub assessment: VariationAssessment,
}

pub fn preview_correction(
    requested: Decimal,
    unit_class: UnitClass,
    corrected: Packaging,
) -> CorrectionPreview {
    let total_quantity = corrected.total_quantity(unit_class);
    let total_price = corrected.total_price();
    CorrectionPreview {
        packaging: corrected,
        total_quantity,
        total_price,
        price_per_unit: packaging::price_per_unit(
            corrected.package_count,
            corrected.price_per_package,
            total_quantity,
        ),
        assessment: assess(requested, total_quantity),
    }
}

/// Resolution paths the resolving party may pick for an offer's figures.
///
/// `corrected` is the latest typing-error preview, when the party has started one.
pub fn available_paths(
    original: &VariationAssessment,
    corrected: Option<&VariationAssessment>,
) -> Vec<ResolutionPath> {
    let mut paths = Vec::with_capacity(4);
    if original.is_exact() {
        return paths;
    }

    paths.push(ResolutionPath::AcceptSuggestion);
    if matches!(
        original.classification,
        VariationClass::Insufficient | VariationClass::VeryInsufficient
    ) {
        paths.push(ResolutionPath::StockShortage);
    }
    paths.push(ResolutionPath::TypingError);

    let excess = |assessment: &VariationAssessment| {
        assessment.classification == VariationClass::Excess
    };
    if excess(original) || corrected.is_some_and(excess) {
        paths.push(ResolutionPath::BuyerApprovalExcess);
    }
    paths
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{available_paths, preview_correction};
    use crate::domain::item::UnitClass;
    use crate::domain::offer::Packaging;
    use crate::domain::variation::{ResolutionPath, VariationClass};
    use crate::reconcile::engine::assess;

    #[test]
    fn preview_recomputes_every_derived_figure() {
        let preview = preview_correction(
            Decimal::from(90),
            UnitClass::WeightOrVolume,
            Packaging::new(3, Decimal::from(30), Decimal::from(75)),
        );

        assert_eq!(preview.total_quantity, Decimal::from(90));
        assert_eq!(preview.total_price, Decimal::from(225));
        assert_eq!(preview.price_per_unit, Some(Decimal::new(25, 1)));
        assert_eq!(preview.assessment.classification, VariationClass::Exact);
    }

    #[test]
    fn preview_is_stable_across_repeated_edits() {
        let first = preview_correction(
            Decimal::from(100),
            UnitClass::DiscreteCount,
            Packaging::new(10, Decimal::from(12), Decimal::from(30)),
        );
        let second = preview_correction(
            Decimal::from(100),
            UnitClass::DiscreteCount,
            Packaging::new(10, Decimal::from(12), Decimal::from(30)),
        );
        assert_eq!(first, second);
        assert_eq!(first.assessment.classification, VariationClass::Excess);
    }

    #[test]
    fn excess_path_requires_excess_figures() {
        let short = assess(Decimal::from(90), Decimal::from(60));
        let paths = available_paths(&short, None);
        assert!(paths.contains(&ResolutionPath::StockShortage));
        assert!(!paths.contains(&ResolutionPath::BuyerApprovalExcess));

        let corrected_over = assess(Decimal::from(90), Decimal::from(120));
        let paths = available_paths(&short, Some(&corrected_over));
        assert!(paths.contains(&ResolutionPath::BuyerApprovalExcess));

        let over = assess(Decimal::from(100), Decimal::from(108));
        let paths = available_paths(&over, None);
        assert!(paths.contains(&ResolutionPath::BuyerApprovalExcess));
        assert!(!paths.contains(&ResolutionPath::StockShortage));
    }

    #[test]
    fn exact_figures_offer_no_paths() {
        let exact = assess(Decimal::from(90), Decimal::from(90));
        assert!(available_paths(&exact, None).is_empty());
    }
}
