use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::UnitClass;
use crate::domain::offer::Packaging;
use crate::domain::variation::{Suggestion, SuggestionSet, VariationClass};
use crate::packaging;

/// A shortfall up to and including this percentage is merely `insufficient`.
pub const INSUFFICIENT_LIMIT_PERCENT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationAssessment {
    pub requested: Decimal,
    pub offered: Decimal,
    /// Offered minus requested.
    pub variation: Decimal,
    /// |variation| ÷ requested × 100, unrounded.
    pub variation_percent: Decimal,
    pub classification: VariationClass,
}

impl VariationAssessment {
    pub fn is_exact(&self) -> bool {
        self.classification == VariationClass::Exact
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub assessment: VariationAssessment,
    /// Present only when the classification is not exact.
    pub suggestions: Option<SuggestionSet>,
}

/// Compares an offered quantity against the requested one.
///
/// A non-positive request cannot be satisfied meaningfully, so it is reported as
/// `very_insufficient` at 100% rather than rejected.
pub fn assess(requested: Decimal, offered: Decimal) -> VariationAssessment {
    let variation = offered.saturating_sub(requested);

    if requested <= Decimal::ZERO {
        return VariationAssessment {
            requested,
            offered,
            variation,
            variation_percent: Decimal::ONE_HUNDRED,
            classification: VariationClass::VeryInsufficient,
        };
    }

    let variation_percent = variation
        .abs()
        .checked_div(requested)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX);

    let classification = if variation.is_zero() {
        VariationClass::Exact
    } else if variation > Decimal::ZERO {
        VariationClass::Excess
    } else if variation_percent <= INSUFFICIENT_LIMIT_PERCENT {
        VariationClass::Insufficient
    } else {
        VariationClass::VeryInsufficient
    };

    VariationAssessment { requested, offered, variation, variation_percent, classification }
}

/// Builds the floor, ceil and offered suggestions for a packaging against a request.
///
/// Floor and ceil need a positive content per package and a positive request; otherwise only
/// the offered echo is returned.
pub fn suggest(requested: Decimal, unit_class: UnitClass, offer: &Packaging) -> SuggestionSet {
    let offered = suggestion(requested, unit_class, offer, offer.package_count);

    let bounds = if offer.content_per_package > Decimal::ZERO && requested > Decimal::ZERO {
        requested.checked_div(offer.content_per_package).and_then(|ratio| {
            let floor = ratio.floor().to_u32()?;
            let ceil = ratio.ceil().to_u32()?;
            Some((floor, ceil))
        })
    } else {
        None
    };

    match bounds {
        Some((floor, ceil)) => SuggestionSet {
            floor: Some(suggestion(requested, unit_class, offer, floor)),
            ceil: Some(suggestion(requested, unit_class, offer, ceil)),
            offered,
        },
        None => SuggestionSet { floor: None, ceil: None, offered },
    }
}

/// Assesses an offer and, when it does not match exactly, attaches suggestions.
pub fn reconcile(requested: Decimal, unit_class: UnitClass, offer: &Packaging) -> Reconciliation {
    let offered_quantity = offer.total_quantity(unit_class);
    let assessment = assess(requested, offered_quantity);
    let suggestions = (!assessment.is_exact()).then(|| suggest(requested, unit_class, offer));
    Reconciliation { assessment, suggestions }
}

fn suggestion(
    requested: Decimal,
    unit_class: UnitClass,
    offer: &Packaging,
    packages: u32,
) -> Suggestion {
    let total_quantity = packaging::total_quantity(unit_class, packages, offer.content_per_package);
    Suggestion {
        packages,
        total_quantity,
        variation: total_quantity.saturating_sub(requested),
        total_price: packaging::total_price(packages, offer.price_per_package),
    }
}
