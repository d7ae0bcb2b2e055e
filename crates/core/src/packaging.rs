//! Packaging quantity calculator.
//!
//! Converts a supplier's declared packaging (package count × content per package) into the total
//! quantity it commits to. Both unit classes use the same multiplication; the class only decides
//! what content per package *means* (units per package for discrete goods, weight or volume per
//! package otherwise), which matters for display and for the reverse computation done by the
//! reconciliation engine.
//!
//! Every function here is total: degenerate input yields zero or `None`, never a panic.

use rust_decimal::Decimal;

use crate::domain::item::UnitClass;

/// Total quantity committed by `package_count` packages of `content_per_package` each.
///
/// Negative content is treated as zero. The result saturates instead of overflowing.
pub fn total_quantity(
    unit_class: UnitClass,
    package_count: u32,
    content_per_package: Decimal,
) -> Decimal {
    let content = content_per_package.max(Decimal::ZERO);
    // Same arithmetic for both classes; the match keeps the meaning of `content` explicit.
    match unit_class {
        UnitClass::DiscreteCount | UnitClass::WeightOrVolume => {
            Decimal::from(package_count).saturating_mul(content)
        }
    }
}

/// Price of `package_count` packages.
pub fn total_price(package_count: u32, price_per_package: Decimal) -> Decimal {
    Decimal::from(package_count).saturating_mul(price_per_package.max(Decimal::ZERO))
}

/// Price per unit of quantity, or `None` when the total quantity is zero.
pub fn price_per_unit(
    package_count: u32,
    price_per_package: Decimal,
    total_quantity: Decimal,
) -> Option<Decimal> {
    if total_quantity <= Decimal::ZERO {
        return None;
    }
    total_price(package_count, price_per_package).checked_div(total_quantity)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{price_per_unit, total_price, total_quantity};
    use crate::domain::item::UnitClass;

    #[test]
    fn both_classes_multiply_packages_by_content() {
        assert_eq!(
            total_quantity(UnitClass::DiscreteCount, 9, Decimal::from(12)),
            Decimal::from(108)
        );
        assert_eq!(
            total_quantity(UnitClass::WeightOrVolume, 2, Decimal::new(305, 1)),
            Decimal::from(61)
        );
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(total_quantity(UnitClass::DiscreteCount, 0, Decimal::from(12)), Decimal::ZERO);
        assert_eq!(total_quantity(UnitClass::WeightOrVolume, 5, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(total_quantity(UnitClass::WeightOrVolume, 5, Decimal::from(-3)), Decimal::ZERO);
    }

    #[test]
    fn price_per_unit_is_guarded_against_zero_quantity() {
        assert_eq!(price_per_unit(3, Decimal::from(10), Decimal::ZERO), None);
        assert_eq!(
            price_per_unit(2, Decimal::from(45), Decimal::from(60)),
            Some(Decimal::new(15, 1))
        );
    }

    #[test]
    fn huge_values_saturate_instead_of_panicking() {
        let total = total_quantity(UnitClass::DiscreteCount, u32::MAX, Decimal::MAX);
        assert_eq!(total, Decimal::MAX);
        assert_eq!(total_price(u32::MAX, Decimal::MAX), Decimal::MAX);
    }
}
