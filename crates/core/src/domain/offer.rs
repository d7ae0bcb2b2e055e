use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::string_id;
use crate::domain::item::{ProductId, UnitClass};
use crate::domain::quotation::QuotationId;
use crate::domain::supplier::SupplierId;
use crate::domain::variation::ResolutionPath;
use crate::packaging;

string_id!(OfferId, "OF");

/// How a supplier physically bundles what it sells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packaging {
    pub package_count: u32,
    /// Units per package for discrete goods, weight or volume per package otherwise.
    pub content_per_package: Decimal,
    pub price_per_package: Decimal,
}

impl Packaging {
    pub fn new(package_count: u32, content_per_package: Decimal, price_per_package: Decimal) -> Self {
        Self { package_count, content_per_package, price_per_package }
    }

    pub fn total_quantity(&self, unit_class: UnitClass) -> Decimal {
        packaging::total_quantity(unit_class, self.package_count, self.content_per_package)
    }

    pub fn total_price(&self) -> Decimal {
        packaging::total_price(self.package_count, self.price_per_package)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActingParty {
    Buyer,
    Supplier,
}

impl ActingParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Supplier => "supplier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buyer" => Some(Self::Buyer),
            "supplier" => Some(Self::Supplier),
            _ => None,
        }
    }

    pub fn counterpart(&self) -> Self {
        match self {
            Self::Buyer => Self::Supplier,
            Self::Supplier => Self::Buyer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub previous_packages: u32,
    pub new_packages: u32,
    pub path: ResolutionPath,
    pub acting_party: ActingParty,
    pub adjusted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub brand: String,
    pub unit_class: UnitClass,
    pub packaging: Packaging,
    /// Derived: package count × content per package.
    pub total_quantity: Decimal,
    /// Derived: total price ÷ total quantity; absent when the quantity is zero.
    pub price_per_unit: Option<Decimal>,
    pub adjustment_history: Vec<AdjustmentEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Builds an offer with its derived fields already computed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OfferId,
        quotation_id: QuotationId,
        product_id: ProductId,
        supplier_id: SupplierId,
        brand: impl Into<String>,
        unit_class: UnitClass,
        packaging: Packaging,
        now: DateTime<Utc>,
    ) -> Self {
        let mut offer = Self {
            id,
            quotation_id,
            product_id,
            supplier_id,
            brand: brand.into(),
            unit_class,
            packaging,
            total_quantity: Decimal::ZERO,
            price_per_unit: None,
            adjustment_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        offer.recompute_derived();
        offer
    }

    /// Re-derives the cached totals from the packaging fields.
    pub fn recompute_derived(&mut self) {
        self.total_quantity = self.packaging.total_quantity(self.unit_class);
        self.price_per_unit = packaging::price_per_unit(
            self.packaging.package_count,
            self.packaging.price_per_package,
            self.total_quantity,
        );
    }

    pub fn total_price(&self) -> Decimal {
        self.packaging.total_price()
    }

    /// Offers without a positive package price never take part in price comparisons.
    pub fn is_priced(&self) -> bool {
        self.packaging.price_per_package > Decimal::ZERO
    }
}
