use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::string_id;
use crate::domain::quotation::QuotationId;

string_id!(
    /// Identity of a product line; shared by the requested item and every offer for it.
    ProductId,
    "PR"
);

/// What content-per-package means for an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    DiscreteCount,
    WeightOrVolume,
}

impl UnitClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscreteCount => "discrete_count",
            Self::WeightOrVolume => "weight_or_volume",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "discrete_count" => Some(Self::DiscreteCount),
            "weight_or_volume" => Some(Self::WeightOrVolume),
            _ => None,
        }
    }

    pub fn content_label(&self) -> &'static str {
        match self {
            Self::DiscreteCount => "units per package",
            Self::WeightOrVolume => "weight or volume per package",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    Kilogram,
    Gram,
    Litre,
    Millilitre,
    Metre,
    Unit,
    Box,
    Pack,
    Dozen,
    Piece,
    Can,
    Bottle,
}

impl UnitOfMeasure {
    pub fn unit_class(&self) -> UnitClass {
        match self {
            Self::Kilogram | Self::Gram | Self::Litre | Self::Millilitre | Self::Metre => {
                UnitClass::WeightOrVolume
            }
            Self::Unit
            | Self::Box
            | Self::Pack
            | Self::Dozen
            | Self::Piece
            | Self::Can
            | Self::Bottle => UnitClass::DiscreteCount,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Kilogram => "kg",
            Self::Gram => "g",
            Self::Litre => "l",
            Self::Millilitre => "ml",
            Self::Metre => "m",
            Self::Unit => "un",
            Self::Box => "box",
            Self::Pack => "pk",
            Self::Dozen => "dz",
            Self::Piece => "pc",
            Self::Can => "can",
            Self::Bottle => "btl",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilogram => "kilogram",
            Self::Gram => "gram",
            Self::Litre => "litre",
            Self::Millilitre => "millilitre",
            Self::Metre => "metre",
            Self::Unit => "unit",
            Self::Box => "box",
            Self::Pack => "pack",
            Self::Dozen => "dozen",
            Self::Piece => "piece",
            Self::Can => "can",
            Self::Bottle => "bottle",
        }
    }

    /// Accepts the storage name or the abbreviation.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kilogram" | "kg" => Some(Self::Kilogram),
            "gram" | "g" => Some(Self::Gram),
            "litre" | "liter" | "l" => Some(Self::Litre),
            "millilitre" | "milliliter" | "ml" => Some(Self::Millilitre),
            "metre" | "meter" | "m" => Some(Self::Metre),
            "unit" | "un" => Some(Self::Unit),
            "box" => Some(Self::Box),
            "pack" | "pk" => Some(Self::Pack),
            "dozen" | "dz" => Some(Self::Dozen),
            "piece" | "pc" => Some(Self::Piece),
            "can" => Some(Self::Can),
            "bottle" | "btl" => Some(Self::Bottle),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Quoted,
    Purchased,
    Received,
    Cancelled,
    Closed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Quoted => "quoted",
            Self::Purchased => "purchased",
            Self::Received => "received",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "quoted" => Some(Self::Quoted),
            "purchased" => Some(Self::Purchased),
            "received" => Some(Self::Received),
            "cancelled" => Some(Self::Cancelled),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quotation_id: QuotationId,
    pub name: String,
    pub unit: UnitOfMeasure,
    pub requested_quantity: Decimal,
    pub preferred_brands: Vec<String>,
    pub status: ItemStatus,
}

impl RequestedItem {
    pub fn unit_class(&self) -> UnitClass {
        self.unit.unit_class()
    }

    /// Case-insensitive match against the buyer's preferred brands.
    pub fn prefers_brand(&self, brand: &str) -> bool {
        let brand = brand.trim();
        self.preferred_brands.iter().any(|preferred| preferred.trim().eq_ignore_ascii_case(brand))
    }
}
