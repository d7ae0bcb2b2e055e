//! Offer aggregation and best-price selection for one product.
//!
//! Offers without a positive package price, or without a derivable price per unit (zero
//! quantity), are excluded from every aggregate. Brands are grouped by their trimmed,
//! case-insensitive name.
//!
//! Ties are broken by input order: when two offers share the lowest price per unit, the one that
//! appears first in the slice wins, both inside a brand and across brands. Stores return offers in
//! first-submitted order, so the earliest bid keeps the position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::ProductId;
use crate::domain::offer::{Offer, OfferId};
use crate::domain::supplier::SupplierId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedOffer {
    pub offer_id: OfferId,
    pub supplier_id: SupplierId,
    pub brand: String,
    pub price_per_unit: Decimal,
}

impl RankedOffer {
    fn from_offer(offer: &Offer) -> Option<Self> {
        if !offer.is_priced() {
            return None;
        }
        Some(Self {
            offer_id: offer.id.clone(),
            supplier_id: offer.supplier_id.clone(),
            brand: offer.brand.trim().to_owned(),
            price_per_unit: offer.price_per_unit?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBoard {
    /// One representative per brand, in first-seen brand order.
    pub per_brand: Vec<RankedOffer>,
    pub best: Option<RankedOffer>,
}

impl PriceBoard {
    pub fn brand(&self, brand: &str) -> Option<&RankedOffer> {
        let key = brand_key(brand);
        self.per_brand.iter().find(|ranked| brand_key(&ranked.brand) == key)
    }

    /// Lowest positive price per unit among one supplier's offers, first-seen on ties.
    pub fn supplier_best<'a>(
        offers: &'a [Offer],
        supplier_id: &SupplierId,
    ) -> Option<&'a Offer> {
        let mut best: Option<(&Offer, Decimal)> = None;
        for offer in offers.iter().filter(|offer| &offer.supplier_id == supplier_id) {
            let Some(ranked) = RankedOffer::from_offer(offer) else {
                continue;
            };
            if best.map_or(true, |(_, price)| ranked.price_per_unit < price) {
                best = Some((offer, ranked.price_per_unit));
            }
        }
        best.map(|(offer, _)| offer)
    }
}

pub fn aggregate(offers: &[Offer]) -> PriceBoard {
    let mut per_brand: Vec<RankedOffer> = Vec::new();

    for ranked in offers.iter().filter_map(RankedOffer::from_offer) {
        let key = brand_key(&ranked.brand);
        match per_brand.iter_mut().find(|current| brand_key(&current.brand) == key) {
            Some(current) => {
                if ranked.price_per_unit < current.price_per_unit {
                    *current = ranked;
                }
            }
            None => per_brand.push(ranked),
        }
    }

    let mut best: Option<&RankedOffer> = None;
    for ranked in &per_brand {
        if best.map_or(true, |current| ranked.price_per_unit < current.price_per_unit) {
            best = Some(ranked);
        }
    }
    let best = best.cloned();

    PriceBoard { per_brand, best }
}

/// The overall best moved to a different supplier at a strictly lower price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbid {
    pub product_id: ProductId,
    pub previous: RankedOffer,
    pub current: RankedOffer,
}

pub fn detect_outbid(
    product_id: &ProductId,
    before: &PriceBoard,
    after: &PriceBoard,
) -> Option<Outbid> {
    let previous = before.best.as_ref()?;
    let current = after.best.as_ref()?;
    if previous.supplier_id == current.supplier_id
        || current.price_per_unit >= previous.price_per_unit
    {
        return None;
    }
    Some(Outbid { product_id: product_id.clone(), previous: previous.clone(), current: current.clone() })
}

fn brand_key(brand: &str) -> String {
    brand.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{aggregate, detect_outbid, PriceBoard};
    use crate::domain::item::{ProductId, UnitClass};
    use crate::domain::offer::{Offer, OfferId, Packaging};
    use crate::domain::quotation::QuotationId;
    use crate::domain::supplier::SupplierId;

    fn offer(id: &str, supplier: &str, brand: &str, price: Decimal) -> Offer {
        Offer::new(
            OfferId::new(id),
            QuotationId::new("QT-1"),
            ProductId::new("PR-1"),
            SupplierId::new(supplier),
            brand,
            UnitClass::DiscreteCount,
            Packaging::new(1, Decimal::ONE, price),
            Utc::now(),
        )
    }

    #[test]
    fn selects_brand_representative_and_overall_best() {
        let offers = vec![
            offer("OF-1", "SP-1", "Acme", Decimal::new(1050, 2)),
            offer("OF-2", "SP-2", "Acme", Decimal::new(999, 2)),
            offer("OF-3", "SP-3", "Acme", Decimal::new(1100, 2)),
            offer("OF-4", "SP-4", "Zenith", Decimal::new(875, 2)),
        ];

        let board = aggregate(&offers);

        let acme = board.brand("acme").expect("acme representative");
        assert_eq!(acme.price_per_unit, Decimal::new(999, 2));
        assert_eq!(acme.offer_id, OfferId::new("OF-2"));
        let best = board.best.expect("overall best");
        assert_eq!(best.price_per_unit, Decimal::new(875, 2));
        assert_eq!(best.brand, "Zenith");
    }

    #[test]
    fn unpriced_offers_are_excluded_everywhere() {
        let offers = vec![
            offer("OF-1", "SP-1", "Acme", Decimal::ZERO),
            offer("OF-2", "SP-2", "Acme", Decimal::from(-1)),
            offer("OF-3", "SP-3", "Zenith", Decimal::from(4)),
        ];

        let board = aggregate(&offers);
        assert_eq!(board.per_brand.len(), 1);
        assert!(board.brand("Acme").is_none());
        assert_eq!(board.best.map(|best| best.offer_id), Some(OfferId::new("OF-3")));
    }

    #[test]
    fn ties_keep_the_first_seen_offer() {
        let offers = vec![
            offer("OF-1", "SP-1", "Acme", Decimal::from(5)),
            offer("OF-2", "SP-2", " ACME ", Decimal::from(5)),
            offer("OF-3", "SP-3", "Zenith", Decimal::from(5)),
        ];

        let board = aggregate(&offers);
        assert_eq!(board.per_brand.len(), 2);
        assert_eq!(board.brand("acme").map(|r| r.offer_id.clone()), Some(OfferId::new("OF-1")));
        assert_eq!(board.best.map(|best| best.offer_id), Some(OfferId::new("OF-1")));

        let reversed: Vec<_> = offers.into_iter().rev().collect();
        let board = aggregate(&reversed);
        assert_eq!(board.best.map(|best| best.offer_id), Some(OfferId::new("OF-3")));
    }

    #[test]
    fn outbid_requires_a_different_supplier_and_lower_price() {
        let product = ProductId::new("PR-1");
        let before = aggregate(&[offer("OF-1", "SP-1", "Acme", Decimal::from(5))]);
        let same_supplier = aggregate(&[
            offer("OF-1", "SP-1", "Acme", Decimal::from(5)),
            offer("OF-2", "SP-1", "Zenith", Decimal::from(4)),
        ]);
        assert!(detect_outbid(&product, &before, &same_supplier).is_none());

        let beaten = aggregate(&[
            offer("OF-1", "SP-1", "Acme", Decimal::from(5)),
            offer("OF-3", "SP-2", "Zenith", Decimal::new(45, 1)),
        ]);
        let outbid = detect_outbid(&product, &before, &beaten).expect("outbid detected");
        assert_eq!(outbid.previous.supplier_id, SupplierId::new("SP-1"));
        assert_eq!(outbid.current.supplier_id, SupplierId::new("SP-2"));
    }

    #[test]
    fn supplier_best_ignores_other_suppliers() {
        let offers = vec![
            offer("OF-1", "SP-1", "Acme", Decimal::from(6)),
            offer("OF-2", "SP-2", "Acme", Decimal::from(1)),
            offer("OF-3", "SP-1", "Zenith", Decimal::from(5)),
        ];
        let best = PriceBoard::supplier_best(&offers, &SupplierId::new("SP-1"));
        assert_eq!(best.map(|offer| offer.id.clone()), Some(OfferId::new("OF-3")));
    }
}
