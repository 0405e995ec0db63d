use serde::{Deserialize, Serialize};

use crate::compare::{effective_rate, or_zero};
use crate::discount::round_cents;
use crate::types::Offer;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RateStats {
    pub total_results: usize,
    pub average_rate: f64,
    pub total_savings: f64,
    pub best_savings_percentage: f64,
    pub price_range: PriceRange,
}

pub fn stats(offers: &[Offer]) -> RateStats {
    if offers.is_empty() {
        return RateStats::default();
    }

    let rates = offers
        .iter()
        .map(effective_rate)
        .filter(|r| r.is_finite())
        .collect::<Vec<_>>();
    let total_savings: f64 = offers
        .iter()
        .map(|o| or_zero(o.variant.savings_amount))
        .sum();
    let best_savings_percentage = offers
        .iter()
        .map(|o| or_zero(o.variant.savings_percentage))
        .fold(0.0, f64::max);

    let (average_rate, price_range) = if rates.is_empty() {
        (0.0, PriceRange::default())
    } else {
        let sum: f64 = rates.iter().sum();
        let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (round_cents(sum / rates.len() as f64), PriceRange { min, max })
    };

    RateStats {
        total_results: offers.len(),
        average_rate,
        total_savings: round_cents(total_savings),
        best_savings_percentage,
        price_range,
    }
}
