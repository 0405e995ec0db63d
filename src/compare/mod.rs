//! Pure views over a merged offer list: ranking, grouping, statistics and
//! "best of" selections. Nothing here knows about sources beyond the owner
//! tag the orchestrator attaches.

pub mod deals;
pub mod group;
pub mod rank;
pub mod stats;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::discount::round_cents;
use crate::types::{Offer, SourceId};

/// Rate actually payable. Falls back to the other rate field when the
/// primary one is missing, and to infinity when neither is usable.
pub fn effective_rate(offer: &Offer) -> f64 {
    let (primary, fallback) = if offer.is_baseline() {
        (offer.base_rate, offer.variant.discounted_rate)
    } else {
        (offer.variant.discounted_rate, offer.base_rate)
    };
    [primary, fallback]
        .into_iter()
        .find(|rate| rate.is_finite() && *rate > 0.0)
        .unwrap_or(f64::INFINITY)
}

/// Missing or non-finite numeric fields count as zero.
pub(crate) fn or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// First element whose key is strictly smaller than every earlier one.
pub(crate) fn arg_min_by<T, F>(items: &[T], key: F) -> Option<&T>
where
    F: Fn(&T) -> f64,
{
    let mut iter = items.iter();
    let mut best = iter.next()?;
    let mut best_key = key(best);
    for item in iter {
        let k = key(item);
        if k < best_key {
            best = item;
            best_key = k;
        }
    }
    Some(best)
}

/// First element whose key is strictly greater than every earlier one.
pub(crate) fn arg_max_by<T, F>(items: &[T], key: F) -> Option<&T>
where
    F: Fn(&T) -> f64,
{
    let mut iter = items.iter();
    let mut best = iter.next()?;
    let mut best_key = key(best);
    for item in iter {
        let k = key(item);
        if k > best_key {
            best = item;
            best_key = k;
        }
    }
    Some(best)
}

pub fn best_rate(offers: &[Offer]) -> Option<&Offer> {
    arg_min_by(offers, effective_rate)
}

/// Heuristic 60/40 blend of price (against a $500 ceiling) and rating.
pub fn value_score(offer: &Offer) -> f64 {
    let rate = effective_rate(offer);
    let rating = or_zero(offer.rating);
    if !rate.is_finite() || rating == 0.0 {
        return 0.0;
    }
    let price_score = ((500.0 - rate) / 500.0).max(0.0);
    let rating_score = rating / 5.0;
    price_score * 0.6 + rating_score * 0.4
}

pub fn filter_by_owner(offers: &[Offer], owner: &SourceId) -> Vec<Offer> {
    offers
        .iter()
        .filter(|o| o.owner.as_ref() == Some(owner))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairComparison {
    pub first: Offer,
    pub second: Offer,
    pub price_difference: f64,
    pub cheaper: Offer,
    pub rating_difference: f64,
    pub higher_rated: Offer,
    pub savings_difference: f64,
    pub better_savings: Offer,
}

/// Head-to-head view of two offers. Every tie goes to `b`.
pub fn compare_pair(a: &Offer, b: &Offer) -> PairComparison {
    let (rate_a, rate_b) = (effective_rate(a), effective_rate(b));
    let (rating_a, rating_b) = (or_zero(a.rating), or_zero(b.rating));
    let (savings_a, savings_b) = (
        or_zero(a.variant.savings_amount),
        or_zero(b.variant.savings_amount),
    );

    let price_difference = if rate_a.is_finite() && rate_b.is_finite() {
        round_cents((rate_a - rate_b).abs())
    } else {
        f64::INFINITY
    };

    PairComparison {
        first: a.clone(),
        second: b.clone(),
        price_difference,
        cheaper: (if rate_a < rate_b { a } else { b }).clone(),
        rating_difference: round_cents((rating_a - rating_b).abs()),
        higher_rated: (if rating_a > rating_b { a } else { b }).clone(),
        savings_difference: round_cents((savings_a - savings_b).abs()),
        better_savings: (if savings_a > savings_b { a } else { b }).clone(),
    }
}

/// Cheapest variant per (owner, hotel), in first-seen order.
pub fn best_offer_per_hotel(offers: &[Offer]) -> Vec<Offer> {
    let mut index: HashMap<(Option<SourceId>, &str), usize> = HashMap::new();
    let mut out: Vec<Offer> = Vec::new();
    for offer in offers {
        let key = (offer.owner.clone(), offer.hotel_name.as_str());
        match index.get(&key) {
            Some(&slot) => {
                if effective_rate(offer) < effective_rate(&out[slot]) {
                    out[slot] = offer.clone();
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(offer.clone());
            }
        }
    }
    out
}

/// Savings a guest would realise by booking only the best variant of each
/// hotel. Unlike `ResultEnvelope::total_savings` this counts each hotel once.
pub fn best_case_savings(offers: &[Offer]) -> f64 {
    let sum: f64 = best_offer_per_hotel(offers)
        .iter()
        .map(|o| or_zero(o.variant.savings_amount))
        .sum();
    round_cents(sum)
}
