use serde::{Deserialize, Serialize};

use crate::compare::{arg_max_by, best_rate, or_zero, value_score};
use crate::types::Offer;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BestDeals {
    pub cheapest: Option<Offer>,
    pub best_savings: Option<Offer>,
    pub highest_rated: Option<Offer>,
    pub best_value: Option<Offer>,
}

pub fn best_deals(offers: &[Offer]) -> BestDeals {
    let best_savings = arg_max_by(offers, |o| or_zero(o.variant.savings_amount))
        .filter(|o| or_zero(o.variant.savings_amount) > 0.0);
    let highest_rated =
        arg_max_by(offers, |o| or_zero(o.rating)).filter(|o| or_zero(o.rating) > 0.0);

    BestDeals {
        cheapest: best_rate(offers).cloned(),
        best_savings: best_savings.cloned(),
        highest_rated: highest_rated.cloned(),
        best_value: arg_max_by(offers, value_score).cloned(),
    }
}
