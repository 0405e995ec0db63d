use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::{effective_rate, or_zero};
use crate::types::Offer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    #[default]
    Price,
    Savings,
    Rating,
    Brand,
}

impl RankKey {
    pub const ALL: [RankKey; 4] = [
        RankKey::Price,
        RankKey::Savings,
        RankKey::Rating,
        RankKey::Brand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Savings => "savings",
            Self::Rating => "rating",
            Self::Brand => "brand",
        }
    }
}

impl Display for RankKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown rank key: {0} (expected price, savings, rating or brand)")]
pub struct RankKeyParseError(pub String);

impl FromStr for RankKey {
    type Err = RankKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| RankKeyParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Error)]
#[error("unknown sort order: {0} (expected asc or desc)")]
pub struct SortOrderParseError(pub String);

impl FromStr for SortOrder {
    type Err = SortOrderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(SortOrderParseError(s.to_string())),
        }
    }
}

/// Stable sort; offers that compare equal keep their input order in both
/// directions.
pub fn rank(offers: &[Offer], key: RankKey, order: SortOrder) -> Vec<Offer> {
    let mut ranked = offers.to_vec();
    ranked.sort_by(|a, b| {
        let ordering = compare_by(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    ranked
}

fn compare_by(a: &Offer, b: &Offer, key: RankKey) -> Ordering {
    match key {
        RankKey::Price => cmp_f64(effective_rate(a), effective_rate(b)),
        RankKey::Savings => cmp_f64(
            or_zero(a.variant.savings_amount),
            or_zero(b.variant.savings_amount),
        ),
        RankKey::Rating => cmp_f64(or_zero(a.rating), or_zero(b.rating)),
        RankKey::Brand => a.brand.cmp(&b.brand),
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
