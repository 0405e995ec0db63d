pub mod rules;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SourceId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountRule {
    pub code: String,
    pub fraction: f64,
    /// `None` means the code is honored by every brand the source serves.
    #[serde(default)]
    pub brands: Option<BTreeSet<String>>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("discount code cannot be empty")]
    EmptyCode,
    #[error("discount fraction for {code} must be strictly between 0 and 1, got {fraction}")]
    FractionOutOfRange { code: String, fraction: f64 },
}

impl DiscountRule {
    pub fn new(code: impl Into<String>, fraction: f64) -> Result<Self, RuleError> {
        let code = code.into();
        if code.is_empty() {
            return Err(RuleError::EmptyCode);
        }
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(RuleError::FractionOutOfRange { code, fraction });
        }
        Ok(Self {
            code,
            fraction,
            brands: None,
            label: None,
        })
    }

    pub fn restricted_to<I, S>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brands = Some(brands.into_iter().map(Into::into).collect());
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn applies_to(&self, brand: &str) -> bool {
        self.brands
            .as_ref()
            .map_or(true, |allowed| allowed.contains(brand))
    }
}

/// Per-source code tables. Read-only once built; shared between sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscountRuleTable {
    tables: BTreeMap<SourceId, BTreeMap<String, DiscountRule>>,
}

impl DiscountRuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for rule in rules::hilton_rules() {
            table.insert(SourceId::Hilton, rule);
        }
        for rule in rules::marriott_rules() {
            table.insert(SourceId::Marriott, rule);
        }
        table
    }

    /// Inserts a rule, replacing any existing rule with the same code for `source`.
    pub fn insert(&mut self, source: SourceId, rule: DiscountRule) -> Option<DiscountRule> {
        self.tables
            .entry(source)
            .or_default()
            .insert(rule.code.clone(), rule)
    }

    /// Exact, case-sensitive lookup. An unknown code and a code restricted
    /// away from `brand` are indistinguishable to the caller.
    pub fn resolve(&self, source: &SourceId, brand: &str, code: &str) -> Option<f64> {
        let rule = self.tables.get(source)?.get(code)?;
        if rule.applies_to(brand) {
            Some(rule.fraction)
        } else {
            None
        }
    }

    pub fn rules_for(&self, source: &SourceId) -> Vec<&DiscountRule> {
        self.tables
            .get(source)
            .map(|rules| rules.values().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantPricing {
    pub discounted_rate: f64,
    pub savings_amount: f64,
    pub savings_percentage: f64,
}

/// Half-up rounding to cents. Rates are never negative, so `f64::round`
/// (half away from zero) behaves as half-up here.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Each figure is rounded from the unrounded discounted rate, never from
/// another rounded figure.
pub fn price_with_fraction(base_rate: f64, fraction: f64) -> VariantPricing {
    let discounted = base_rate * (1.0 - fraction);
    VariantPricing {
        discounted_rate: round_cents(discounted),
        savings_amount: round_cents(base_rate - discounted),
        savings_percentage: round_cents(fraction * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use crate::discount::{price_with_fraction, round_cents, DiscountRule, DiscountRuleTable, RuleError};
    use crate::types::SourceId;

    #[test]
    fn prices_the_reference_example() {
        let pricing = price_with_fraction(200.0, 0.15);
        assert_eq!(pricing.discounted_rate, 170.0);
        assert_eq!(pricing.savings_amount, 30.0);
        assert_eq!(pricing.savings_percentage, 15.0);
    }

    #[test]
    fn savings_are_rounded_independently_of_the_rounded_rate() {
        let base = 189.99;
        let fraction = 0.15;
        let pricing = price_with_fraction(base, fraction);
        assert_eq!(pricing.discounted_rate, round_cents(base * (1.0 - fraction)));
        assert_eq!(
            pricing.savings_amount,
            round_cents(base - base * (1.0 - fraction))
        );
        assert!(pricing.discounted_rate <= base);
    }

    #[test]
    fn rejects_out_of_range_fractions() {
        assert_eq!(DiscountRule::new("", 0.1), Err(RuleError::EmptyCode));
        assert!(matches!(
            DiscountRule::new("X", 1.0),
            Err(RuleError::FractionOutOfRange { .. })
        ));
        assert!(DiscountRule::new("X", 0.0).is_err());
        assert!(DiscountRule::new("X", f64::NAN).is_err());
    }

    #[test]
    fn brand_restriction_looks_like_an_unknown_code() {
        let table = DiscountRuleTable::with_defaults();
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hilton Garden Inn", "N9880578"),
            Some(0.22)
        );
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "N9880578"),
            None
        );
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "NOPE"),
            None
        );
    }

    #[test]
    fn codes_are_case_sensitive_and_scoped_per_source() {
        let table = DiscountRuleTable::with_defaults();
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "n0901452"),
            Some(0.18)
        );
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "N0901452"),
            None
        );
        assert_eq!(
            table.resolve(&SourceId::Marriott, "Marriott Hotels", "N9880578"),
            None
        );
        assert_eq!(
            table.resolve(&SourceId::Marriott, "Marriott Hotels", "0001398"),
            Some(0.12)
        );
    }

    #[test]
    fn insert_replaces_existing_rule() {
        let mut table = DiscountRuleTable::with_defaults();
        let before = table.len();
        let replaced = table.insert(
            SourceId::Hilton,
            DiscountRule::new("0001398", 0.3).expect("valid rule"),
        );
        assert_eq!(replaced.map(|r| r.fraction), Some(0.15));
        assert_eq!(table.len(), before);
        assert_eq!(
            table.resolve(&SourceId::Hilton, "Hampton by Hilton", "0001398"),
            Some(0.3)
        );
    }
}
