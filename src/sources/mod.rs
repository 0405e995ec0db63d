pub mod catalog;
pub mod hilton;
pub mod marriott;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::discount::DiscountRuleTable;
use crate::sources::catalog::booking_url;
use crate::sources::hilton::HiltonSource;
use crate::sources::marriott::MarriottSource;
use crate::types::{BaseHotel, Offer, PricedVariant, SearchQuery, SourceId};

/// One brand family's offer-producing component.
///
/// `search` may fail as a whole (the catalog is unreachable), but an
/// ineligible code is never an error: it just produces no variant.
#[async_trait]
pub trait OfferSource: Send + Sync {
    fn id(&self) -> SourceId;
    fn name(&self) -> &str;
    fn brands(&self) -> &[&'static str];
    async fn fetch_base_hotels(&self, query: &SearchQuery) -> Result<Vec<BaseHotel>>;
    async fn search(&self, query: &SearchQuery, codes: &[String]) -> Result<Vec<Offer>>;
}

/// Emits, per hotel, one variant for every code the rule table honors (in
/// caller order) followed by exactly one undiscounted baseline.
pub fn price_hotels(
    source: &SourceId,
    hotels: &[BaseHotel],
    codes: &[String],
    rules: &DiscountRuleTable,
    booking_base_url: &str,
) -> Result<Vec<Offer>> {
    let mut offers = Vec::with_capacity(hotels.len() * (codes.len() + 1));
    for hotel in hotels {
        for code in codes {
            let Some(fraction) = rules.resolve(source, &hotel.brand, code) else {
                continue;
            };
            let url = booking_url(booking_base_url, &hotel.hotel_name, Some(code))?;
            let variant = PricedVariant::discounted(hotel.base_rate, code.as_str(), fraction, url);
            offers.push(Offer::from_hotel(hotel, variant).with_owner(source.clone()));
        }

        let url = booking_url(booking_base_url, &hotel.hotel_name, None)?;
        let baseline = PricedVariant::baseline(hotel.base_rate, url);
        offers.push(Offer::from_hotel(hotel, baseline).with_owner(source.clone()));
    }
    Ok(offers)
}

#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn OfferSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(rules: Arc<DiscountRuleTable>) -> Self {
        Self::for_selection(&SourceId::BUILTIN, rules, &BTreeMap::new())
    }

    /// Builds the built-in sources named in `selected`, in that order.
    /// `catalog_urls` maps a source slug to a remote catalog endpoint.
    pub fn for_selection(
        selected: &[SourceId],
        rules: Arc<DiscountRuleTable>,
        catalog_urls: &BTreeMap<String, String>,
    ) -> Self {
        let mut registry = Self::new();
        for id in selected {
            let catalog_url = catalog_urls
                .get(id.as_slug())
                .filter(|url| !url.trim().is_empty())
                .cloned();
            let source: Arc<dyn OfferSource> = match id {
                SourceId::Hilton => {
                    Arc::new(HiltonSource::new(rules.clone()).with_catalog_url(catalog_url))
                }
                SourceId::Marriott => {
                    Arc::new(MarriottSource::new(rules.clone()).with_catalog_url(catalog_url))
                }
                SourceId::Custom(slug) => {
                    warn!("no built-in source named {slug}, skipping");
                    continue;
                }
            };
            registry.register(source);
        }
        registry
    }

    /// Re-registering an id replaces the source in its original position.
    pub fn register(&mut self, source: Arc<dyn OfferSource>) {
        let id = source.id();
        if let Some(slot) = self.sources.iter_mut().find(|s| s.id() == id) {
            *slot = source;
        } else {
            self.sources.push(source);
        }
    }

    pub fn sources(&self) -> &[Arc<dyn OfferSource>] {
        &self.sources
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn by_id(&self, id: &SourceId) -> Option<Arc<dyn OfferSource>> {
        self.sources.iter().find(|s| &s.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::discount::DiscountRuleTable;
    use crate::sources::{price_hotels, SourceRegistry};
    use crate::types::{BaseHotel, SourceId};

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn every_hotel_gets_exactly_one_baseline() {
        let rules = DiscountRuleTable::with_defaults();
        let hotels = vec![
            BaseHotel::new("Hampton Inn Boise", "Hampton by Hilton", "1 Main", 200.0),
            BaseHotel::new("Conrad Boise", "Conrad Hotels & Resorts", "2 Main", 300.0),
        ];
        let offers = price_hotels(
            &SourceId::Hilton,
            &hotels,
            &codes(&["0001398", "N9880578", "BOGUS"]),
            &rules,
            "https://example.com/book",
        )
        .expect("pricing failed");

        for hotel in &hotels {
            let baselines = offers
                .iter()
                .filter(|o| o.hotel_name == hotel.hotel_name && o.is_baseline())
                .count();
            assert_eq!(baselines, 1, "{}", hotel.hotel_name);
        }
        // Hampton: GE + baseline. Conrad: GE + Blackstone + baseline.
        assert_eq!(offers.len(), 5);
        assert!(offers.iter().all(|o| o.owner == Some(SourceId::Hilton)));
    }

    #[test]
    fn restricted_code_never_prices_outside_its_brands() {
        let rules = DiscountRuleTable::with_defaults();
        let hotels = vec![BaseHotel::new(
            "DoubleTree Tulsa",
            "DoubleTree by Hilton",
            "3 Main",
            250.0,
        )];
        let offers = price_hotels(
            &SourceId::Hilton,
            &hotels,
            &codes(&["N9880578"]),
            &rules,
            "https://example.com/book",
        )
        .expect("pricing failed");
        assert_eq!(offers.len(), 1);
        assert!(offers[0].is_baseline());
        assert_eq!(offers[0].variant.discounted_rate, 250.0);
        assert_eq!(offers[0].variant.savings_amount, 0.0);
    }

    #[test]
    fn variants_follow_hotel_then_code_order() {
        let rules = DiscountRuleTable::with_defaults();
        let hotels = vec![
            BaseHotel::new("A", "Hilton Garden Inn", "", 100.0),
            BaseHotel::new("B", "Hilton Garden Inn", "", 100.0),
        ];
        let offers = price_hotels(
            &SourceId::Hilton,
            &hotels,
            &codes(&["N0001231", "0001398"]),
            &rules,
            "https://example.com/book",
        )
        .expect("pricing failed");
        let order = offers
            .iter()
            .map(|o| {
                format!(
                    "{}:{}",
                    o.hotel_name,
                    o.variant.discount_code.as_deref().unwrap_or("-")
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec!["A:N0001231", "A:0001398", "A:-", "B:N0001231", "B:0001398", "B:-"]
        );
    }

    #[test]
    fn registry_skips_unknown_and_keeps_selection_order() {
        let rules = Arc::new(DiscountRuleTable::with_defaults());
        let registry = SourceRegistry::for_selection(
            &[
                SourceId::Marriott,
                SourceId::Custom("hyatt".to_string()),
                SourceId::Hilton,
            ],
            rules,
            &BTreeMap::new(),
        );
        assert_eq!(registry.ids(), vec![SourceId::Marriott, SourceId::Hilton]);
        assert!(registry.by_id(&SourceId::Hilton).is_some());
    }
}
