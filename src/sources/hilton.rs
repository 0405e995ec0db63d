use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::discount::DiscountRuleTable;
use crate::sources::catalog::{fetch_remote_catalog, location_label};
use crate::sources::{price_hotels, OfferSource};
use crate::types::{BaseHotel, Offer, SearchQuery, SourceId};

const HILTON_BOOKING_URL: &str = "https://www.hilton.com/en/book/reservation/rooms/";

pub const HILTON_BRANDS: &[&str] = &[
    "Hilton Hotels & Resorts",
    "Conrad Hotels & Resorts",
    "Waldorf Astoria Hotels & Resorts",
    "Hampton by Hilton",
    "Hilton Garden Inn",
    "Homewood Suites by Hilton",
    "DoubleTree by Hilton",
    "Embassy Suites by Hilton",
    "Curio Collection by Hilton",
    "Home2 Suites by Hilton",
];

#[derive(Debug, Clone)]
pub struct HiltonSource {
    rules: Arc<DiscountRuleTable>,
    catalog_url: Option<String>,
}

impl HiltonSource {
    pub fn new(rules: Arc<DiscountRuleTable>) -> Self {
        Self {
            rules,
            catalog_url: None,
        }
    }

    pub fn with_catalog_url(mut self, catalog_url: Option<String>) -> Self {
        self.catalog_url = catalog_url;
        self
    }
}

#[async_trait]
impl OfferSource for HiltonSource {
    fn id(&self) -> SourceId {
        SourceId::Hilton
    }

    fn name(&self) -> &str {
        "Hilton"
    }

    fn brands(&self) -> &[&'static str] {
        HILTON_BRANDS
    }

    async fn fetch_base_hotels(&self, query: &SearchQuery) -> Result<Vec<BaseHotel>> {
        match &self.catalog_url {
            Some(url) => fetch_remote_catalog(url, query).await,
            None => Ok(stand_in_catalog(location_label(query))),
        }
    }

    async fn search(&self, query: &SearchQuery, codes: &[String]) -> Result<Vec<Offer>> {
        let hotels = self.fetch_base_hotels(query).await?;
        let offers = price_hotels(&self.id(), &hotels, codes, &self.rules, HILTON_BOOKING_URL)?;
        debug!(
            hotels = hotels.len(),
            offers = offers.len(),
            "priced hilton offers"
        );
        Ok(offers)
    }
}

fn stand_in_catalog(location: &str) -> Vec<BaseHotel> {
    vec![
        BaseHotel::new(
            format!("Hampton Inn & Suites {location}"),
            "Hampton by Hilton",
            format!("123 Main St, {location}"),
            189.99,
        )
        .with_reviews(4.2, 1234)
        .with_amenities(&["Free WiFi", "Free Breakfast", "Fitness Center", "Pool"]),
        BaseHotel::new(
            format!("Hilton Garden Inn {location}"),
            "Hilton Garden Inn",
            format!("456 Business Blvd, {location}"),
            219.99,
        )
        .with_reviews(4.4, 892)
        .with_amenities(&["Free WiFi", "Restaurant", "Fitness Center", "Business Center"]),
        BaseHotel::new(
            format!("DoubleTree by Hilton {location}"),
            "DoubleTree by Hilton",
            format!("789 Downtown Ave, {location}"),
            249.99,
        )
        .with_reviews(4.3, 1567)
        .with_amenities(&["Free WiFi", "Restaurant", "Pool", "Spa", "Parking"]),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::discount::DiscountRuleTable;
    use crate::sources::hilton::{HiltonSource, HILTON_BRANDS};
    use crate::sources::OfferSource;
    use crate::types::SearchQuery;

    #[tokio::test]
    async fn blackstone_code_only_prices_garden_inn() {
        let source = HiltonSource::new(Arc::new(DiscountRuleTable::with_defaults()));
        let offers = source
            .search(&SearchQuery::new("Austin"), &["N9880578".to_string()])
            .await
            .expect("search failed");

        // three baselines plus one Blackstone variant for Hilton Garden Inn
        assert_eq!(offers.len(), 4);
        let discounted = offers
            .iter()
            .filter(|o| !o.is_baseline())
            .collect::<Vec<_>>();
        assert_eq!(discounted.len(), 1);
        assert_eq!(discounted[0].brand, "Hilton Garden Inn");
        assert_eq!(discounted[0].variant.savings_percentage, 22.0);
        assert!(discounted[0].variant.booking_url.contains("corporateCode=N9880578"));
    }

    #[tokio::test]
    async fn stand_in_hotels_use_known_brands() {
        let source = HiltonSource::new(Arc::new(DiscountRuleTable::with_defaults()));
        let hotels = source
            .fetch_base_hotels(&SearchQuery::new("Reno"))
            .await
            .expect("catalog failed");
        assert_eq!(hotels.len(), 3);
        assert!(hotels.iter().all(|h| HILTON_BRANDS.contains(&h.brand.as_str())));
        assert!(hotels.iter().all(|h| h.hotel_name.ends_with("Reno")));
    }
}
