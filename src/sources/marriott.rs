use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::discount::DiscountRuleTable;
use crate::sources::catalog::{fetch_remote_catalog, location_label};
use crate::sources::{price_hotels, OfferSource};
use crate::types::{BaseHotel, Offer, SearchQuery, SourceId};

const MARRIOTT_BOOKING_URL: &str = "https://www.marriott.com/reservation/rateListMenu.mi";

pub const MARRIOTT_BRANDS: &[&str] = &[
    "Marriott Hotels",
    "The Ritz-Carlton",
    "W Hotels",
    "Sheraton Hotels & Resorts",
    "Westin Hotels & Resorts",
    "Courtyard by Marriott",
    "Residence Inn by Marriott",
    "Fairfield Inn & Suites",
    "SpringHill Suites",
    "TownePlace Suites",
    "AC Hotels by Marriott",
    "Aloft Hotels",
];

#[derive(Debug, Clone)]
pub struct MarriottSource {
    rules: Arc<DiscountRuleTable>,
    catalog_url: Option<String>,
}

impl MarriottSource {
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
impl OfferSource for MarriottSource {
    fn id(&self) -> SourceId {
        SourceId::Marriott
    }

    fn name(&self) -> &str {
        "Marriott"
    }

    fn brands(&self) -> &[&'static str] {
        MARRIOTT_BRANDS
    }

    async fn fetch_base_hotels(&self, query: &SearchQuery) -> Result<Vec<BaseHotel>> {
        match &self.catalog_url {
            Some(url) => fetch_remote_catalog(url, query).await,
            None => Ok(stand_in_catalog(location_label(query))),
        }
    }

    async fn search(&self, query: &SearchQuery, codes: &[String]) -> Result<Vec<Offer>> {
        let hotels = self.fetch_base_hotels(query).await?;
        let offers = price_hotels(
            &self.id(),
            &hotels,
            codes,
            &self.rules,
            MARRIOTT_BOOKING_URL,
        )?;
        debug!(
            hotels = hotels.len(),
            offers = offers.len(),
            "priced marriott offers"
        );
        Ok(offers)
    }
}

fn stand_in_catalog(location: &str) -> Vec<BaseHotel> {
    vec![
        BaseHotel::new(
            format!("Courtyard by Marriott {location}"),
            "Courtyard by Marriott",
            format!("321 Corporate Dr, {location}"),
            199.99,
        )
        .with_reviews(4.3, 987)
        .with_amenities(&["Free WiFi", "Restaurant", "Fitness Center", "Business Center"]),
        BaseHotel::new(
            format!("Residence Inn by Marriott {location}"),
            "Residence Inn by Marriott",
            format!("654 Extended Stay Ln, {location}"),
            229.99,
        )
        .with_reviews(4.5, 756)
        .with_amenities(&["Free WiFi", "Free Breakfast", "Kitchen", "Pool", "Pet Friendly"]),
        BaseHotel::new(
            format!("Marriott {location}"),
            "Marriott Hotels",
            format!("987 Luxury Blvd, {location}"),
            289.99,
        )
        .with_reviews(4.6, 2134)
        .with_amenities(&[
            "Free WiFi",
            "Restaurant",
            "Spa",
            "Pool",
            "Concierge",
            "Valet Parking",
        ]),
        BaseHotel::new(
            format!("Fairfield Inn & Suites {location}"),
            "Fairfield Inn & Suites",
            format!("147 Budget Way, {location}"),
            159.99,
        )
        .with_reviews(4.1, 543)
        .with_amenities(&["Free WiFi", "Free Breakfast", "Pool", "Fitness Center"]),
    ]
}
