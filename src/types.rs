use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::discount::{price_with_fraction, round_cents};

/// Identity of the brand family that produced an offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceId {
    Hilton,
    Marriott,
    Custom(String),
}

impl SourceId {
    pub const BUILTIN: [SourceId; 2] = [SourceId::Hilton, SourceId::Marriott];

    pub fn as_slug(&self) -> &str {
        match self {
            Self::Hilton => "hilton",
            Self::Marriott => "marriott",
            Self::Custom(slug) => slug,
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hilton => write!(f, "Hilton"),
            Self::Marriott => write!(f, "Marriott"),
            Self::Custom(slug) => write!(f, "{slug}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown source id: {0}")]
pub struct SourceParseError(pub String);

impl FromStr for SourceId {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "hilton" => Ok(Self::Hilton),
            "marriott" => Ok(Self::Marriott),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}

// Owner tags coming back from storage or API callers may name sources this
// build does not know; those stay representable so they can land in `other`.
impl From<String> for SourceId {
    fn from(value: String) -> Self {
        SourceId::from_str(&value).unwrap_or(SourceId::Custom(value))
    }
}

impl From<SourceId> for String {
    fn from(value: SourceId) -> Self {
        value.as_slug().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub location: String,
    #[serde(default)]
    pub check_in: Option<NaiveDate>,
    #[serde(default)]
    pub check_out: Option<NaiveDate>,
    #[serde(default = "default_guests")]
    pub guests: u32,
    #[serde(default)]
    pub discount_codes: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("location is required")]
    MissingLocation,
    #[error("guest count must be at least 1")]
    NoGuests,
    #[error("check-out {check_out} must be after check-in {check_in}")]
    InvalidStay {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

impl SearchQuery {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            check_in: None,
            check_out: None,
            guests: default_guests(),
            discount_codes: Vec::new(),
        }
    }

    pub fn with_dates(mut self, check_in: Option<NaiveDate>, check_out: Option<NaiveDate>) -> Self {
        self.check_in = check_in;
        self.check_out = check_out;
        self
    }

    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = guests;
        self
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discount_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.location.trim().is_empty() {
            return Err(QueryError::MissingLocation);
        }
        if self.guests == 0 {
            return Err(QueryError::NoGuests);
        }
        if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
            if check_out <= check_in {
                return Err(QueryError::InvalidStay {
                    check_in,
                    check_out,
                });
            }
        }
        Ok(())
    }
}

/// One catalog entry before any code has been tried against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseHotel {
    pub hotel_name: String,
    pub brand: String,
    pub address: String,
    pub base_rate: f64,
    pub rating: f64,
    pub review_count: u32,
    pub amenities: Vec<String>,
}

impl BaseHotel {
    pub fn new(
        hotel_name: impl Into<String>,
        brand: impl Into<String>,
        address: impl Into<String>,
        base_rate: f64,
    ) -> Self {
        Self {
            hotel_name: hotel_name.into(),
            brand: brand.into(),
            address: address.into(),
            base_rate,
            rating: 0.0,
            review_count: 0,
            amenities: Vec::new(),
        }
    }

    pub fn with_reviews(mut self, rating: f64, review_count: u32) -> Self {
        self.rating = rating;
        self.review_count = review_count;
        self
    }

    pub fn with_amenities(mut self, amenities: &[&str]) -> Self {
        self.amenities = amenities.iter().map(|a| a.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PricedVariant {
    #[serde(default)]
    pub discounted_rate: f64,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub savings_amount: f64,
    #[serde(default)]
    pub savings_percentage: f64,
    #[serde(default)]
    pub booking_url: String,
}

impl PricedVariant {
    pub fn baseline(base_rate: f64, booking_url: impl Into<String>) -> Self {
        Self {
            discounted_rate: base_rate,
            discount_code: None,
            savings_amount: 0.0,
            savings_percentage: 0.0,
            booking_url: booking_url.into(),
        }
    }

    pub fn discounted(
        base_rate: f64,
        code: impl Into<String>,
        fraction: f64,
        booking_url: impl Into<String>,
    ) -> Self {
        let pricing = price_with_fraction(base_rate, fraction);
        Self {
            discounted_rate: pricing.discounted_rate,
            discount_code: Some(code.into()),
            savings_amount: pricing.savings_amount,
            savings_percentage: pricing.savings_percentage,
            booking_url: booking_url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub hotel_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub owner: Option<SourceId>,
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "original_rate")]
    pub base_rate: f64,
    #[serde(flatten)]
    pub variant: PricedVariant,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
}

impl Offer {
    pub fn from_hotel(hotel: &BaseHotel, variant: PricedVariant) -> Self {
        Self {
            hotel_name: hotel.hotel_name.clone(),
            brand: hotel.brand.clone(),
            owner: None,
            address: hotel.address.clone(),
            base_rate: hotel.base_rate,
            variant,
            rating: hotel.rating,
            review_count: hotel.review_count,
            amenities: hotel.amenities.clone(),
        }
    }

    pub fn with_owner(mut self, owner: SourceId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_baseline(&self) -> bool {
        self.variant.discount_code.is_none()
    }

    pub fn owner_slug(&self) -> &str {
        self.owner.as_ref().map(SourceId::as_slug).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReport {
    pub source: SourceId,
    pub status: SourceStatus,
    pub offer_count: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEnvelope {
    pub searched_at: DateTime<Utc>,
    pub query: SearchQuery,
    pub codes_tried: Vec<String>,
    pub offers: Vec<Offer>,
    pub best_offer: Option<Offer>,
    /// Raw sum over every variant; serialized rounded to cents.
    #[serde(serialize_with = "serialize_cents")]
    pub total_savings: f64,
    pub sources: Vec<SourceReport>,
}

impl ResultEnvelope {
    pub fn total_results(&self) -> usize {
        self.offers.len()
    }

    pub fn failed_sources(&self) -> Vec<&SourceId> {
        self.sources
            .iter()
            .filter(|r| r.status != SourceStatus::Ok)
            .map(|r| &r.source)
            .collect()
    }

    pub fn rounded_total_savings(&self) -> f64 {
        round_cents(self.total_savings)
    }
}

fn default_guests() -> u32 {
    1
}

fn serialize_cents<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_cents(*value))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use crate::types::{Offer, QueryError, ResultEnvelope, SearchQuery, SourceId};

    #[test]
    fn source_ids_parse_strictly_but_deserialize_leniently() {
        assert_eq!("Hilton".parse::<SourceId>().expect("parse"), SourceId::Hilton);
        assert!("hyatt".parse::<SourceId>().is_err());
        assert_eq!(
            SourceId::from("hyatt".to_string()),
            SourceId::Custom("hyatt".to_string())
        );
        let json = serde_json::to_string(&SourceId::Marriott).expect("serialize");
        assert_eq!(json, "\"marriott\"");
    }

    #[test]
    fn validation_rejects_bad_queries() {
        assert_eq!(
            SearchQuery::new("  ").validate(),
            Err(QueryError::MissingLocation)
        );
        assert_eq!(
            SearchQuery::new("Austin").with_guests(0).validate(),
            Err(QueryError::NoGuests)
        );
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");
        assert!(matches!(
            SearchQuery::new("Austin")
                .with_dates(Some(day), Some(day))
                .validate(),
            Err(QueryError::InvalidStay { .. })
        ));
        assert!(SearchQuery::new("Austin").validate().is_ok());
    }

    #[test]
    fn partial_offer_json_defaults_missing_fields() {
        let offer: Offer = serde_json::from_str(
            r#"{"hotel_name":"Hotel B","discounted_rate":120.0,"discount_code":"X1"}"#,
        )
        .expect("deserialize");
        assert_eq!(offer.brand, "");
        assert_eq!(offer.rating, 0.0);
        assert_eq!(offer.owner, None);
        assert_eq!(offer.variant.discount_code.as_deref(), Some("X1"));
    }

    #[test]
    fn envelope_json_carries_total_savings_in_cents() {
        let envelope = ResultEnvelope {
            searched_at: Utc::now(),
            query: SearchQuery::new("Austin"),
            codes_tried: Vec::new(),
            offers: Vec::new(),
            best_offer: None,
            total_savings: 204.59999999999997,
            sources: Vec::new(),
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["total_savings"], 204.6);
        assert_eq!(envelope.total_savings, 204.59999999999997);
    }
}
