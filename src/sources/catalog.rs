use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{BaseHotel, SearchQuery};

const CATALOG_HTTP_TIMEOUT_SECS: u64 = 8;
const UNKNOWN_LOCATION: &str = "Unknown Location";

pub fn location_label(query: &SearchQuery) -> &str {
    let trimmed = query.location.trim();
    if trimmed.is_empty() {
        UNKNOWN_LOCATION
    } else {
        trimmed
    }
}

pub fn hotel_slug(hotel_name: &str) -> String {
    hotel_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

pub fn booking_url(base_url: &str, hotel_name: &str, code: Option<&str>) -> Result<String> {
    let mut params = vec![("hotel", hotel_slug(hotel_name))];
    if let Some(code) = code {
        params.push(("corporateCode", code.to_string()));
    }
    let url = Url::parse_with_params(base_url, &params)
        .with_context(|| format!("invalid booking base url: {base_url}"))?;
    Ok(url.to_string())
}

pub async fn fetch_remote_catalog(url: &str, query: &SearchQuery) -> Result<Vec<BaseHotel>> {
    let client = Client::builder()
        .user_agent(concat!("rate-oracle/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(CATALOG_HTTP_TIMEOUT_SECS))
        .build()
        .context("failed to build catalog HTTP client")?;

    let mut params = vec![
        ("location", query.location.clone()),
        ("guests", query.guests.to_string()),
    ];
    if let Some(check_in) = query.check_in {
        params.push(("check_in", check_in.to_string()));
    }
    if let Some(check_out) = query.check_out {
        params.push(("check_out", check_out.to_string()));
    }

    let response = client
        .get(url)
        .query(&params)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        let preview: String = body.chars().take(180).collect();
        return Err(anyhow!("GET {url} returned {status}: {preview}"));
    }
    let payload: Value =
        serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))?;
    let hotels = parse_catalog(&payload);
    debug!(url, count = hotels.len(), "parsed remote catalog");
    Ok(hotels)
}

/// Accepts a bare array of hotels or an object wrapping one under `hotels`.
pub fn parse_catalog(value: &Value) -> Vec<BaseHotel> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(object) => match object.get("hotels").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut out = Vec::new();
    for entry in entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(name) = string_from_keys(object, &["hotel_name", "name"]) else {
            continue;
        };
        let Some(rate) = number_from_keys(object, &["original_rate", "base_rate", "rate"])
            .filter(|r| r.is_finite() && *r > 0.0)
        else {
            continue;
        };

        let mut hotel = BaseHotel::new(
            name,
            string_from_keys(object, &["brand"]).unwrap_or_default(),
            string_from_keys(object, &["hotel_address", "address"]).unwrap_or_default(),
            rate,
        );
        hotel.rating = number_from_keys(object, &["rating"])
            .unwrap_or(0.0)
            .clamp(0.0, 5.0);
        hotel.review_count = number_from_keys(object, &["review_count", "reviews"])
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
            .unwrap_or(0);
        hotel.amenities = object
            .get("amenities")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        out.push(hotel);
    }
    out
}

fn string_from_keys(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match object.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn number_from_keys(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        let Some(value) = object.get(*key) else {
            continue;
        };
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
            _ => None,
        };
        if number.is_some() {
            return number;
        }
    }
    None
}
