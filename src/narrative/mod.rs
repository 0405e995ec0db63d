use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compare::{best_rate, effective_rate};
use crate::config::NarrativeConfig;
use crate::discount::round_cents;
use crate::types::Offer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeSummary {
    pub summary: String,
    pub best_deal: String,
    pub savings: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Free-text commentary over a finished offer list.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn summarize(&self, offers: &[Offer], codes: &[String]) -> Result<NarrativeSummary>;
}

pub struct TemplateNarrator {
    source_count: usize,
}

impl TemplateNarrator {
    pub fn new(source_count: usize) -> Self {
        Self { source_count }
    }

    pub fn render(&self, offers: &[Offer]) -> NarrativeSummary {
        let best_deal = match best_rate(offers) {
            Some(best) => format!(
                "Best rate: {} at ${:.2}",
                best.hotel_name,
                effective_rate(best)
            ),
            None => "No rates found.".to_string(),
        };
        let total: f64 = offers.iter().map(|o| o.variant.savings_amount).sum();
        NarrativeSummary {
            summary: format!(
                "Found {} hotel options across {} sources.",
                offers.len(),
                self.source_count
            ),
            best_deal,
            savings: format!("Total potential savings: ${:.2}", round_cents(total)),
            recommendations: vec![
                "Compare rates across different dates".to_string(),
                "Check cancellation policies".to_string(),
            ],
        }
    }
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn summarize(&self, offers: &[Offer], _codes: &[String]) -> Result<NarrativeSummary> {
        Ok(self.render(offers))
    }
}

#[derive(Serialize)]
struct WebhookRequest<'a> {
    offers: &'a [Offer],
    codes: &'a [String],
}

pub struct WebhookNarrator {
    client: Client,
    url: String,
}

impl WebhookNarrator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rate-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build narrative HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Narrator for WebhookNarrator {
    async fn summarize(&self, offers: &[Offer], codes: &[String]) -> Result<NarrativeSummary> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookRequest { offers, codes })
            .send()
            .await
            .with_context(|| format!("failed POST to narrative webhook: {}", self.url))?
            .error_for_status()?;
        let summary = response
            .json::<NarrativeSummary>()
            .await
            .context("narrative webhook returned an unexpected body")?;
        debug!(url = %self.url, "received narrative summary");
        Ok(summary)
    }
}

/// Webhook narrator when a URL is configured, template otherwise.
pub fn configured_narrator(
    config: &NarrativeConfig,
    source_count: usize,
) -> Result<Box<dyn Narrator>> {
    let url = config.webhook_url.trim();
    if url.is_empty() {
        return Ok(Box::new(TemplateNarrator::new(source_count)));
    }
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    Ok(Box::new(WebhookNarrator::new(url, timeout)?))
}

/// Like `configured_narrator`, but a narrator that cannot be built is
/// logged and replaced by the template.
pub fn narrator_or_template(config: &NarrativeConfig, source_count: usize) -> Box<dyn Narrator> {
    configured_narrator(config, source_count).unwrap_or_else(|err| {
        warn!("narrative webhook unavailable, using template: {err:#}");
        Box::new(TemplateNarrator::new(source_count))
    })
}

/// Never fails: any narrator error is logged and replaced by the template.
pub async fn narrate_or_fallback(
    narrator: &dyn Narrator,
    fallback: &TemplateNarrator,
    offers: &[Offer],
    codes: &[String],
) -> NarrativeSummary {
    match narrator.summarize(offers, codes).await {
        Ok(summary) => summary,
        Err(err) => {
            warn!("narrative summary failed, using template: {err:#}");
            fallback.render(offers)
        }
    }
}
