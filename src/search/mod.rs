use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result as AnyResult;
use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::compare::{best_rate, filter_by_owner};
use crate::config::Config;
use crate::discount::DiscountRuleTable;
use crate::sources::{OfferSource, SourceRegistry};
use crate::types::{
    Offer, QueryError, ResultEnvelope, SearchQuery, SourceId, SourceReport, SourceStatus,
};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error("no offer sources are registered")]
    NoSources,
}

/// Drops empty strings and repeats. Comparison is byte-exact, so `abc` and
/// `ABC` are different codes.
pub fn dedupe_codes<'a, I>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for code in codes {
        if code.is_empty() || !seen.insert(code.as_str()) {
            continue;
        }
        out.push(code.clone());
    }
    out
}

/// Keeps only `owner`'s offers. `best_offer` and `total_savings` are
/// recomputed over what remains so the envelope stays self-consistent.
pub fn restrict_to_owner(mut envelope: ResultEnvelope, owner: &SourceId) -> ResultEnvelope {
    envelope.offers = filter_by_owner(&envelope.offers, owner);
    let (best_offer, total_savings) = summarize(&envelope.offers);
    envelope.best_offer = best_offer;
    envelope.total_savings = total_savings;
    envelope
}

fn summarize(offers: &[Offer]) -> (Option<Offer>, f64) {
    let best_offer = best_rate(offers).cloned();
    let total_savings = offers.iter().map(|o| o.variant.savings_amount).sum();
    (best_offer, total_savings)
}

pub struct SearchOrchestrator {
    registry: SourceRegistry,
    source_timeout: Duration,
}

struct SourceOutcome {
    source: SourceId,
    result: Result<anyhow::Result<Vec<Offer>>, tokio::time::error::Elapsed>,
    elapsed: Duration,
}

impl SearchOrchestrator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Registers the configured sources in their configured order.
    pub fn from_config(config: &Config, rules: Arc<DiscountRuleTable>) -> AnyResult<Self> {
        let selected = config.selected_sources()?;
        let registry =
            SourceRegistry::for_selection(&selected, rules, &config.sources.catalog_urls);
        Ok(Self::new(registry).with_timeout(config.source_timeout()))
    }

    pub fn with_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self
    }

    pub fn registered(&self) -> Vec<SourceId> {
        self.registry.ids()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Fans the query out to every registered source at once. A source that
    /// errors or overruns the timeout contributes nothing; the rest of the
    /// envelope is still built. Offers come back in registration order.
    pub async fn execute(
        &self,
        query: &SearchQuery,
        extra_codes: &[String],
    ) -> Result<ResultEnvelope, SearchError> {
        query.validate()?;
        if self.registry.is_empty() {
            return Err(SearchError::NoSources);
        }

        let codes = dedupe_codes(query.discount_codes.iter().chain(extra_codes));
        info!(
            location = %query.location,
            sources = self.registry.len(),
            codes = codes.len(),
            "starting rate search"
        );

        let tasks = self
            .registry
            .sources()
            .iter()
            .map(|source| self.run_source(Arc::clone(source), query, &codes));
        let outcomes = join_all(tasks).await;

        let mut offers = Vec::new();
        let mut reports = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let elapsed_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX);
            let report = match outcome.result {
                Ok(Ok(found)) => {
                    debug!(
                        source = %outcome.source,
                        count = found.len(),
                        elapsed_ms,
                        "source completed"
                    );
                    let offer_count = found.len();
                    offers.extend(
                        found
                            .into_iter()
                            .map(|offer| offer.with_owner(outcome.source.clone())),
                    );
                    SourceReport {
                        source: outcome.source,
                        status: SourceStatus::Ok,
                        offer_count,
                        error: None,
                        elapsed_ms,
                    }
                }
                Ok(Err(err)) => {
                    warn!(source = %outcome.source, "source failed: {err:#}");
                    SourceReport {
                        source: outcome.source,
                        status: SourceStatus::Failed,
                        offer_count: 0,
                        error: Some(format!("{err:#}")),
                        elapsed_ms,
                    }
                }
                Err(_) => {
                    warn!(
                        source = %outcome.source,
                        timeout_ms = self.source_timeout.as_millis() as u64,
                        "source timed out"
                    );
                    SourceReport {
                        source: outcome.source,
                        status: SourceStatus::TimedOut,
                        offer_count: 0,
                        error: Some(format!(
                            "timed out after {}ms",
                            self.source_timeout.as_millis()
                        )),
                        elapsed_ms,
                    }
                }
            };
            reports.push(report);
        }

        let (best_offer, total_savings) = summarize(&offers);
        let envelope = ResultEnvelope {
            searched_at: Utc::now(),
            query: query.clone(),
            codes_tried: codes,
            offers,
            best_offer,
            total_savings,
            sources: reports,
        };
        info!(
            offers = envelope.total_results(),
            failed_sources = envelope.failed_sources().len(),
            "rate search complete"
        );
        Ok(envelope)
    }

    async fn run_source(
        &self,
        source: Arc<dyn OfferSource>,
        query: &SearchQuery,
        codes: &[String],
    ) -> SourceOutcome {
        let started = Instant::now();
        let result = timeout(self.source_timeout, source.search(query, codes)).await;
        SourceOutcome {
            source: source.id(),
            result,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use crate::discount::{DiscountRule, DiscountRuleTable};
    use crate::search::{dedupe_codes, restrict_to_owner, SearchError, SearchOrchestrator};
    use crate::sources::{price_hotels, OfferSource, SourceRegistry};
    use crate::types::{BaseHotel, Offer, QueryError, SearchQuery, SourceId, SourceStatus};

    enum Behaviour {
        Hotels(Vec<BaseHotel>),
        Fail,
        Stall,
    }

    struct StubSource {
        id: SourceId,
        rules: Arc<DiscountRuleTable>,
        behaviour: Behaviour,
    }

    impl StubSource {
        fn new(
            id: SourceId,
            rules: Arc<DiscountRuleTable>,
            behaviour: Behaviour,
        ) -> Arc<dyn OfferSource> {
            Arc::new(Self {
                id,
                rules,
                behaviour,
            })
        }
    }

    #[async_trait]
    impl OfferSource for StubSource {
        fn id(&self) -> SourceId {
            self.id.clone()
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn brands(&self) -> &[&'static str] {
            &[]
        }

        async fn fetch_base_hotels(&self, _query: &SearchQuery) -> Result<Vec<BaseHotel>> {
            match &self.behaviour {
                Behaviour::Hotels(hotels) => Ok(hotels.clone()),
                Behaviour::Fail => Err(anyhow!("catalog unavailable")),
                Behaviour::Stall => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn search(&self, query: &SearchQuery, codes: &[String]) -> Result<Vec<Offer>> {
            let hotels = self.fetch_base_hotels(query).await?;
            price_hotels(&self.id, &hotels, codes, &self.rules, "https://example.com/book")
        }
    }

    fn rules() -> Arc<DiscountRuleTable> {
        Arc::new(DiscountRuleTable::with_defaults())
    }

    fn orchestrator(sources: Vec<Arc<dyn OfferSource>>) -> SearchOrchestrator {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(source);
        }
        SearchOrchestrator::new(registry).with_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn failing_source_is_isolated() {
        let rules = rules();
        let orchestrator = orchestrator(vec![
            StubSource::new(SourceId::Hilton, rules.clone(), Behaviour::Fail),
            StubSource::new(
                SourceId::Marriott,
                rules,
                Behaviour::Hotels(vec![BaseHotel::new("Courtyard X", "Courtyard by Marriott", "", 200.0)]),
            ),
        ]);
        let envelope = orchestrator
            .execute(&SearchQuery::new("Austin"), &["0001398".to_string()])
            .await
            .expect("search should survive a failing source");

        assert_eq!(envelope.total_results(), 2);
        assert!(envelope
            .offers
            .iter()
            .all(|o| o.owner == Some(SourceId::Marriott)));
        assert_eq!(envelope.sources[0].status, SourceStatus::Failed);
        assert!(envelope.sources[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("catalog unavailable")));
        assert_eq!(envelope.sources[1].status, SourceStatus::Ok);
        assert_eq!(envelope.failed_sources(), vec![&SourceId::Hilton]);
    }

    #[tokio::test]
    async fn slow_source_times_out_without_blocking_others() {
        let rules = rules();
        let orchestrator = orchestrator(vec![
            StubSource::new(SourceId::Hilton, rules.clone(), Behaviour::Stall),
            StubSource::new(
                SourceId::Marriott,
                rules,
                Behaviour::Hotels(vec![BaseHotel::new("Aloft X", "Aloft Hotels", "", 140.0)]),
            ),
        ]);
        let envelope = orchestrator
            .execute(&SearchQuery::new("Austin"), &[])
            .await
            .expect("search failed");
        assert_eq!(envelope.sources[0].status, SourceStatus::TimedOut);
        assert_eq!(envelope.total_results(), 1);
    }

    #[tokio::test]
    async fn all_sources_failing_is_an_empty_result() {
        let rules = rules();
        let orchestrator = orchestrator(vec![
            StubSource::new(SourceId::Hilton, rules.clone(), Behaviour::Fail),
            StubSource::new(SourceId::Marriott, rules, Behaviour::Fail),
        ]);
        let envelope = orchestrator
            .execute(&SearchQuery::new("Austin"), &[])
            .await
            .expect("empty result is not an error");
        assert!(envelope.offers.is_empty());
        assert!(envelope.best_offer.is_none());
        assert_eq!(envelope.total_savings, 0.0);
    }

    #[tokio::test]
    async fn rejects_invalid_query_and_empty_registry() {
        let orchestrator = orchestrator(Vec::new());
        let err = orchestrator
            .execute(&SearchQuery::new(""), &[])
            .await
            .expect_err("blank location");
        assert!(matches!(err, SearchError::InvalidQuery(QueryError::MissingLocation)));

        let err = orchestrator
            .execute(&SearchQuery::new("Austin"), &[])
            .await
            .expect_err("no sources");
        assert!(matches!(err, SearchError::NoSources));
    }

    #[tokio::test]
    async fn restricted_code_skips_other_brands_but_keeps_baseline() {
        let mut table = DiscountRuleTable::new();
        table.insert(
            SourceId::Hilton,
            DiscountRule::new("N9880578", 0.22)
                .expect("rule")
                .restricted_to(["BrandA", "BrandB"]),
        );
        let orchestrator = orchestrator(vec![StubSource::new(
            SourceId::Hilton,
            Arc::new(table),
            Behaviour::Hotels(vec![BaseHotel::new("Hotel C", "BrandC", "", 180.0)]),
        )]);
        let envelope = orchestrator
            .execute(&SearchQuery::new("Austin"), &["N9880578".to_string()])
            .await
            .expect("search failed");
        assert_eq!(envelope.total_results(), 1);
        assert!(envelope.offers[0].is_baseline());
        assert_eq!(envelope.codes_tried, vec!["N9880578".to_string()]);
    }

    #[tokio::test]
    async fn merges_in_registration_order_and_sums_every_variant() {
        let rules = rules();
        let orchestrator = orchestrator(vec![
            StubSource::new(
                SourceId::Marriott,
                rules.clone(),
                Behaviour::Hotels(vec![BaseHotel::new("M1", "Courtyard by Marriott", "", 200.0)]),
            ),
            StubSource::new(
                SourceId::Hilton,
                rules,
                Behaviour::Hotels(vec![BaseHotel::new("H1", "Hilton Garden Inn", "", 200.0)]),
            ),
        ]);
        let query = SearchQuery::new("Austin").with_codes(["0001398"]);
        let envelope = orchestrator
            .execute(&query, &["0001398".to_string(), "N0001231".to_string()])
            .await
            .expect("search failed");

        assert_eq!(envelope.codes_tried, vec!["0001398", "N0001231"]);
        let order = envelope
            .offers
            .iter()
            .map(|o| o.hotel_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["M1", "M1", "M1", "H1", "H1", "H1"]);
        // Marriott GE 12% = 24, FedEx 10% = 20; Hilton GE 15% = 30, FedEx 20.
        assert!((envelope.total_savings - 94.0).abs() < 1e-9);
        let best = envelope.best_offer.expect("best offer");
        assert_eq!(best.hotel_name, "H1");
        assert_eq!(best.variant.discounted_rate, 170.0);
    }

    #[tokio::test]
    async fn owner_restriction_recomputes_best_offer_and_savings() {
        let rules = rules();
        let orchestrator = orchestrator(vec![
            StubSource::new(
                SourceId::Hilton,
                rules.clone(),
                Behaviour::Hotels(vec![BaseHotel::new("H1", "Hilton Garden Inn", "", 200.0)]),
            ),
            StubSource::new(
                SourceId::Marriott,
                rules,
                Behaviour::Hotels(vec![BaseHotel::new("M1", "Fairfield Inn & Suites", "", 150.0)]),
            ),
        ]);
        let envelope = orchestrator
            .execute(&SearchQuery::new("Austin"), &["0001398".to_string()])
            .await
            .expect("search failed");
        assert_eq!(
            envelope.best_offer.as_ref().map(|o| o.hotel_name.as_str()),
            Some("M1")
        );

        let hilton = restrict_to_owner(envelope, &SourceId::Hilton);
        assert_eq!(hilton.total_results(), 2);
        assert!(hilton.offers.iter().all(|o| o.owner == Some(SourceId::Hilton)));
        let best = hilton.best_offer.expect("best offer");
        assert_eq!(best.owner, Some(SourceId::Hilton));
        assert_eq!(best.variant.discounted_rate, 170.0);
        let sum: f64 = hilton.offers.iter().map(|o| o.variant.savings_amount).sum();
        assert_eq!(hilton.total_savings, sum);
        assert_eq!(hilton.total_savings, 30.0);
        assert_eq!(hilton.sources.len(), 2);
    }

    #[test]
    fn dedupe_is_byte_exact_and_order_preserving() {
        let raw = ["B", "a", "", "A", "B", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(dedupe_codes(&raw), vec!["B", "a", "A"]);
    }
}
