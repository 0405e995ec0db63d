use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::compare::deals::{best_deals, BestDeals};
use crate::compare::group::{group_by_brand, group_by_owner};
use crate::compare::rank::{rank, RankKey, SortOrder};
use crate::compare::stats::{stats, RateStats};
use crate::compare::{best_case_savings, compare_pair, PairComparison};
use crate::config::Config;
use crate::discount::{DiscountRule, DiscountRuleTable};
use crate::narrative::{
    narrate_or_fallback, narrator_or_template, NarrativeSummary, Narrator, TemplateNarrator,
};
use crate::search::{restrict_to_owner, SearchError, SearchOrchestrator};
use crate::store::{
    record_search, saved_code_values, RateStore, SavedCode, SearchRecord, WalletError,
};
use crate::types::{Offer, ResultEnvelope, SearchQuery, SourceId};

#[derive(Clone)]
pub struct ApiState {
    config: Config,
    rules: Arc<DiscountRuleTable>,
    orchestrator: Arc<SearchOrchestrator>,
    narrator: Arc<dyn Narrator>,
    db_path: PathBuf,
}

impl ApiState {
    pub fn from_config(config: Config) -> Result<Self> {
        let rules = Arc::new(config.rule_table()?);
        let orchestrator = SearchOrchestrator::from_config(&config, rules.clone())?;
        let narrator: Arc<dyn Narrator> = Arc::from(narrator_or_template(
            &config.narrative,
            orchestrator.registry().len(),
        ));
        Ok(Self {
            db_path: config.resolved_db_path(),
            config,
            rules,
            orchestrator: Arc::new(orchestrator),
            narrator,
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::InvalidQuery(_) => Self::bad_request(error.to_string()),
            SearchError::NoSources => Self::internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct SearchRequest {
    location: String,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    guests: Option<u32>,
    #[serde(default)]
    codes: Vec<String>,
    #[serde(default = "default_true")]
    use_saved_codes: bool,
    #[serde(default = "default_true")]
    persist: bool,
    #[serde(default)]
    narrate: bool,
    sort: Option<String>,
    order: Option<String>,
    owner: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RankRequest {
    offers: Vec<Offer>,
    by: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroupRequest {
    offers: Vec<Offer>,
    by: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OffersRequest {
    offers: Vec<Offer>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompareRequest {
    a: Offer,
    b: Offer,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct NewCodeRequest {
    corporate_name: String,
    code_value: String,
    notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpdateNotesRequest {
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    search_id: Option<i64>,
    #[serde(flatten)]
    envelope: ResultEnvelope,
    total_results: usize,
    stats: RateStats,
    best_case_savings: f64,
    best_deals: BestDeals,
    narrative: Option<NarrativeSummary>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    stats: RateStats,
    best_case_savings: f64,
}

#[derive(Debug, Serialize)]
struct SourceInfo {
    id: SourceId,
    name: String,
    brands: Vec<String>,
    rules: Vec<DiscountRule>,
}

#[derive(Debug, Serialize)]
struct HistoryDetail {
    record: SearchRecord,
    offers: Vec<Offer>,
    stats: RateStats,
    best_deals: BestDeals,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/sources", get(list_sources))
        .route("/v1/search", post(search))
        .route("/v1/rank", post(rank_offers))
        .route("/v1/group", post(group_offers))
        .route("/v1/stats", post(offer_stats))
        .route("/v1/deals", post(offer_deals))
        .route("/v1/compare", post(compare_offers))
        .route("/v1/history", get(history))
        .route("/v1/history/:id", get(history_detail))
        .route("/v1/codes", get(list_codes).post(add_code))
        .route("/v1/codes/:id", axum::routing::patch(update_code).delete(delete_code))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn list_sources(State(state): State<ApiState>) -> Json<ApiResponse<Vec<SourceInfo>>> {
    let sources = state
        .orchestrator
        .registry()
        .sources()
        .iter()
        .map(|source| {
            let id = source.id();
            SourceInfo {
                name: source.name().to_string(),
                brands: source.brands().iter().map(|b| b.to_string()).collect(),
                rules: state.rules.rules_for(&id).into_iter().cloned().collect(),
                id,
            }
        })
        .collect();
    ok(sources)
}

async fn search(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let key = parse_rank_key(request.sort.as_deref())?;
    let order = parse_sort_order(request.order.as_deref())?;
    let owner = request
        .owner
        .as_deref()
        .map(SourceId::from_str)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let query = SearchQuery {
        location: request.location,
        check_in: request.check_in,
        check_out: request.check_out,
        guests: request.guests.unwrap_or(state.config.search.default_guests),
        discount_codes: request.codes,
    };
    query
        .validate()
        .map_err(|e| ApiError::from(SearchError::from(e)))?;

    let saved_codes = if request.use_saved_codes {
        saved_code_values(&state.db_path)
    } else {
        Vec::new()
    };

    let envelope = state.orchestrator.execute(&query, &saved_codes).await?;

    let search_id = if request.persist {
        record_search(&state.db_path, &envelope)
    } else {
        None
    };

    let mut envelope = match &owner {
        Some(owner) => restrict_to_owner(envelope, owner),
        None => envelope,
    };

    let narrative = if request.narrate {
        let fallback = TemplateNarrator::new(state.orchestrator.registry().len());
        Some(
            narrate_or_fallback(
                state.narrator.as_ref(),
                &fallback,
                &envelope.offers,
                &envelope.codes_tried,
            )
            .await,
        )
    } else {
        None
    };

    let stats_view = stats(&envelope.offers);
    let best_case = best_case_savings(&envelope.offers);
    let deals = best_deals(&envelope.offers);
    envelope.offers = rank(&envelope.offers, key, order);

    Ok(ok(SearchResponse {
        search_id,
        total_results: envelope.total_results(),
        envelope,
        stats: stats_view,
        best_case_savings: best_case,
        best_deals: deals,
        narrative,
    }))
}

async fn rank_offers(Json(request): Json<RankRequest>) -> ApiResult<Vec<Offer>> {
    let key = parse_rank_key(request.by.as_deref())?;
    let order = parse_sort_order(request.order.as_deref())?;
    Ok(ok(rank(&request.offers, key, order)))
}

async fn group_offers(
    State(state): State<ApiState>,
    Json(request): Json<GroupRequest>,
) -> ApiResult<BTreeMap<String, Vec<Offer>>> {
    let grouped = match request.by.trim().to_ascii_lowercase().as_str() {
        "owner" | "source" => group_by_owner(&request.offers, &state.orchestrator.registered()),
        "brand" => group_by_brand(&request.offers),
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown grouping: {other} (expected owner or brand)"
            )))
        }
    };
    Ok(ok(grouped))
}

async fn offer_stats(Json(request): Json<OffersRequest>) -> ApiResult<StatsResponse> {
    Ok(ok(StatsResponse {
        stats: stats(&request.offers),
        best_case_savings: best_case_savings(&request.offers),
    }))
}

async fn offer_deals(Json(request): Json<OffersRequest>) -> ApiResult<BestDeals> {
    Ok(ok(best_deals(&request.offers)))
}

async fn compare_offers(Json(request): Json<CompareRequest>) -> ApiResult<PairComparison> {
    Ok(ok(compare_pair(&request.a, &request.b)))
}

async fn history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<SearchRecord>> {
    let store = open_store(&state)?;
    let records = store
        .load_history(query.limit.unwrap_or(20))
        .map_err(ApiError::internal)?;
    Ok(ok(records))
}

async fn history_detail(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<HistoryDetail> {
    let store = open_store(&state)?;
    let Some(record) = store.load_search(id).map_err(ApiError::internal)? else {
        return Err(ApiError::not_found(format!("search {id} not found")));
    };
    let offers = store.load_offers(id).map_err(ApiError::internal)?;
    Ok(ok(HistoryDetail {
        record,
        stats: stats(&offers),
        best_deals: best_deals(&offers),
        offers,
    }))
}

async fn list_codes(State(state): State<ApiState>) -> ApiResult<Vec<SavedCode>> {
    let store = open_store(&state)?;
    Ok(ok(store.list_codes().map_err(ApiError::internal)?))
}

async fn add_code(
    State(state): State<ApiState>,
    Json(request): Json<NewCodeRequest>,
) -> ApiResult<SavedCode> {
    let store = open_store(&state)?;
    let saved = store
        .add_code(
            &request.corporate_name,
            &request.code_value,
            request.notes.as_deref(),
        )
        .map_err(|e| match e.downcast_ref::<WalletError>() {
            Some(wallet) => ApiError::bad_request(wallet.to_string()),
            None => ApiError::internal(e),
        })?;
    Ok(ok(saved))
}

async fn update_code(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateNotesRequest>,
) -> ApiResult<SavedCode> {
    let store = open_store(&state)?;
    match store
        .update_code_notes(id, request.notes.as_deref())
        .map_err(ApiError::internal)?
    {
        Some(code) => Ok(ok(code)),
        None => Err(ApiError::not_found(format!("code {id} not found"))),
    }
}

async fn delete_code(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<SavedCode> {
    let store = open_store(&state)?;
    match store.delete_code(id).map_err(ApiError::internal)? {
        Some(code) => Ok(ok(code)),
        None => Err(ApiError::not_found(format!("code {id} not found"))),
    }
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn default_true() -> bool {
    true
}

fn open_store(state: &ApiState) -> std::result::Result<RateStore, ApiError> {
    RateStore::open(&state.db_path).map_err(ApiError::internal)
}

fn parse_rank_key(raw: Option<&str>) -> std::result::Result<RankKey, ApiError> {
    raw.map(RankKey::from_str)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_sort_order(raw: Option<&str>) -> std::result::Result<SortOrder, ApiError> {
    raw.map(SortOrder::from_str)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}
