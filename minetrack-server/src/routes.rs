//! HTTP routes for the tracker service.
//!
//! Handlers stay thin: extract, call the store or the valuation engine, and
//! translate errors through `Error::status_code()`. All valuation handlers
//! read one fresh snapshot (settings + multipliers + entities) per request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::btc_price::BtcPriceQuote;
use crate::model::{
    Company, CompanyInput, Hardware, HardwareInput, MultiplierInput, NewsInput, NewsItem,
    ReviewInput, ReviewItem, ReviewStatus, Site, SiteFilter, SiteInput, SiteSummary, Subsite,
    SubsiteInput,
};
use crate::store::StatsSnapshot;
use crate::valuation::{
    valuate_company_detailed, valuate_scenario, CompanyFacts, CompanyValuation,
    CompanyValuationRecord, Multiplier, ScenarioOutcome, SiteValuation, ValuationSettings,
};
use crate::TrackerState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// A company detail with its site summaries attached.
#[derive(Debug, Serialize)]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub sites: Vec<SiteSummary>,
}

/// A site detail with its sub-sites attached.
#[derive(Debug, Serialize)]
pub struct SiteDetail {
    #[serde(flatten)]
    pub site: Site,
    pub subsites: Vec<Subsite>,
}

/// Settings read: the raw map, the parsed snapshot, and every multiplier.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: HashMap<String, String>,
    pub snapshot: ValuationSettings,
    pub multipliers: Vec<Multiplier>,
}

/// One site with its valuation, for the company valuation detail.
#[derive(Debug, Serialize)]
pub struct SiteValuationEntry {
    #[serde(flatten)]
    pub site: SiteSummary,
    pub valuation: SiteValuation,
}

/// Full company valuation: entity, per-site breakdowns, aggregate, and the
/// settings snapshot the numbers came from.
#[derive(Debug, Serialize)]
pub struct CompanyValuationResponse {
    pub company: Company,
    pub sites: Vec<SiteValuationEntry>,
    pub valuation: CompanyValuation,
    pub settings: ValuationSettings,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct DecideReviewRequest {
    pub action: String,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub status: Option<String>,
    pub company_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubsiteQuery {
    pub site_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HardwareQuery {
    pub subsite_id: Option<i64>,
}

// ============================================================================
// Helpers
// ============================================================================

fn store_err(err: minetrack_common::Error) -> StatusCode {
    let code = err.status_code();
    if code >= 500 {
        tracing::error!(error = %err, "Store operation failed");
    }
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<ReviewStatus>, StatusCode> {
    match raw {
        None => Ok(None),
        Some(s) => ReviewStatus::parse(s)
            .map(Some)
            .ok_or(StatusCode::BAD_REQUEST),
    }
}

fn updated_or_404(updated: bool, what: &str) -> Result<Json<MessageResponse>, StatusCode> {
    if updated {
        Ok(Json(MessageResponse {
            message: format!("{what} updated"),
        }))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

fn deleted_or_404(deleted: bool, what: &str) -> Result<Json<MessageResponse>, StatusCode> {
    if deleted {
        Ok(Json(MessageResponse {
            message: format!("{what} deleted"),
        }))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "minetrack-server".to_string(),
    })
}

// ============================================================================
// Companies
// ============================================================================

pub async fn list_companies(
    State(state): State<Arc<TrackerState>>,
) -> Result<Json<Vec<Company>>, StatusCode> {
    state.store.list_companies().await.map(Json).map_err(store_err)
}

pub async fn get_company(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<CompanyDetail>, StatusCode> {
    let company = state
        .store
        .get_company(id)
        .await
        .map_err(store_err)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let sites = state
        .store
        .site_summaries_for_company(id)
        .await
        .map_err(store_err)?;
    Ok(Json(CompanyDetail { company, sites }))
}

pub async fn create_company(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<CompanyInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_company(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Company created".into(),
    }))
}

pub async fn update_company(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(input): Json<CompanyInput>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let updated = state
        .store
        .update_company(id, &input)
        .await
        .map_err(store_err)?;
    updated_or_404(updated, "Company")
}

pub async fn delete_company(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_company(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "Company")
}

// ============================================================================
// Sites
// ============================================================================

pub async fn list_sites(
    State(state): State<Arc<TrackerState>>,
    Query(filter): Query<SiteFilter>,
) -> Result<Json<Vec<SiteSummary>>, StatusCode> {
    state
        .store
        .list_site_summaries(&filter)
        .await
        .map(Json)
        .map_err(store_err)
}

pub async fn get_site(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<SiteDetail>, StatusCode> {
    let site = state
        .store
        .get_site(id)
        .await
        .map_err(store_err)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let subsites = state
        .store
        .list_subsites(Some(id))
        .await
        .map_err(store_err)?;
    Ok(Json(SiteDetail { site, subsites }))
}

pub async fn create_site(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<SiteInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_site(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Site created".into(),
    }))
}

pub async fn update_site(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(input): Json<SiteInput>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let updated = state.store.update_site(id, &input).await.map_err(store_err)?;
    updated_or_404(updated, "Site")
}

pub async fn delete_site(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_site(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "Site")
}

// ============================================================================
// Sub-sites
// ============================================================================

pub async fn list_subsites(
    State(state): State<Arc<TrackerState>>,
    Query(query): Query<SubsiteQuery>,
) -> Result<Json<Vec<Subsite>>, StatusCode> {
    state
        .store
        .list_subsites(query.site_id)
        .await
        .map(Json)
        .map_err(store_err)
}

pub async fn create_subsite(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<SubsiteInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_subsite(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Subsite created".into(),
    }))
}

pub async fn update_subsite(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(input): Json<SubsiteInput>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let updated = state
        .store
        .update_subsite(id, &input)
        .await
        .map_err(store_err)?;
    updated_or_404(updated, "Subsite")
}

pub async fn delete_subsite(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_subsite(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "Subsite")
}

// ============================================================================
// Hardware
// ============================================================================

pub async fn list_hardware(
    State(state): State<Arc<TrackerState>>,
    Query(query): Query<HardwareQuery>,
) -> Result<Json<Vec<Hardware>>, StatusCode> {
    state
        .store
        .list_hardware(query.subsite_id)
        .await
        .map(Json)
        .map_err(store_err)
}

pub async fn create_hardware(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<HardwareInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_hardware(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Hardware created".into(),
    }))
}

pub async fn delete_hardware(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_hardware(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "Hardware")
}

// ============================================================================
// News
// ============================================================================

pub async fn list_news(
    State(state): State<Arc<TrackerState>>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<Vec<NewsItem>>, StatusCode> {
    let status = parse_status_filter(query.status.as_deref())?;
    state
        .store
        .list_news(status, query.company_id)
        .await
        .map(Json)
        .map_err(store_err)
}

pub async fn create_news(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<NewsInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_news(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "News created".into(),
    }))
}

pub async fn update_news(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(input): Json<NewsInput>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let updated = state.store.update_news(id, &input).await.map_err(store_err)?;
    updated_or_404(updated, "News")
}

pub async fn delete_news(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_news(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "News")
}

// ============================================================================
// Review Queue
// ============================================================================

pub async fn list_review(
    State(state): State<Arc<TrackerState>>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<ReviewItem>>, StatusCode> {
    let status = parse_status_filter(query.status.as_deref())?;
    state.store.list_review(status).await.map(Json).map_err(store_err)
}

pub async fn create_review(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state.store.create_review(&input).await.map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Review item created".into(),
    }))
}

pub async fn decide_review(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(request): Json<DecideReviewRequest>,
) -> Result<Json<ReviewItem>, StatusCode> {
    let approve = match request.action.as_str() {
        "approve" => true,
        "reject" => false,
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    state
        .store
        .decide_review(id, approve, request.reviewer_notes.as_deref())
        .await
        .map(Json)
        .map_err(store_err)
}

// ============================================================================
// Settings & Multipliers
// ============================================================================

pub async fn get_settings(
    State(state): State<Arc<TrackerState>>,
) -> Result<Json<SettingsResponse>, StatusCode> {
    let settings = state.store.settings_map().await.map_err(store_err)?;
    let multipliers = state.store.list_multipliers().await.map_err(store_err)?;
    let snapshot = ValuationSettings::from_kv(&settings);
    Ok(Json(SettingsResponse {
        settings,
        snapshot,
        multipliers,
    }))
}

pub async fn update_setting(
    State(state): State<Arc<TrackerState>>,
    Path(key): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let value = match request.value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    state
        .store
        .update_setting(&key, &value)
        .await
        .map_err(store_err)?;
    Ok(Json(MessageResponse {
        message: "Setting updated".into(),
    }))
}

pub async fn create_multiplier(
    State(state): State<Arc<TrackerState>>,
    Json(input): Json<MultiplierInput>,
) -> Result<Json<CreatedResponse>, StatusCode> {
    let id = state
        .store
        .create_multiplier(&input)
        .await
        .map_err(store_err)?;
    Ok(Json(CreatedResponse {
        id,
        message: "Multiplier created".into(),
    }))
}

pub async fn update_multiplier(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    Json(input): Json<MultiplierInput>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let updated = state
        .store
        .update_multiplier(id, &input)
        .await
        .map_err(store_err)?;
    updated_or_404(updated, "Multiplier")
}

pub async fn delete_multiplier(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let deleted = state.store.delete_multiplier(id).await.map_err(store_err)?;
    deleted_or_404(deleted, "Multiplier")
}

// ============================================================================
// Valuation
// ============================================================================

pub async fn valuation_company(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
) -> Result<Json<CompanyValuationResponse>, StatusCode> {
    let company = state
        .store
        .get_company(id)
        .await
        .map_err(store_err)?
        .ok_or(StatusCode::NOT_FOUND)?;

    // One consistent snapshot for the whole computation.
    let settings = state.store.valuation_settings().await.map_err(store_err)?;
    let multipliers = state.store.list_multipliers().await.map_err(store_err)?;
    let summaries = state
        .store
        .site_summaries_for_company(id)
        .await
        .map_err(store_err)?;

    let facts = CompanyFacts {
        btc_holdings: company.btc_holdings,
        hash_rate_eh: company.hash_rate_eh,
        market_cap_usd: company.market_cap_usd,
    };
    let site_facts: Vec<_> = summaries.iter().map(Into::into).collect();
    let (valuation, site_valuations) =
        valuate_company_detailed(&facts, &site_facts, &settings, &multipliers);

    let sites = summaries
        .into_iter()
        .zip(site_valuations)
        .map(|(site, valuation)| SiteValuationEntry { site, valuation })
        .collect();

    Ok(Json(CompanyValuationResponse {
        company,
        sites,
        valuation,
        settings,
    }))
}

pub async fn valuation_all(
    State(state): State<Arc<TrackerState>>,
) -> Result<Json<Vec<CompanyValuationRecord>>, StatusCode> {
    let settings = state.store.valuation_settings().await.map_err(store_err)?;
    let multipliers = state.store.list_multipliers().await.map_err(store_err)?;
    let portfolio = state.store.valuation_portfolio().await.map_err(store_err)?;

    Ok(Json(crate::valuation::valuate_all(
        &portfolio,
        &settings,
        &multipliers,
    )))
}

// ============================================================================
// Scenario & BTC Price
// ============================================================================

pub async fn run_scenario(
    State(state): State<Arc<TrackerState>>,
    Json(overrides): Json<HashMap<String, f64>>,
) -> Result<Json<ScenarioOutcome>, StatusCode> {
    let settings = state.store.valuation_settings().await.map_err(store_err)?;
    let multipliers = state.store.list_multipliers().await.map_err(store_err)?;
    let portfolio = state.store.valuation_portfolio().await.map_err(store_err)?;

    Ok(Json(valuate_scenario(
        &overrides,
        &settings,
        &portfolio,
        &multipliers,
    )))
}

pub async fn get_btc_price(State(state): State<Arc<TrackerState>>) -> Json<BtcPriceQuote> {
    Json(state.btc_price.fetch().await)
}

// ============================================================================
// Stats
// ============================================================================

pub async fn get_stats(
    State(state): State<Arc<TrackerState>>,
) -> Result<Json<StatsSnapshot>, StatusCode> {
    state.store.stats().await.map(Json).map_err(store_err)
}
