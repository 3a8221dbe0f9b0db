//! Entity types for companies, sites, sub-sites, hardware, news, and the
//! review queue.
//!
//! These mirror the rows the store persists. MW contracted/energized figures
//! live on sub-sites and are rolled up into [`SiteSummary`] at read time, so
//! a site's three-band MW picture is always an aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Site Status
// ============================================================================

/// Lifecycle status of a mining site or sub-site phase.
///
/// Stored as text; unknown values parse to `None` and are valued with a
/// neutral discount rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Planned,
    UnderConstruction,
    Operational,
    Curtailed,
    Closed,
}

impl SiteStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [SiteStatus; 5] = [
        Self::Planned,
        Self::UnderConstruction,
        Self::Operational,
        Self::Curtailed,
        Self::Closed,
    ];

    /// Parse the stored text form. Unknown text is `None`, not an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "under_construction" => Some(Self::UnderConstruction),
            "operational" => Some(Self::Operational),
            "curtailed" => Some(Self::Curtailed),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::UnderConstruction => "under_construction",
            Self::Operational => "operational",
            Self::Curtailed => "curtailed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Companies
// ============================================================================

/// A mining company and its balance-sheet figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub ticker: Option<String>,
    pub website: Option<String>,
    /// BTC held on the balance sheet.
    pub btc_holdings: f64,
    /// Self-mining hash rate in EH/s.
    pub hash_rate_eh: f64,
    /// Market capitalization in USD; `None` when unknown (private or unlisted).
    pub market_cap_usd: Option<f64>,
    pub debt_usd: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial company fields for create/update requests.
///
/// Absent fields keep their current value on update (the COALESCE rule);
/// on create they take the column default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub website: Option<String>,
    pub btc_holdings: Option<f64>,
    pub hash_rate_eh: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub debt_usd: Option<f64>,
    pub notes: Option<String>,
}

// ============================================================================
// Sites
// ============================================================================

/// A physical facility location owned by a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Physical maximum capacity in MW.
    pub mw_capacity: f64,
    /// Raw stored status text (parse with [`SiteStatus::parse`]).
    pub status: String,
    pub utility_provider: Option<String>,
    pub power_cost_kwh: Option<f64>,
    pub power_source: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn status(&self) -> Option<SiteStatus> {
        SiteStatus::parse(&self.status)
    }
}

/// A site with its company name and sub-site MW figures rolled up.
///
/// This is the shape valuation and listing read: `mw_contracted` and
/// `mw_energized` are sums over the site's sub-sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSummary {
    pub id: i64,
    pub company_id: i64,
    pub company_name: String,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: String,
    pub status: String,
    pub mw_capacity: f64,
    pub mw_contracted: f64,
    pub mw_energized: f64,
    pub power_cost_kwh: Option<f64>,
}

impl SiteSummary {
    pub fn status(&self) -> Option<SiteStatus> {
        SiteStatus::parse(&self.status)
    }
}

/// Partial site fields for create/update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteInput {
    pub company_id: Option<i64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub mw_capacity: Option<f64>,
    pub status: Option<String>,
    pub utility_provider: Option<String>,
    pub power_cost_kwh: Option<f64>,
    pub power_source: Option<String>,
    pub notes: Option<String>,
}

/// Listing filters for `GET /api/v1/sites`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteFilter {
    pub state: Option<String>,
    pub status: Option<String>,
    pub company_id: Option<i64>,
    /// Minimum MW capacity.
    pub min_mw: Option<f64>,
}

// ============================================================================
// Sub-sites
// ============================================================================

/// A phase or building within a site. Carries the contracted/energized MW
/// that roll up into the parent site's summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsite {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub mw_contracted: f64,
    pub mw_energized: f64,
    pub hash_rate_eh: f64,
    pub status: String,
    pub energization_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial sub-site fields for create/update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubsiteInput {
    pub site_id: Option<i64>,
    pub name: Option<String>,
    pub mw_contracted: Option<f64>,
    pub mw_energized: Option<f64>,
    pub hash_rate_eh: Option<f64>,
    pub status: Option<String>,
    pub energization_date: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// Hardware
// ============================================================================

/// A deployed hardware fleet entry within a sub-site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hardware {
    pub id: i64,
    pub subsite_id: i64,
    pub model: String,
    pub manufacturer: Option<String>,
    pub quantity: i64,
    pub hash_rate_th_each: Option<f64>,
    pub power_watts_each: Option<f64>,
    pub status: String,
    pub deployment_date: Option<String>,
    pub notes: Option<String>,
}

/// Fields for creating a hardware entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HardwareInput {
    pub subsite_id: Option<i64>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub quantity: Option<i64>,
    pub hash_rate_th_each: Option<f64>,
    pub power_watts_each: Option<f64>,
    pub status: Option<String>,
    pub deployment_date: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// Multipliers
// ============================================================================

/// Partial multiplier fields for create/update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MultiplierInput {
    pub name: Option<String>,
    pub factor: Option<f64>,
    pub scope: Option<crate::valuation::MultiplierScope>,
    pub scope_value: Option<String>,
    pub active: Option<bool>,
    pub description: Option<String>,
}

// ============================================================================
// News & Review Queue
// ============================================================================

/// Review lifecycle state: `pending → approved|rejected`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the state accepts a decision (only `pending` does).
    pub const fn is_decidable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A news item tracked against a company or site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub company_id: Option<i64>,
    pub site_id: Option<i64>,
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub publish_date: Option<String>,
    pub summary: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Partial news fields for create/update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsInput {
    pub company_id: Option<i64>,
    pub site_id: Option<i64>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub publish_date: Option<String>,
    pub summary: Option<String>,
    pub status: Option<ReviewStatus>,
}

/// A proposed data change awaiting human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    /// Proposed change payload, kept as an opaque JSON blob.
    pub proposed_data: serde_json::Value,
    pub source: Option<String>,
    pub status: ReviewStatus,
    pub reviewer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fields for enqueueing a review item.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub proposed_data: serde_json::Value,
    pub source: Option<String>,
}
