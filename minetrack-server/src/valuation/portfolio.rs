//! Portfolio aggregation across every company.
//!
//! Produces one display-ready record per company so ranking views
//! (most undervalued, largest holder, ...) can sort without re-querying.
//! Recomputes from scratch on every call: settings or multipliers may have
//! changed between calls, and portfolios are small enough that correctness
//! beats caching.

use serde::Serialize;

use super::company::{valuate_company, CompanyFacts};
use super::multiplier::Multiplier;
use super::settings::ValuationSettings;
use super::site::SiteFacts;

/// A company plus the site facts the engine prices it from.
#[derive(Debug, Clone)]
pub struct CompanyWithSites {
    pub id: i64,
    pub name: String,
    pub ticker: Option<String>,
    pub facts: CompanyFacts,
    pub sites: Vec<SiteFacts>,
}

/// One company's valuation with the descriptive fields ranking views need.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyValuationRecord {
    pub id: i64,
    pub name: String,
    pub ticker: Option<String>,
    pub site_value: f64,
    pub btc_value: f64,
    pub hash_rate_value: f64,
    pub total: f64,
    pub market_cap: f64,
    pub diff: f64,
    pub ratio: Option<f64>,
    pub total_mw_energized: f64,
    pub total_mw_capacity: f64,
    pub hash_rate_eh: f64,
    pub btc_holdings: f64,
}

/// Value every company. Output order follows input order (the store lists
/// companies alphabetically); ranking is the consumer's concern.
pub fn valuate_all(
    companies: &[CompanyWithSites],
    settings: &ValuationSettings,
    multipliers: &[Multiplier],
) -> Vec<CompanyValuationRecord> {
    companies
        .iter()
        .map(|c| {
            let valuation = valuate_company(&c.facts, &c.sites, settings, multipliers);
            CompanyValuationRecord {
                id: c.id,
                name: c.name.clone(),
                ticker: c.ticker.clone(),
                site_value: valuation.site_value,
                btc_value: valuation.btc_value,
                hash_rate_value: valuation.hash_rate_value,
                total: valuation.total,
                market_cap: valuation.market_cap,
                diff: valuation.diff,
                ratio: valuation.ratio,
                total_mw_energized: c.sites.iter().map(|s| s.mw_energized).sum(),
                total_mw_capacity: c.sites.iter().map(|s| s.mw_capacity).sum(),
                hash_rate_eh: c.facts.hash_rate_eh,
                btc_holdings: c.facts.btc_holdings,
            }
        })
        .collect()
}
