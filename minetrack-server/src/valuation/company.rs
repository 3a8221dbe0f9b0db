//! Company valuator.
//!
//! Aggregates a company's site valuations and BTC holdings into a fair-value
//! total, then compares it to market capitalization.

use serde::Serialize;

use super::multiplier::Multiplier;
use super::settings::ValuationSettings;
use super::site::{valuate_site, SiteFacts, SiteValuation};

/// The balance-sheet figures the company valuator needs.
#[derive(Debug, Clone, Default)]
pub struct CompanyFacts {
    pub btc_holdings: f64,
    pub hash_rate_eh: f64,
    pub market_cap_usd: Option<f64>,
}

/// A company's derived valuation and market-cap comparison.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyValuation {
    /// Sum of site totals.
    pub site_value: f64,
    /// BTC holdings at the snapshot price.
    pub btc_value: f64,
    /// Hash rate priced at $/EH. Display only: excluded from `total`
    /// because the hash capacity is already priced through site MW.
    pub hash_rate_value: f64,
    pub total: f64,
    /// Market cap, 0 when unknown.
    pub market_cap: f64,
    /// `total - market_cap`.
    pub diff: f64,
    /// `total / market_cap`, or `None` when market cap is zero/unknown
    /// (incomparable, not zero).
    pub ratio: Option<f64>,
}

/// Value a company from its site facts.
pub fn valuate_company(
    company: &CompanyFacts,
    sites: &[SiteFacts],
    settings: &ValuationSettings,
    multipliers: &[Multiplier],
) -> CompanyValuation {
    valuate_company_detailed(company, sites, settings, multipliers).0
}

/// Like [`valuate_company`], but also returns the per-site valuations so
/// detail views can show the breakdown without recomputing.
pub fn valuate_company_detailed(
    company: &CompanyFacts,
    sites: &[SiteFacts],
    settings: &ValuationSettings,
    multipliers: &[Multiplier],
) -> (CompanyValuation, Vec<SiteValuation>) {
    let site_valuations: Vec<SiteValuation> = sites
        .iter()
        .map(|s| valuate_site(s, settings, multipliers))
        .collect();

    let site_value: f64 = site_valuations.iter().map(|v| v.total).sum();
    let btc_value = company.btc_holdings * settings.btc_price;
    let hash_rate_value = company.hash_rate_eh * settings.eh_value;

    let total = site_value + btc_value;
    let market_cap = company.market_cap_usd.unwrap_or(0.0);
    let diff = total - market_cap;
    let ratio = if market_cap > 0.0 {
        Some(total / market_cap)
    } else {
        None
    };

    (
        CompanyValuation {
            site_value,
            btc_value,
            hash_rate_value,
            total,
            market_cap,
            diff,
            ratio,
        },
        site_valuations,
    )
}
