//! What-if evaluation over an ephemeral settings overlay.
//!
//! Runs the same portfolio computation as the live dashboard, but against a
//! settings snapshot built from caller-supplied overrides. Nothing is ever
//! written back; saving a scenario as the new defaults is a separate,
//! explicit settings-write path.

use std::collections::HashMap;

use serde::Serialize;

use super::multiplier::Multiplier;
use super::portfolio::{valuate_all, CompanyValuationRecord, CompanyWithSites};
use super::settings::ValuationSettings;

/// Summed dashboard totals over a result set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioTotals {
    pub valuation: f64,
    pub market_cap: f64,
    pub diff: f64,
}

/// A full scenario run: per-company records plus their totals.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub results: Vec<CompanyValuationRecord>,
    pub totals: ScenarioTotals,
}

/// Sum a result set into dashboard totals.
///
/// This is the single summation implementation; scenario totals and any
/// live dashboard totals must both go through it so the two views never
/// drift.
pub fn totals_of(results: &[CompanyValuationRecord]) -> ScenarioTotals {
    ScenarioTotals {
        valuation: results.iter().map(|r| r.total).sum(),
        market_cap: results.iter().map(|r| r.market_cap).sum(),
        diff: results.iter().map(|r| r.diff).sum(),
    }
}

/// Evaluate a scenario: overlay the overrides onto the base snapshot and
/// value the whole portfolio with the result.
pub fn valuate_scenario(
    overrides: &HashMap<String, f64>,
    base: &ValuationSettings,
    companies: &[CompanyWithSites],
    multipliers: &[Multiplier],
) -> ScenarioOutcome {
    let settings = base.overlay(overrides);
    let results = valuate_all(companies, &settings, multipliers);
    let totals = totals_of(&results);
    ScenarioOutcome { results, totals }
}
