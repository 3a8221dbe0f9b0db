//! Site valuator.
//!
//! Prices one site by partitioning its capacity into three non-overlapping
//! MW bands (energized / contracted-but-idle / planned), then applying the
//! status discount, the power-cost tier, and every matching multiplier.
//!
//! The band breakdown in the result is deliberately left unadjusted: the
//! discount, tier, and multiplier effects show up only in `total`, which is
//! what consumers display next to the raw band composition.

use serde::Serialize;
use tracing::warn;

use crate::model::{SiteStatus, SiteSummary};

use super::multiplier::Multiplier;
use super::settings::ValuationSettings;

/// The facts the valuator needs about one site.
#[derive(Debug, Clone, Default)]
pub struct SiteFacts {
    pub site_id: i64,
    pub company_id: i64,
    pub name: String,
    pub state: Option<String>,
    pub status: Option<SiteStatus>,
    pub mw_capacity: f64,
    pub mw_contracted: f64,
    pub mw_energized: f64,
    pub power_cost_kwh: Option<f64>,
}

impl From<&SiteSummary> for SiteFacts {
    fn from(s: &SiteSummary) -> Self {
        Self {
            site_id: s.id,
            company_id: s.company_id,
            name: s.name.clone(),
            state: s.state.clone(),
            status: s.status(),
            mw_capacity: s.mw_capacity,
            mw_contracted: s.mw_contracted,
            mw_energized: s.mw_energized,
            power_cost_kwh: s.power_cost_kwh,
        }
    }
}

/// The three raw MW band values, before any adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandBreakdown {
    pub energized_value: f64,
    pub contracted_value: f64,
    pub planned_value: f64,
}

/// One site's valuation: the fully adjusted total plus the raw bands.
#[derive(Debug, Clone, Serialize)]
pub struct SiteValuation {
    pub site_id: i64,
    /// Value after discount, power tier, and multipliers.
    pub total: f64,
    /// The status discount that was applied.
    pub discount: f64,
    /// Raw band values, untouched by any adjustment.
    pub breakdown: BandBreakdown,
}

/// Value one site against a settings snapshot and multiplier list.
///
/// Pure: missing figures are zero, nothing errors, and the same inputs
/// always produce bit-identical output. Multipliers are applied in
/// ascending-id order so floating-point rounding is reproducible.
pub fn valuate_site(
    facts: &SiteFacts,
    settings: &ValuationSettings,
    multipliers: &[Multiplier],
) -> SiteValuation {
    if facts.mw_energized > facts.mw_contracted || facts.mw_contracted > facts.mw_capacity {
        // Bad entry data: bands can go negative below. Warn, never clamp.
        warn!(
            site_id = facts.site_id,
            site = %facts.name,
            capacity = facts.mw_capacity,
            contracted = facts.mw_contracted,
            energized = facts.mw_energized,
            "MW figures out of order (expected energized <= contracted <= capacity)"
        );
    }

    let energized_value = facts.mw_energized * settings.mw_value_energized;
    let contracted_value =
        (facts.mw_contracted - facts.mw_energized) * settings.mw_value_contracted;
    let planned_value = (facts.mw_capacity - facts.mw_contracted) * settings.mw_value_planned;

    let mut total = energized_value + contracted_value + planned_value;

    let discount = settings.discount_for(facts.status);
    total *= discount;

    if let Some(cost) = facts.power_cost_kwh {
        if cost < settings.power_tier_cheap_threshold {
            total *= settings.power_tier_cheap_multiplier;
        } else if cost > settings.power_tier_expensive_threshold {
            total *= settings.power_tier_expensive_multiplier;
        }
        // Costs on or between the thresholds are left alone.
    }

    let mut applicable: Vec<&Multiplier> =
        multipliers.iter().filter(|m| m.matches(facts)).collect();
    applicable.sort_by_key(|m| m.id);
    for m in applicable {
        total *= m.factor;
    }

    SiteValuation {
        site_id: facts.site_id,
        total,
        discount,
        breakdown: BandBreakdown {
            energized_value,
            contracted_value,
            planned_value,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::MultiplierScope;

    fn facts(capacity: f64, contracted: f64, energized: f64) -> SiteFacts {
        SiteFacts {
            site_id: 1,
            company_id: 1,
            name: "West Plant".into(),
            state: Some("TX".into()),
            status: Some(SiteStatus::Operational),
            mw_capacity: capacity,
            mw_contracted: contracted,
            mw_energized: energized,
            power_cost_kwh: None,
        }
    }

    fn settings() -> ValuationSettings {
        ValuationSettings {
            discount_operational: Some(1.0),
            ..ValuationSettings::default()
        }
    }

    fn multiplier(id: i64, factor: f64, scope: MultiplierScope, value: Option<&str>) -> Multiplier {
        Multiplier {
            id,
            name: format!("m{id}"),
            factor,
            scope,
            scope_value: value.map(String::from),
            active: true,
            description: None,
        }
    }

    #[test]
    fn test_operational_site_full_bands() {
        // capacity=100, contracted=50, energized=50:
        // 50 MW energized + 0 MW contracted-idle + 50 MW planned.
        let v = valuate_site(&facts(100.0, 50.0, 50.0), &settings(), &[]);
        assert_eq!(v.breakdown.energized_value, 100_000_000.0);
        assert_eq!(v.breakdown.contracted_value, 0.0);
        assert_eq!(v.breakdown.planned_value, 25_000_000.0);
        assert_eq!(v.total, 125_000_000.0);
        assert_eq!(v.discount, 1.0);
    }

    #[test]
    fn test_closed_site_fallback_discount() {
        let mut f = facts(100.0, 50.0, 50.0);
        f.status = Some(SiteStatus::Closed);
        let v = valuate_site(&f, &settings(), &[]);
        assert_eq!(v.total, 12_500_000.0);
        assert_eq!(v.discount, 0.1);
        // Breakdown stays raw: the discount is only in the total.
        assert_eq!(v.breakdown.energized_value, 100_000_000.0);
    }

    #[test]
    fn test_band_partition_conservation() {
        // The three band widths must use each MW exactly once.
        let f = facts(180.0, 120.0, 45.0);
        let width_sum = f.mw_energized
            + (f.mw_contracted - f.mw_energized)
            + (f.mw_capacity - f.mw_contracted);
        assert_eq!(width_sum, f.mw_capacity);

        // With all three $/MW rates equal, the raw value collapses to
        // capacity x rate.
        let s = ValuationSettings {
            mw_value_energized: 1_000_000.0,
            mw_value_contracted: 1_000_000.0,
            mw_value_planned: 1_000_000.0,
            ..settings()
        };
        let v = valuate_site(&f, &s, &[]);
        assert_eq!(v.total, 180.0 * 1_000_000.0);
    }

    #[test]
    fn test_unknown_status_is_neutral() {
        let mut f = facts(100.0, 50.0, 50.0);
        f.status = None;
        let v = valuate_site(&f, &settings(), &[]);
        assert_eq!(v.total, 125_000_000.0);
        assert_eq!(v.discount, 1.0);
    }

    #[test]
    fn test_negative_bands_flow_through_unclamped() {
        // energized > contracted: the contracted band goes negative and is
        // allowed to pull the total down.
        let v = valuate_site(&facts(100.0, 30.0, 50.0), &settings(), &[]);
        assert_eq!(v.breakdown.contracted_value, -20_000_000.0);
        assert_eq!(
            v.total,
            50.0 * 2_000_000.0 - 20.0 * 1_000_000.0 + 70.0 * 500_000.0
        );
    }

    #[test]
    fn test_cheap_power_tier() {
        let mut f = facts(0.0, 0.0, 50.0);
        f.mw_capacity = 50.0;
        f.mw_contracted = 50.0;
        f.power_cost_kwh = Some(0.02);
        let s = ValuationSettings {
            mw_value_energized: 2_000.0,
            ..settings()
        };
        // Pre-tier value 100,000, cheap multiplier 1.2.
        let v = valuate_site(&f, &s, &[]);
        assert_eq!(v.total, 120_000.0);
    }

    #[test]
    fn test_expensive_power_tier() {
        let mut f = facts(50.0, 50.0, 50.0);
        f.power_cost_kwh = Some(0.08);
        let v = valuate_site(&f, &settings(), &[]);
        assert_eq!(v.total, 50.0 * 2_000_000.0 * 0.8);
    }

    #[test]
    fn test_tier_boundaries_are_inclusive_middle() {
        // Costs exactly on either threshold get no adjustment.
        for cost in [0.03, 0.045, 0.06] {
            let mut f = facts(50.0, 50.0, 50.0);
            f.power_cost_kwh = Some(cost);
            let v = valuate_site(&f, &settings(), &[]);
            assert_eq!(v.total, 100_000_000.0, "cost {cost} should be untouched");
        }
    }

    #[test]
    fn test_no_power_cost_no_tier() {
        let v = valuate_site(&facts(50.0, 50.0, 50.0), &settings(), &[]);
        assert_eq!(v.total, 100_000_000.0);
    }

    #[test]
    fn test_multipliers_compound_commutatively() {
        let mut f = facts(0.0, 0.0, 0.0);
        f.mw_capacity = 50.0;
        f.mw_contracted = 50.0;
        f.mw_energized = 50.0;
        let s = ValuationSettings {
            mw_value_energized: 2_000.0,
            ..settings()
        };

        let global = multiplier(1, 1.1, MultiplierScope::Global, None);
        let texas = multiplier(2, 0.9, MultiplierScope::State, Some("TX"));

        let forward = valuate_site(&f, &s, &[global.clone(), texas.clone()]);
        let reverse = valuate_site(&f, &s, &[texas, global]);

        // Pre-multiplier value 100,000 -> x1.1 x0.9 = 99,000 either way.
        assert!((forward.total - 99_000.0).abs() < 1e-9);
        assert_eq!(forward.total, reverse.total);
    }

    #[test]
    fn test_non_matching_multiplier_ignored() {
        let georgia = multiplier(1, 0.5, MultiplierScope::State, Some("GA"));
        let v = valuate_site(&facts(50.0, 50.0, 50.0), &settings(), &[georgia]);
        assert_eq!(v.total, 100_000_000.0);
    }

    #[test]
    fn test_idempotent() {
        let f = facts(140.0, 90.0, 60.0);
        let s = settings();
        let ms = vec![multiplier(1, 1.05, MultiplierScope::Global, None)];
        let a = valuate_site(&f, &s, &ms);
        let b = valuate_site(&f, &s, &ms);
        assert_eq!(a.total.to_bits(), b.total.to_bits());
    }
}
