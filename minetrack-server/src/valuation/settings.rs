//! Settings snapshot for valuation runs.
//!
//! The store keeps tunables as a flat key→string map; a [`ValuationSettings`]
//! is the parsed-by-value snapshot every engine function takes as an explicit
//! argument. Nothing in the engine reaches back into the store, so a snapshot
//! taken at the start of a request stays consistent for its whole run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::SiteStatus;

/// Fixed fallback used when no `btc_price` setting exists and when the live
/// spot-price lookup fails.
pub const DEFAULT_BTC_PRICE: f64 = 60_000.0;

/// Discount applied to closed sites when no `discount_closed` key is
/// configured. A fully shut-down site must never value near its
/// pre-shutdown rate.
pub const CLOSED_DISCOUNT_FALLBACK: f64 = 0.1;

/// Parsed snapshot of every tunable the valuation engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSettings {
    /// $ per energized MW.
    pub mw_value_energized: f64,
    /// $ per contracted-but-not-energized MW.
    pub mw_value_contracted: f64,
    /// $ per planned (capacity beyond contracted) MW.
    pub mw_value_planned: f64,
    /// $ per BTC held.
    pub btc_price: f64,
    /// $ per EH/s of hash rate (display-only valuation).
    pub eh_value: f64,
    /// Status discounts. `None` means the key is unconfigured; resolution
    /// happens in [`ValuationSettings::discount_for`].
    pub discount_operational: Option<f64>,
    pub discount_under_construction: Option<f64>,
    pub discount_planned: Option<f64>,
    pub discount_curtailed: Option<f64>,
    pub discount_closed: Option<f64>,
    /// Power cost strictly below this gets the cheap multiplier.
    pub power_tier_cheap_threshold: f64,
    pub power_tier_cheap_multiplier: f64,
    /// Power cost strictly above this gets the expensive multiplier.
    pub power_tier_expensive_threshold: f64,
    pub power_tier_expensive_multiplier: f64,
}

impl Default for ValuationSettings {
    fn default() -> Self {
        Self {
            mw_value_energized: 2_000_000.0,
            mw_value_contracted: 1_000_000.0,
            mw_value_planned: 500_000.0,
            btc_price: DEFAULT_BTC_PRICE,
            eh_value: 100_000_000.0,
            discount_operational: Some(1.0),
            discount_under_construction: Some(0.6),
            discount_planned: Some(0.3),
            discount_curtailed: Some(0.5),
            // Deliberately unconfigured: the 0.1 closed fallback applies.
            discount_closed: None,
            power_tier_cheap_threshold: 0.03,
            power_tier_cheap_multiplier: 1.2,
            power_tier_expensive_threshold: 0.06,
            power_tier_expensive_multiplier: 0.8,
        }
    }
}

impl ValuationSettings {
    /// Build a snapshot from the stored key→string map.
    ///
    /// Missing or unparseable values fall back to the documented defaults;
    /// discount keys stay unconfigured (`None`) when absent so the status
    /// fallback rules apply.
    pub fn from_kv(kv: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            mw_value_energized: num(kv, "mw_value_energized", defaults.mw_value_energized),
            mw_value_contracted: num(kv, "mw_value_contracted", defaults.mw_value_contracted),
            mw_value_planned: num(kv, "mw_value_planned", defaults.mw_value_planned),
            btc_price: num(kv, "btc_price", defaults.btc_price),
            eh_value: num(kv, "eh_value", defaults.eh_value),
            discount_operational: opt(kv, "discount_operational"),
            discount_under_construction: opt(kv, "discount_under_construction"),
            discount_planned: opt(kv, "discount_planned"),
            discount_curtailed: opt(kv, "discount_curtailed"),
            discount_closed: opt(kv, "discount_closed"),
            power_tier_cheap_threshold: num(
                kv,
                "power_tier_cheap_threshold",
                defaults.power_tier_cheap_threshold,
            ),
            power_tier_cheap_multiplier: num(
                kv,
                "power_tier_cheap_multiplier",
                defaults.power_tier_cheap_multiplier,
            ),
            power_tier_expensive_threshold: num(
                kv,
                "power_tier_expensive_threshold",
                defaults.power_tier_expensive_threshold,
            ),
            power_tier_expensive_multiplier: num(
                kv,
                "power_tier_expensive_multiplier",
                defaults.power_tier_expensive_multiplier,
            ),
        }
    }

    /// Overlay scenario overrides onto this snapshot, returning a new
    /// snapshot. Unknown keys are ignored; nothing is written back.
    pub fn overlay(&self, overrides: &HashMap<String, f64>) -> Self {
        let mut s = self.clone();
        for (key, &value) in overrides {
            match key.as_str() {
                "mw_value_energized" => s.mw_value_energized = value,
                "mw_value_contracted" => s.mw_value_contracted = value,
                "mw_value_planned" => s.mw_value_planned = value,
                "btc_price" => s.btc_price = value,
                "eh_value" => s.eh_value = value,
                "discount_operational" => s.discount_operational = Some(value),
                "discount_under_construction" => s.discount_under_construction = Some(value),
                "discount_planned" => s.discount_planned = Some(value),
                "discount_curtailed" => s.discount_curtailed = Some(value),
                "discount_closed" => s.discount_closed = Some(value),
                "power_tier_cheap_threshold" => s.power_tier_cheap_threshold = value,
                "power_tier_cheap_multiplier" => s.power_tier_cheap_multiplier = value,
                "power_tier_expensive_threshold" => s.power_tier_expensive_threshold = value,
                "power_tier_expensive_multiplier" => s.power_tier_expensive_multiplier = value,
                other => {
                    tracing::debug!(key = other, "Ignoring unknown scenario override key");
                }
            }
        }
        s
    }

    /// Resolve the status discount.
    ///
    /// Unconfigured statuses are neutral (1.0), except `Closed` which falls
    /// back to [`CLOSED_DISCOUNT_FALLBACK`]. A missing/unrecognized status
    /// is neutral.
    pub fn discount_for(&self, status: Option<SiteStatus>) -> f64 {
        match status {
            Some(SiteStatus::Operational) => self.discount_operational.unwrap_or(1.0),
            Some(SiteStatus::UnderConstruction) => {
                self.discount_under_construction.unwrap_or(1.0)
            }
            Some(SiteStatus::Planned) => self.discount_planned.unwrap_or(1.0),
            Some(SiteStatus::Curtailed) => self.discount_curtailed.unwrap_or(1.0),
            Some(SiteStatus::Closed) => {
                self.discount_closed.unwrap_or(CLOSED_DISCOUNT_FALLBACK)
            }
            None => 1.0,
        }
    }
}

fn num(kv: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    kv.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn opt(kv: &HashMap<String, String>, key: &str) -> Option<f64> {
    kv.get(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_kv_empty_uses_defaults() {
        let s = ValuationSettings::from_kv(&HashMap::new());
        assert_eq!(s.mw_value_energized, 2_000_000.0);
        assert_eq!(s.btc_price, 60_000.0);
        assert_eq!(s.discount_operational, None);
        assert_eq!(s.power_tier_cheap_threshold, 0.03);
    }

    #[test]
    fn test_from_kv_parses_values() {
        let s = ValuationSettings::from_kv(&kv(&[
            ("mw_value_energized", "2500000"),
            ("discount_curtailed", "0.45"),
            ("btc_price", "97000.5"),
        ]));
        assert_eq!(s.mw_value_energized, 2_500_000.0);
        assert_eq!(s.discount_curtailed, Some(0.45));
        assert_eq!(s.btc_price, 97_000.5);
    }

    #[test]
    fn test_from_kv_garbage_falls_back() {
        let s = ValuationSettings::from_kv(&kv(&[
            ("mw_value_planned", "not-a-number"),
            ("discount_operational", ""),
        ]));
        assert_eq!(s.mw_value_planned, 500_000.0);
        assert_eq!(s.discount_operational, None);
    }

    #[test]
    fn test_discount_fallbacks() {
        let s = ValuationSettings::from_kv(&HashMap::new());
        // Unconfigured statuses are neutral.
        assert_eq!(s.discount_for(Some(SiteStatus::Operational)), 1.0);
        assert_eq!(s.discount_for(Some(SiteStatus::Planned)), 1.0);
        // Closed gets the safety-net fallback.
        assert_eq!(s.discount_for(Some(SiteStatus::Closed)), 0.1);
        // Missing/unknown status is neutral.
        assert_eq!(s.discount_for(None), 1.0);
    }

    #[test]
    fn test_explicit_closed_discount_wins() {
        let s = ValuationSettings::from_kv(&kv(&[("discount_closed", "0.25")]));
        assert_eq!(s.discount_for(Some(SiteStatus::Closed)), 0.25);
    }

    #[test]
    fn test_overlay_does_not_mutate_base() {
        let base = ValuationSettings::default();
        let mut overrides = HashMap::new();
        overrides.insert("btc_price".to_string(), 100_000.0);
        overrides.insert("discount_planned".to_string(), 0.5);
        overrides.insert("bogus_key".to_string(), 42.0);

        let overlaid = base.overlay(&overrides);
        assert_eq!(overlaid.btc_price, 100_000.0);
        assert_eq!(overlaid.discount_planned, Some(0.5));
        // Untouched fields carry over; the base is unchanged.
        assert_eq!(overlaid.mw_value_energized, base.mw_value_energized);
        assert_eq!(base.btc_price, 60_000.0);
    }
}
