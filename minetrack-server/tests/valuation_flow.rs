//! End-to-end tests for the valuation flow.
//!
//! Seed the store the way data entry would, then run the same snapshot →
//! engine path the HTTP handlers use and check the derived numbers,
//! including the reference scenarios for band pricing, status discounts,
//! power tiers, and multipliers.

use minetrack_server::model::{CompanyInput, MultiplierInput, SiteInput, SubsiteInput};
use minetrack_server::store::TrackerStore;
use minetrack_server::valuation::{
    totals_of, valuate_all, valuate_scenario, MultiplierScope, ValuationSettings,
};

// ============================================================================
// Fixtures
// ============================================================================

/// One company, one site at capacity 100 with 50 MW contracted and
/// energized via a single sub-site phase.
async fn seed_reference_company(store: &TrackerStore) -> (i64, i64) {
    let company = store
        .create_company(&CompanyInput {
            name: Some("Alpha Mining".into()),
            ticker: Some("ALPH".into()),
            btc_holdings: Some(10.0),
            market_cap_usd: Some(0.0),
            ..CompanyInput::default()
        })
        .await
        .unwrap();

    let site = store
        .create_site(&SiteInput {
            company_id: Some(company),
            name: Some("West Plant".into()),
            state: Some("TX".into()),
            status: Some("operational".into()),
            mw_capacity: Some(100.0),
            ..SiteInput::default()
        })
        .await
        .unwrap();

    store
        .create_subsite(&SubsiteInput {
            site_id: Some(site),
            name: Some("Phase 1".into()),
            mw_contracted: Some(50.0),
            mw_energized: Some(50.0),
            ..SubsiteInput::default()
        })
        .await
        .unwrap();

    (company, site)
}

async fn snapshot(
    store: &TrackerStore,
) -> (
    ValuationSettings,
    Vec<minetrack_server::valuation::Multiplier>,
    Vec<minetrack_server::valuation::CompanyWithSites>,
) {
    let settings = store.valuation_settings().await.unwrap();
    let multipliers = store.list_multipliers().await.unwrap();
    let portfolio = store.valuation_portfolio().await.unwrap();
    (settings, multipliers, portfolio)
}

// ============================================================================
// Reference Scenarios
// ============================================================================

#[tokio::test]
async fn test_operational_site_reference_valuation() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let records = valuate_all(&portfolio, &settings, &multipliers);

    // 50 x 2M energized + 0 x 1M contracted-idle + 50 x 0.5M planned.
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].site_value, 125_000_000.0);
    // 10 BTC at the seeded 60,000.
    assert_eq!(records[0].btc_value, 600_000.0);
    assert_eq!(records[0].total, 125_600_000.0);
    // Market cap is zero: incomparable, not zero ratio.
    assert_eq!(records[0].ratio, None);
}

#[tokio::test]
async fn test_closed_site_gets_fallback_discount() {
    let store = TrackerStore::open_in_memory().unwrap();
    let (_, site) = seed_reference_company(&store).await;

    store
        .update_site(
            site,
            &SiteInput {
                status: Some("closed".into()),
                ..SiteInput::default()
            },
        )
        .await
        .unwrap();

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let records = valuate_all(&portfolio, &settings, &multipliers);

    // No discount_closed is seeded, so the 0.1 safety net applies.
    assert_eq!(records[0].site_value, 12_500_000.0);
}

#[tokio::test]
async fn test_cheap_power_site() {
    let store = TrackerStore::open_in_memory().unwrap();
    let (_, site) = seed_reference_company(&store).await;

    store
        .update_site(
            site,
            &SiteInput {
                power_cost_kwh: Some(0.02),
                ..SiteInput::default()
            },
        )
        .await
        .unwrap();

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let records = valuate_all(&portfolio, &settings, &multipliers);

    // 0.02 is strictly below the 0.03 threshold: x1.2.
    assert_eq!(records[0].site_value, 125_000_000.0 * 1.2);
}

#[tokio::test]
async fn test_state_and_global_multipliers_compound() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    store
        .create_multiplier(&MultiplierInput {
            name: Some("bull market".into()),
            factor: Some(1.1),
            scope: Some(MultiplierScope::Global),
            ..MultiplierInput::default()
        })
        .await
        .unwrap();
    store
        .create_multiplier(&MultiplierInput {
            name: Some("ERCOT curtailment risk".into()),
            factor: Some(0.9),
            scope: Some(MultiplierScope::State),
            scope_value: Some("TX".into()),
            ..MultiplierInput::default()
        })
        .await
        .unwrap();

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let records = valuate_all(&portfolio, &settings, &multipliers);

    let expected = 125_000_000.0 * 1.1 * 0.9;
    assert!((records[0].site_value - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_inactive_multiplier_has_no_effect() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    store
        .create_multiplier(&MultiplierInput {
            name: Some("disabled haircut".into()),
            factor: Some(0.5),
            scope: Some(MultiplierScope::Global),
            active: Some(false),
            ..MultiplierInput::default()
        })
        .await
        .unwrap();

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let records = valuate_all(&portfolio, &settings, &multipliers);
    assert_eq!(records[0].site_value, 125_000_000.0);
}

// ============================================================================
// Settings Freshness
// ============================================================================

#[tokio::test]
async fn test_setting_write_visible_to_next_valuation() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let before = valuate_all(&portfolio, &settings, &multipliers);

    store
        .update_setting("mw_value_energized", "3000000")
        .await
        .unwrap();

    // A fresh snapshot sees the write immediately; no stale cache.
    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let after = valuate_all(&portfolio, &settings, &multipliers);

    assert_eq!(before[0].site_value, 125_000_000.0);
    assert_eq!(after[0].site_value, 175_000_000.0);
}

// ============================================================================
// Scenario Evaluation
// ============================================================================

#[tokio::test]
async fn test_scenario_does_not_touch_persisted_settings() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let mut overrides = std::collections::HashMap::new();
    overrides.insert("btc_price".to_string(), 100_000.0);

    let outcome = valuate_scenario(&overrides, &settings, &portfolio, &multipliers);
    assert_eq!(outcome.results[0].btc_value, 1_000_000.0);

    // The store still has the old price.
    let persisted = store.valuation_settings().await.unwrap();
    assert_eq!(persisted.btc_price, 60_000.0);
}

#[tokio::test]
async fn test_scenario_totals_match_dashboard_summation() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    // A second company so the sums cover more than one record.
    store
        .create_company(&CompanyInput {
            name: Some("Beta Digital".into()),
            btc_holdings: Some(2.0),
            market_cap_usd: Some(50_000_000.0),
            ..CompanyInput::default()
        })
        .await
        .unwrap();

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let outcome = valuate_scenario(
        &std::collections::HashMap::new(),
        &settings,
        &portfolio,
        &multipliers,
    );

    // Totals are the same summation a dashboard would run over the records.
    let expected = totals_of(&outcome.results);
    assert_eq!(outcome.totals, expected);
    assert_eq!(
        outcome.totals.valuation,
        outcome.results.iter().map(|r| r.total).sum::<f64>()
    );
}

#[tokio::test]
async fn test_scenario_save_as_default_roundtrip() {
    let store = TrackerStore::open_in_memory().unwrap();
    seed_reference_company(&store).await;

    // Preview a scenario, then persist its keys explicitly (the "save as
    // default" path) and confirm the live valuation now matches it.
    let mut overrides = std::collections::HashMap::new();
    overrides.insert("mw_value_energized".to_string(), 2_500_000.0);
    overrides.insert("discount_operational".to_string(), 0.9);

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let preview = valuate_scenario(&overrides, &settings, &portfolio, &multipliers);

    for (key, value) in &overrides {
        store
            .update_setting(key, &value.to_string())
            .await
            .unwrap();
    }

    let (settings, multipliers, portfolio) = snapshot(&store).await;
    let live = valuate_all(&portfolio, &settings, &multipliers);
    assert_eq!(live[0].total, preview.results[0].total);
}
