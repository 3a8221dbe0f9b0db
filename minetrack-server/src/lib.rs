//! Minetrack Server Library
//!
//! Tracks Bitcoin mining companies, their sites, sub-site phases, and
//! deployed hardware, and derives a fair-value estimate per company from
//! infrastructure and BTC holdings.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  minetrack-server (Rust Service)                 │
//! │                            :4450                                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐  ┌────────────────┐  ┌────────────────────┐  │
//! │  │  SQLite Store │  │   Valuation    │  │  Scenario / Price  │  │
//! │  │  (entities,   │→ │    Engine      │← │  (overrides, live  │  │
//! │  │   settings)   │  │  (pure, f64)   │  │   BTC lookup)      │  │
//! │  └───────────────┘  └────────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## MW bands
//! A site's capacity is partitioned into three non-overlapping bands —
//! energized, contracted-but-idle, and planned — each priced at its own
//! $/MW rate, then discounted by lifecycle status and adjusted by
//! power-cost tier and scoped multipliers.
//!
//! ## Snapshots
//! Every valuation request reads settings and multipliers fresh from the
//! store and passes them by value. The engine itself is pure: no globals,
//! no I/O, bit-identical outputs for identical inputs.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod btc_price;
pub mod model;
pub mod routes;
pub mod store;
pub mod valuation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use minetrack_common::config::Config;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::btc_price::BtcPriceClient;
use crate::store::TrackerStore;

/// Tracker service state
pub struct TrackerState {
    /// Configuration
    pub config: Config,
    /// Entity and settings store
    pub store: TrackerStore,
    /// Live BTC spot-price client
    pub btc_price: BtcPriceClient,
}

impl TrackerState {
    /// Create the service state: open the store and build the price client.
    pub fn new(config: Config) -> Result<Self> {
        let tracker = config.tracker();
        let store = TrackerStore::open(&tracker.database_path())?;
        let btc_price =
            BtcPriceClient::new(tracker.btc_price_url.clone(), tracker.price_timeout_secs);

        Ok(Self {
            config,
            store,
            btc_price,
        })
    }
}

/// Build the HTTP router over the given state.
pub fn router(state: Arc<TrackerState>) -> Router {
    let request_timeout = state.config.tracker().request_timeout_secs;

    Router::new()
        .route("/health", get(routes::health))
        // Companies
        .route(
            "/api/v1/companies",
            get(routes::list_companies).post(routes::create_company),
        )
        .route(
            "/api/v1/companies/:id",
            get(routes::get_company)
                .put(routes::update_company)
                .delete(routes::delete_company),
        )
        // Sites
        .route(
            "/api/v1/sites",
            get(routes::list_sites).post(routes::create_site),
        )
        .route(
            "/api/v1/sites/:id",
            get(routes::get_site)
                .put(routes::update_site)
                .delete(routes::delete_site),
        )
        // Sub-sites
        .route(
            "/api/v1/subsites",
            get(routes::list_subsites).post(routes::create_subsite),
        )
        .route(
            "/api/v1/subsites/:id",
            put(routes::update_subsite).delete(routes::delete_subsite),
        )
        // Hardware
        .route(
            "/api/v1/hardware",
            get(routes::list_hardware).post(routes::create_hardware),
        )
        .route("/api/v1/hardware/:id", axum::routing::delete(routes::delete_hardware))
        // News
        .route(
            "/api/v1/news",
            get(routes::list_news).post(routes::create_news),
        )
        .route(
            "/api/v1/news/:id",
            put(routes::update_news).delete(routes::delete_news),
        )
        // Review queue
        .route(
            "/api/v1/review",
            get(routes::list_review).post(routes::create_review),
        )
        .route("/api/v1/review/:id/decide", post(routes::decide_review))
        // Settings & multipliers
        .route("/api/v1/settings", get(routes::get_settings))
        .route("/api/v1/settings/:key", put(routes::update_setting))
        .route("/api/v1/multipliers", post(routes::create_multiplier))
        .route(
            "/api/v1/multipliers/:id",
            put(routes::update_multiplier).delete(routes::delete_multiplier),
        )
        // Valuation
        .route("/api/v1/valuation/company/:id", get(routes::valuation_company))
        .route("/api/v1/valuation/all", get(routes::valuation_all))
        // Scenario & price
        .route("/api/v1/scenario", post(routes::run_scenario))
        .route("/api/v1/btc-price", get(routes::get_btc_price))
        // Stats
        .route("/api/v1/stats", get(routes::get_stats))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Main tracker service
pub struct TrackerService {
    state: Arc<TrackerState>,
}

impl TrackerService {
    /// Create a new tracker service
    pub fn new(config: Config) -> Result<Self> {
        let state = Arc::new(TrackerState::new(config)?);
        Ok(Self { state })
    }

    /// Start the tracker service
    pub async fn start(self) -> Result<()> {
        let tracker = self.state.config.tracker();
        let app = router(self.state.clone());

        let addr: SocketAddr = format!("{}:{}", tracker.host, tracker.port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
