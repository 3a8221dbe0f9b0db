//! SQLite persistence for the tracker.
//!
//! Provides storage for:
//! - Companies, sites, sub-sites, and hardware
//! - Valuation settings (flat key→value) and multipliers
//! - News items and the review queue
//!
//! One connection behind an async mutex: rusqlite::Connection is Send but
//! not Sync, and Mutex<T> is Sync when T: Send. Every valuation request
//! reads its snapshot through here fresh, so a settings write is visible to
//! the next read immediately.

mod companies;
mod review;
mod settings;
mod sites;
mod stats;

pub use stats::{StateCount, StatsSnapshot, StatusCount};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use minetrack_common::{Error, Result};
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Companies
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    ticker TEXT,
    website TEXT,
    btc_holdings REAL NOT NULL DEFAULT 0,
    hash_rate_eh REAL NOT NULL DEFAULT 0,
    market_cap_usd REAL,
    debt_usd REAL NOT NULL DEFAULT 0,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(name);

-- Sites
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    address TEXT,
    city TEXT,
    state TEXT,
    country TEXT NOT NULL DEFAULT 'USA',
    latitude REAL,
    longitude REAL,
    mw_capacity REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'planned',
    utility_provider TEXT,
    power_cost_kwh REAL,
    power_source TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sites_company ON sites(company_id);
CREATE INDEX IF NOT EXISTS idx_sites_state ON sites(state);
CREATE INDEX IF NOT EXISTS idx_sites_status ON sites(status);

-- Sub-sites (phases within a site; carry contracted/energized MW)
CREATE TABLE IF NOT EXISTS subsites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    mw_contracted REAL NOT NULL DEFAULT 0,
    mw_energized REAL NOT NULL DEFAULT 0,
    hash_rate_eh REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'planned',
    energization_date TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subsites_site ON subsites(site_id);

-- Hardware fleets within a sub-site
CREATE TABLE IF NOT EXISTS hardware (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subsite_id INTEGER NOT NULL REFERENCES subsites(id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    manufacturer TEXT,
    quantity INTEGER NOT NULL DEFAULT 0,
    hash_rate_th_each REAL,
    power_watts_each REAL,
    status TEXT NOT NULL DEFAULT 'deployed',
    deployment_date TEXT,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_hardware_subsite ON hardware(subsite_id);

-- News items
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER REFERENCES companies(id) ON DELETE SET NULL,
    site_id INTEGER REFERENCES sites(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    source TEXT,
    url TEXT,
    publish_date TEXT,
    summary TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    reviewed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_news_status ON news(status);
CREATE INDEX IF NOT EXISTS idx_news_company ON news(company_id);

-- Review queue (pending -> approved|rejected, terminal)
CREATE TABLE IF NOT EXISTS review_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id INTEGER,
    proposed_data TEXT NOT NULL,
    source TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    reviewer_notes TEXT,
    created_at TEXT NOT NULL,
    reviewed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_review_status ON review_queue(status);

-- Valuation settings (flat key -> value, parsed to numbers on read)
CREATE TABLE IF NOT EXISTS valuation_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Custom multipliers
CREATE TABLE IF NOT EXISTS multipliers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    factor REAL NOT NULL DEFAULT 1.0,
    scope TEXT NOT NULL DEFAULT 'global',
    scope_value TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    description TEXT
);
"#;

/// Settings seeded into a fresh store. `discount_closed` is deliberately
/// absent so the engine's closed-site fallback stays reachable until an
/// operator configures one.
const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("mw_value_energized", "2000000"),
    ("mw_value_contracted", "1000000"),
    ("mw_value_planned", "500000"),
    ("btc_price", "60000"),
    ("eh_value", "100000000"),
    ("discount_operational", "1.0"),
    ("discount_under_construction", "0.6"),
    ("discount_planned", "0.3"),
    ("discount_curtailed", "0.5"),
    ("power_tier_cheap_threshold", "0.03"),
    ("power_tier_cheap_multiplier", "1.2"),
    ("power_tier_expensive_threshold", "0.06"),
    ("power_tier_expensive_multiplier", "0.8"),
];

// ============================================================================
// Tracker Store
// ============================================================================

/// SQLite-backed store for every tracker entity.
pub struct TrackerStore {
    db: Arc<Mutex<Connection>>,
}

impl TrackerStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(db_path = %path.display(), "Opened tracker store");
        Ok(store)
    }

    /// Open an in-memory store (tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| Error::Database(e).with_context("setting database pragmas"))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| Error::Database(e).with_context("creating database tables"))?;

        let now = now_ts();
        for (key, value) in DEFAULT_SETTINGS {
            conn.execute(
                "INSERT OR IGNORE INTO valuation_settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now],
            )?;
        }

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the underlying connection (store submodules only).
    pub(crate) async fn conn(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.db.lock().await
    }
}

// ============================================================================
// Row Helpers
// ============================================================================

/// Current timestamp in the stored RFC 3339 form.
pub(crate) fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp, falling back to the epoch on malformed data.
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

/// Parse an optional stored timestamp.
pub(crate) fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_seeds_defaults() {
        let store = TrackerStore::open_in_memory().unwrap();
        let settings = store.settings_map().await.unwrap();
        assert_eq!(settings.get("mw_value_energized").unwrap(), "2000000");
        assert_eq!(settings.get("btc_price").unwrap(), "60000");
        // The closed discount is not seeded; the engine fallback covers it.
        assert!(!settings.contains_key("discount_closed"));
    }

    #[tokio::test]
    async fn test_reopen_preserves_setting_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.db");

        {
            let store = TrackerStore::open(&path).unwrap();
            store.update_setting("btc_price", "95000").await.unwrap();
        }

        // Re-seeding uses INSERT OR IGNORE, so the edit survives a reopen.
        let store = TrackerStore::open(&path).unwrap();
        let settings = store.settings_map().await.unwrap();
        assert_eq!(settings.get("btc_price").unwrap(), "95000");
    }

    #[test]
    fn test_parse_ts_roundtrip() {
        let now = Utc::now();
        let parsed = parse_ts(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_ts_malformed_is_epoch() {
        assert_eq!(parse_ts("not-a-date"), DateTime::<Utc>::MIN_UTC);
    }
}
