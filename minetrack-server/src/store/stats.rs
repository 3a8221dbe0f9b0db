//! Dashboard stats rollups.

use minetrack_common::Result;
use rusqlite::params;
use serde::Serialize;

use super::TrackerStore;

/// Sites grouped by lifecycle status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Sites grouped by state, largest first.
#[derive(Debug, Clone, Serialize)]
pub struct StateCount {
    pub state: String,
    pub count: i64,
}

/// Counts and MW totals for the dashboard header.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub companies: i64,
    pub sites: i64,
    pub subsites: i64,
    pub pending_news: i64,
    pub pending_review: i64,
    pub total_mw_energized: f64,
    pub total_mw_capacity: f64,
    pub sites_by_status: Vec<StatusCount>,
    pub sites_by_state: Vec<StateCount>,
}

impl TrackerStore {
    /// Compute the dashboard stats snapshot.
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let db = self.conn().await;

        let count = |sql: &str| -> rusqlite::Result<i64> { db.query_row(sql, [], |r| r.get(0)) };

        let companies = count("SELECT COUNT(*) FROM companies")?;
        let sites = count("SELECT COUNT(*) FROM sites")?;
        let subsites = count("SELECT COUNT(*) FROM subsites")?;
        let pending_news = db.query_row(
            "SELECT COUNT(*) FROM news WHERE status = ?1",
            params!["pending"],
            |r| r.get(0),
        )?;
        let pending_review = db.query_row(
            "SELECT COUNT(*) FROM review_queue WHERE status = ?1",
            params!["pending"],
            |r| r.get(0),
        )?;

        let total_mw_energized: f64 = db.query_row(
            "SELECT COALESCE(SUM(mw_energized), 0) FROM subsites",
            [],
            |r| r.get(0),
        )?;
        let total_mw_capacity: f64 = db.query_row(
            "SELECT COALESCE(SUM(mw_capacity), 0) FROM sites",
            [],
            |r| r.get(0),
        )?;

        let mut stmt =
            db.prepare("SELECT status, COUNT(*) FROM sites GROUP BY status ORDER BY status")?;
        let sites_by_status = stmt
            .query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT state, COUNT(*) FROM sites WHERE state IS NOT NULL \
             GROUP BY state ORDER BY COUNT(*) DESC LIMIT 10",
        )?;
        let sites_by_state = stmt
            .query_map([], |row| {
                Ok(StateCount {
                    state: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StatsSnapshot {
            companies,
            sites,
            subsites,
            pending_news,
            pending_review,
            total_mw_energized,
            total_mw_capacity,
            sites_by_status,
            sites_by_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompanyInput, SiteInput, SubsiteInput};

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let store = TrackerStore::open_in_memory().unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.companies, 0);
        assert_eq!(stats.total_mw_capacity, 0.0);
        assert!(stats.sites_by_status.is_empty());
    }

    #[tokio::test]
    async fn test_stats_rollups() {
        let store = TrackerStore::open_in_memory().unwrap();
        let company = store
            .create_company(&CompanyInput {
                name: Some("Alpha".into()),
                ..CompanyInput::default()
            })
            .await
            .unwrap();

        for (name, state, status, mw) in [
            ("West", "TX", "operational", 100.0),
            ("East", "TX", "planned", 60.0),
            ("North", "GA", "operational", 40.0),
        ] {
            let site = store
                .create_site(&SiteInput {
                    company_id: Some(company),
                    name: Some(name.into()),
                    state: Some(state.into()),
                    status: Some(status.into()),
                    mw_capacity: Some(mw),
                    ..SiteInput::default()
                })
                .await
                .unwrap();
            store
                .create_subsite(&SubsiteInput {
                    site_id: Some(site),
                    name: Some("Phase 1".into()),
                    mw_energized: Some(mw / 2.0),
                    ..SubsiteInput::default()
                })
                .await
                .unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.companies, 1);
        assert_eq!(stats.sites, 3);
        assert_eq!(stats.subsites, 3);
        assert_eq!(stats.total_mw_capacity, 200.0);
        assert_eq!(stats.total_mw_energized, 100.0);

        let operational = stats
            .sites_by_status
            .iter()
            .find(|s| s.status == "operational")
            .unwrap();
        assert_eq!(operational.count, 2);

        assert_eq!(stats.sites_by_state[0].state, "TX");
        assert_eq!(stats.sites_by_state[0].count, 2);
    }
}
