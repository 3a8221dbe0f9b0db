//! Site, sub-site, and hardware operations.
//!
//! Contracted/energized MW live on sub-sites; everything that consumes a
//! site's MW picture goes through the summary queries here, which roll the
//! sub-site figures up at read time.

use minetrack_common::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use crate::model::{
    Hardware, HardwareInput, Site, SiteFilter, SiteInput, SiteSummary, Subsite, SubsiteInput,
};

use super::{now_ts, parse_ts, TrackerStore};

const SITE_COLUMNS: &str = "id, company_id, name, address, city, state, country, latitude, \
     longitude, mw_capacity, status, utility_provider, power_cost_kwh, power_source, notes, \
     created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT s.id, s.company_id, c.name, s.name, s.city, s.state, \
            s.country, s.status, s.mw_capacity, \
            COALESCE(SUM(sub.mw_contracted), 0), \
            COALESCE(SUM(sub.mw_energized), 0), \
            s.power_cost_kwh \
     FROM sites s \
     JOIN companies c ON c.id = s.company_id \
     LEFT JOIN subsites sub ON sub.site_id = s.id \
     WHERE 1=1";

impl TrackerStore {
    // ========================================================================
    // Sites
    // ========================================================================

    /// List site summaries matching the filter, ordered by company then site.
    pub async fn list_site_summaries(&self, filter: &SiteFilter) -> Result<Vec<SiteSummary>> {
        let mut sql = String::from(SUMMARY_SELECT);
        let mut args: Vec<Value> = Vec::new();

        if let Some(state) = &filter.state {
            sql.push_str(" AND s.state = ?");
            args.push(state.clone().into());
        }
        if let Some(status) = &filter.status {
            sql.push_str(" AND s.status = ?");
            args.push(status.clone().into());
        }
        if let Some(company_id) = filter.company_id {
            sql.push_str(" AND s.company_id = ?");
            args.push(company_id.into());
        }
        if let Some(min_mw) = filter.min_mw {
            sql.push_str(" AND s.mw_capacity >= ?");
            args.push(min_mw.into());
        }

        sql.push_str(" GROUP BY s.id ORDER BY c.name, s.name");

        let db = self.conn().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Site summaries for one company (the valuation detail path).
    pub async fn site_summaries_for_company(&self, company_id: i64) -> Result<Vec<SiteSummary>> {
        self.list_site_summaries(&SiteFilter {
            company_id: Some(company_id),
            ..SiteFilter::default()
        })
        .await
    }

    /// Fetch one site row (no aggregation).
    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let db = self.conn().await;
        let mut stmt = db.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_site)?;
        Ok(rows.next().transpose()?)
    }

    /// Create a site. `company_id` and `name` are required.
    pub async fn create_site(&self, input: &SiteInput) -> Result<i64> {
        let company_id = input
            .company_id
            .ok_or_else(|| Error::InvalidInput("site company_id is required".into()))?;
        let name = input
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("site name is required".into()))?;

        let db = self.conn().await;
        let now = now_ts();
        db.execute(
            "INSERT INTO sites \
             (company_id, name, address, city, state, country, latitude, longitude, mw_capacity, \
              status, utility_provider, power_cost_kwh, power_source, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            params![
                company_id,
                name,
                input.address,
                input.city,
                input.state,
                input.country.as_deref().unwrap_or("USA"),
                input.latitude,
                input.longitude,
                input.mw_capacity.unwrap_or(0.0),
                input.status.as_deref().unwrap_or("planned"),
                input.utility_provider,
                input.power_cost_kwh,
                input.power_source,
                input.notes,
                now,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Update a site. Absent fields keep their current values.
    pub async fn update_site(&self, id: i64, input: &SiteInput) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute(
            "UPDATE sites SET \
                company_id = COALESCE(?1, company_id), \
                name = COALESCE(?2, name), \
                address = COALESCE(?3, address), \
                city = COALESCE(?4, city), \
                state = COALESCE(?5, state), \
                country = COALESCE(?6, country), \
                latitude = COALESCE(?7, latitude), \
                longitude = COALESCE(?8, longitude), \
                mw_capacity = COALESCE(?9, mw_capacity), \
                status = COALESCE(?10, status), \
                utility_provider = COALESCE(?11, utility_provider), \
                power_cost_kwh = COALESCE(?12, power_cost_kwh), \
                power_source = COALESCE(?13, power_source), \
                notes = COALESCE(?14, notes), \
                updated_at = ?15 \
             WHERE id = ?16",
            params![
                input.company_id,
                input.name,
                input.address,
                input.city,
                input.state,
                input.country,
                input.latitude,
                input.longitude,
                input.mw_capacity,
                input.status,
                input.utility_provider,
                input.power_cost_kwh,
                input.power_source,
                input.notes,
                now_ts(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a site. Cascades to its sub-sites and hardware.
    pub async fn delete_site(&self, id: i64) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // ========================================================================
    // Sub-sites
    // ========================================================================

    /// List sub-sites, optionally restricted to one site.
    pub async fn list_subsites(&self, site_id: Option<i64>) -> Result<Vec<Subsite>> {
        let mut sql = String::from(
            "SELECT id, site_id, name, mw_contracted, mw_energized, hash_rate_eh, status, \
             energization_date, notes, created_at, updated_at FROM subsites WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(site_id) = site_id {
            sql.push_str(" AND site_id = ?");
            args.push(site_id.into());
        }
        sql.push_str(" ORDER BY site_id, name");

        let db = self.conn().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_subsite)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create a sub-site. `site_id` and `name` are required.
    pub async fn create_subsite(&self, input: &SubsiteInput) -> Result<i64> {
        let site_id = input
            .site_id
            .ok_or_else(|| Error::InvalidInput("subsite site_id is required".into()))?;
        let name = input
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("subsite name is required".into()))?;

        let db = self.conn().await;
        let now = now_ts();
        db.execute(
            "INSERT INTO subsites \
             (site_id, name, mw_contracted, mw_energized, hash_rate_eh, status, energization_date, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                site_id,
                name,
                input.mw_contracted.unwrap_or(0.0),
                input.mw_energized.unwrap_or(0.0),
                input.hash_rate_eh.unwrap_or(0.0),
                input.status.as_deref().unwrap_or("planned"),
                input.energization_date,
                input.notes,
                now,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Update a sub-site. Absent fields keep their current values.
    pub async fn update_subsite(&self, id: i64, input: &SubsiteInput) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute(
            "UPDATE subsites SET \
                site_id = COALESCE(?1, site_id), \
                name = COALESCE(?2, name), \
                mw_contracted = COALESCE(?3, mw_contracted), \
                mw_energized = COALESCE(?4, mw_energized), \
                hash_rate_eh = COALESCE(?5, hash_rate_eh), \
                status = COALESCE(?6, status), \
                energization_date = COALESCE(?7, energization_date), \
                notes = COALESCE(?8, notes), \
                updated_at = ?9 \
             WHERE id = ?10",
            params![
                input.site_id,
                input.name,
                input.mw_contracted,
                input.mw_energized,
                input.hash_rate_eh,
                input.status,
                input.energization_date,
                input.notes,
                now_ts(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a sub-site. Cascades to its hardware.
    pub async fn delete_subsite(&self, id: i64) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute("DELETE FROM subsites WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // ========================================================================
    // Hardware
    // ========================================================================

    /// List hardware, optionally restricted to one sub-site.
    pub async fn list_hardware(&self, subsite_id: Option<i64>) -> Result<Vec<Hardware>> {
        let mut sql = String::from(
            "SELECT id, subsite_id, model, manufacturer, quantity, hash_rate_th_each, \
             power_watts_each, status, deployment_date, notes FROM hardware WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(subsite_id) = subsite_id {
            sql.push_str(" AND subsite_id = ?");
            args.push(subsite_id.into());
        }
        sql.push_str(" ORDER BY id");

        let db = self.conn().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_hardware)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create a hardware entry. `subsite_id` and `model` are required.
    pub async fn create_hardware(&self, input: &HardwareInput) -> Result<i64> {
        let subsite_id = input
            .subsite_id
            .ok_or_else(|| Error::InvalidInput("hardware subsite_id is required".into()))?;
        let model = input
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("hardware model is required".into()))?;

        let db = self.conn().await;
        db.execute(
            "INSERT INTO hardware \
             (subsite_id, model, manufacturer, quantity, hash_rate_th_each, power_watts_each, status, deployment_date, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                subsite_id,
                model,
                input.manufacturer,
                input.quantity.unwrap_or(0),
                input.hash_rate_th_each,
                input.power_watts_each,
                input.status.as_deref().unwrap_or("deployed"),
                input.deployment_date,
                input.notes,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Delete a hardware entry.
    pub async fn delete_hardware(&self, id: i64) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute("DELETE FROM hardware WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

fn row_to_summary(row: &Row) -> rusqlite::Result<SiteSummary> {
    Ok(SiteSummary {
        id: row.get(0)?,
        company_id: row.get(1)?,
        company_name: row.get(2)?,
        name: row.get(3)?,
        city: row.get(4)?,
        state: row.get(5)?,
        country: row.get(6)?,
        status: row.get(7)?,
        mw_capacity: row.get(8)?,
        mw_contracted: row.get(9)?,
        mw_energized: row.get(10)?,
        power_cost_kwh: row.get(11)?,
    })
}

fn row_to_site(row: &Row) -> rusqlite::Result<Site> {
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;
    Ok(Site {
        id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        city: row.get(4)?,
        state: row.get(5)?,
        country: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        mw_capacity: row.get(9)?,
        status: row.get(10)?,
        utility_provider: row.get(11)?,
        power_cost_kwh: row.get(12)?,
        power_source: row.get(13)?,
        notes: row.get(14)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_subsite(row: &Row) -> rusqlite::Result<Subsite> {
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Subsite {
        id: row.get(0)?,
        site_id: row.get(1)?,
        name: row.get(2)?,
        mw_contracted: row.get(3)?,
        mw_energized: row.get(4)?,
        hash_rate_eh: row.get(5)?,
        status: row.get(6)?,
        energization_date: row.get(7)?,
        notes: row.get(8)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_hardware(row: &Row) -> rusqlite::Result<Hardware> {
    Ok(Hardware {
        id: row.get(0)?,
        subsite_id: row.get(1)?,
        model: row.get(2)?,
        manufacturer: row.get(3)?,
        quantity: row.get(4)?,
        hash_rate_th_each: row.get(5)?,
        power_watts_each: row.get(6)?,
        status: row.get(7)?,
        deployment_date: row.get(8)?,
        notes: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CompanyInput;

    async fn seed_company(store: &TrackerStore, name: &str) -> i64 {
        store
            .create_company(&CompanyInput {
                name: Some(name.into()),
                ..CompanyInput::default()
            })
            .await
            .unwrap()
    }

    async fn seed_site(store: &TrackerStore, company_id: i64, name: &str, mw: f64) -> i64 {
        store
            .create_site(&SiteInput {
                company_id: Some(company_id),
                name: Some(name.into()),
                state: Some("TX".into()),
                mw_capacity: Some(mw),
                status: Some("operational".into()),
                ..SiteInput::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_summary_rolls_up_subsites() {
        let store = TrackerStore::open_in_memory().unwrap();
        let company = seed_company(&store, "Alpha").await;
        let site = seed_site(&store, company, "West", 100.0).await;

        for (contracted, energized) in [(30.0, 20.0), (25.0, 10.0)] {
            store
                .create_subsite(&SubsiteInput {
                    site_id: Some(site),
                    name: Some(format!("Phase {contracted}")),
                    mw_contracted: Some(contracted),
                    mw_energized: Some(energized),
                    ..SubsiteInput::default()
                })
                .await
                .unwrap();
        }

        let summaries = store.list_site_summaries(&SiteFilter::default()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.company_name, "Alpha");
        assert_eq!(s.mw_capacity, 100.0);
        assert_eq!(s.mw_contracted, 55.0);
        assert_eq!(s.mw_energized, 30.0);
    }

    #[tokio::test]
    async fn test_summary_without_subsites_is_zero() {
        let store = TrackerStore::open_in_memory().unwrap();
        let company = seed_company(&store, "Alpha").await;
        seed_site(&store, company, "Bare", 50.0).await;

        let summaries = store.list_site_summaries(&SiteFilter::default()).await.unwrap();
        assert_eq!(summaries[0].mw_contracted, 0.0);
        assert_eq!(summaries[0].mw_energized, 0.0);
    }

    #[tokio::test]
    async fn test_filters() {
        let store = TrackerStore::open_in_memory().unwrap();
        let alpha = seed_company(&store, "Alpha").await;
        let beta = seed_company(&store, "Beta").await;
        seed_site(&store, alpha, "Big", 200.0).await;
        seed_site(&store, beta, "Small", 20.0).await;

        let by_company = store
            .list_site_summaries(&SiteFilter {
                company_id: Some(alpha),
                ..SiteFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_company.len(), 1);
        assert_eq!(by_company[0].name, "Big");

        let by_min_mw = store
            .list_site_summaries(&SiteFilter {
                min_mw: Some(100.0),
                ..SiteFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_min_mw.len(), 1);

        let by_state = store
            .list_site_summaries(&SiteFilter {
                state: Some("GA".into()),
                ..SiteFilter::default()
            })
            .await
            .unwrap();
        assert!(by_state.is_empty());
    }

    #[tokio::test]
    async fn test_company_delete_cascades() {
        let store = TrackerStore::open_in_memory().unwrap();
        let company = seed_company(&store, "Alpha").await;
        let site = seed_site(&store, company, "West", 100.0).await;
        let subsite = store
            .create_subsite(&SubsiteInput {
                site_id: Some(site),
                name: Some("Phase 1".into()),
                ..SubsiteInput::default()
            })
            .await
            .unwrap();
        store
            .create_hardware(&HardwareInput {
                subsite_id: Some(subsite),
                model: Some("S21 Pro".into()),
                quantity: Some(5000),
                ..HardwareInput::default()
            })
            .await
            .unwrap();

        store.delete_company(company).await.unwrap();

        assert!(store.get_site(site).await.unwrap().is_none());
        assert!(store.list_subsites(Some(site)).await.unwrap().is_empty());
        assert!(store.list_hardware(Some(subsite)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_site_update_partial() {
        let store = TrackerStore::open_in_memory().unwrap();
        let company = seed_company(&store, "Alpha").await;
        let site = seed_site(&store, company, "West", 100.0).await;

        store
            .update_site(
                site,
                &SiteInput {
                    status: Some("curtailed".into()),
                    power_cost_kwh: Some(0.045),
                    ..SiteInput::default()
                },
            )
            .await
            .unwrap();

        let s = store.get_site(site).await.unwrap().unwrap();
        assert_eq!(s.status, "curtailed");
        assert_eq!(s.power_cost_kwh, Some(0.045));
        assert_eq!(s.mw_capacity, 100.0);
        assert_eq!(s.state.as_deref(), Some("TX"));
    }

    #[tokio::test]
    async fn test_create_site_requires_company_and_name() {
        let store = TrackerStore::open_in_memory().unwrap();
        let err = store.create_site(&SiteInput::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
