//! Company operations.

use minetrack_common::{Error, Result};
use rusqlite::{params, Row};

use crate::model::{Company, CompanyInput};
use crate::valuation::{CompanyFacts, CompanyWithSites};

use super::{now_ts, parse_ts, TrackerStore};

const COMPANY_COLUMNS: &str = "id, name, ticker, website, btc_holdings, hash_rate_eh, \
     market_cap_usd, debt_usd, notes, created_at, updated_at";

impl TrackerStore {
    /// List all companies, alphabetically by name.
    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        let db = self.conn().await;
        let mut stmt =
            db.prepare(&format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name"))?;
        let rows = stmt.query_map([], row_to_company)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Fetch one company.
    pub async fn get_company(&self, id: i64) -> Result<Option<Company>> {
        let db = self.conn().await;
        let mut stmt =
            db.prepare(&format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_company)?;
        Ok(rows.next().transpose()?)
    }

    /// Create a company. `name` is required; other fields take defaults.
    pub async fn create_company(&self, input: &CompanyInput) -> Result<i64> {
        let name = input
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("company name is required".into()))?;

        let db = self.conn().await;
        let now = now_ts();
        db.execute(
            "INSERT INTO companies \
             (name, ticker, website, btc_holdings, hash_rate_eh, market_cap_usd, debt_usd, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                name,
                input.ticker,
                input.website,
                input.btc_holdings.unwrap_or(0.0),
                input.hash_rate_eh.unwrap_or(0.0),
                input.market_cap_usd,
                input.debt_usd.unwrap_or(0.0),
                input.notes,
                now,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Update a company. Absent fields keep their current values.
    pub async fn update_company(&self, id: i64, input: &CompanyInput) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute(
            "UPDATE companies SET \
                name = COALESCE(?1, name), \
                ticker = COALESCE(?2, ticker), \
                website = COALESCE(?3, website), \
                btc_holdings = COALESCE(?4, btc_holdings), \
                hash_rate_eh = COALESCE(?5, hash_rate_eh), \
                market_cap_usd = COALESCE(?6, market_cap_usd), \
                debt_usd = COALESCE(?7, debt_usd), \
                notes = COALESCE(?8, notes), \
                updated_at = ?9 \
             WHERE id = ?10",
            params![
                input.name,
                input.ticker,
                input.website,
                input.btc_holdings,
                input.hash_rate_eh,
                input.market_cap_usd,
                input.debt_usd,
                input.notes,
                now_ts(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a company. Cascades to its sites, sub-sites, and hardware.
    pub async fn delete_company(&self, id: i64) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute("DELETE FROM companies WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Load every company with its site facts, ready for the portfolio
    /// aggregator. Companies come back alphabetically; sites are grouped in
    /// memory from a single summary query rather than per-company queries.
    pub async fn valuation_portfolio(&self) -> Result<Vec<CompanyWithSites>> {
        let companies = self.list_companies().await?;
        let summaries = self.list_site_summaries(&Default::default()).await?;

        Ok(companies
            .into_iter()
            .map(|c| {
                let sites = summaries
                    .iter()
                    .filter(|s| s.company_id == c.id)
                    .map(Into::into)
                    .collect();
                CompanyWithSites {
                    id: c.id,
                    name: c.name,
                    ticker: c.ticker,
                    facts: CompanyFacts {
                        btc_holdings: c.btc_holdings,
                        hash_rate_eh: c.hash_rate_eh,
                        market_cap_usd: c.market_cap_usd,
                    },
                    sites,
                }
            })
            .collect())
    }
}

fn row_to_company(row: &Row) -> rusqlite::Result<Company> {
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        ticker: row.get(2)?,
        website: row.get(3)?,
        btc_holdings: row.get(4)?,
        hash_rate_eh: row.get(5)?,
        market_cap_usd: row.get(6)?,
        debt_usd: row.get(7)?,
        notes: row.get(8)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}
