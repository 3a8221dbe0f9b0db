//! News items and the review queue.
//!
//! Both share the one-way lifecycle `pending → approved|rejected`: a
//! decision stamps `reviewed_at` and is terminal.

use minetrack_common::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use crate::model::{NewsInput, NewsItem, ReviewInput, ReviewItem, ReviewStatus};

use super::{now_ts, parse_opt_ts, parse_ts, TrackerStore};

const NEWS_COLUMNS: &str = "id, company_id, site_id, title, source, url, publish_date, summary, \
     status, created_at, reviewed_at";

const REVIEW_COLUMNS: &str = "id, entity_type, entity_id, proposed_data, source, status, \
     reviewer_notes, created_at, reviewed_at";

impl TrackerStore {
    // ========================================================================
    // News
    // ========================================================================

    /// List news, newest first, optionally filtered by status and company.
    pub async fn list_news(
        &self,
        status: Option<ReviewStatus>,
        company_id: Option<i64>,
    ) -> Result<Vec<NewsItem>> {
        let mut sql = format!("SELECT {NEWS_COLUMNS} FROM news WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(status.as_str().to_string().into());
        }
        if let Some(company_id) = company_id {
            sql.push_str(" AND company_id = ?");
            args.push(company_id.into());
        }
        sql.push_str(" ORDER BY created_at DESC");

        let db = self.conn().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_news)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create a news item. `title` is required; status defaults to pending.
    pub async fn create_news(&self, input: &NewsInput) -> Result<i64> {
        let title = input
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("news title is required".into()))?;

        let db = self.conn().await;
        db.execute(
            "INSERT INTO news \
             (company_id, site_id, title, source, url, publish_date, summary, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                input.company_id,
                input.site_id,
                title,
                input.source,
                input.url,
                input.publish_date,
                input.summary,
                input.status.unwrap_or(ReviewStatus::Pending).as_str(),
                now_ts(),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Update a news item. A status change to approved/rejected stamps
    /// `reviewed_at`.
    pub async fn update_news(&self, id: i64, input: &NewsInput) -> Result<bool> {
        let reviewed_at = match input.status {
            Some(ReviewStatus::Approved) | Some(ReviewStatus::Rejected) => Some(now_ts()),
            _ => None,
        };

        let db = self.conn().await;
        let changed = db.execute(
            "UPDATE news SET \
                company_id = COALESCE(?1, company_id), \
                site_id = COALESCE(?2, site_id), \
                title = COALESCE(?3, title), \
                source = COALESCE(?4, source), \
                url = COALESCE(?5, url), \
                publish_date = COALESCE(?6, publish_date), \
                summary = COALESCE(?7, summary), \
                status = COALESCE(?8, status), \
                reviewed_at = COALESCE(?9, reviewed_at) \
             WHERE id = ?10",
            params![
                input.company_id,
                input.site_id,
                input.title,
                input.source,
                input.url,
                input.publish_date,
                input.summary,
                input.status.map(|s| s.as_str()),
                reviewed_at,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a news item.
    pub async fn delete_news(&self, id: i64) -> Result<bool> {
        let db = self.conn().await;
        let changed = db.execute("DELETE FROM news WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // ========================================================================
    // Review Queue
    // ========================================================================

    /// List review items, newest first, optionally filtered by status.
    pub async fn list_review(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewItem>> {
        let mut sql = format!("SELECT {REVIEW_COLUMNS} FROM review_queue WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(status.as_str().to_string().into());
        }
        sql.push_str(" ORDER BY created_at DESC");

        let db = self.conn().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_review)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Fetch one review item.
    pub async fn get_review(&self, id: i64) -> Result<Option<ReviewItem>> {
        let db = self.conn().await;
        let mut stmt =
            db.prepare(&format!("SELECT {REVIEW_COLUMNS} FROM review_queue WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_review)?;
        Ok(rows.next().transpose()?)
    }

    /// Enqueue a proposed change for review.
    pub async fn create_review(&self, input: &ReviewInput) -> Result<i64> {
        if input.entity_type.trim().is_empty() {
            return Err(Error::InvalidInput("review entity_type is required".into()));
        }

        let db = self.conn().await;
        db.execute(
            "INSERT INTO review_queue \
             (entity_type, entity_id, proposed_data, source, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![
                input.entity_type,
                input.entity_id,
                serde_json::to_string(&input.proposed_data)
                    .map_err(minetrack_common::Error::Json)?,
                input.source,
                now_ts(),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Decide a pending review item. The transition is one-way: deciding a
    /// non-pending item is a conflict, and the decision timestamp plus the
    /// optional reviewer note are recorded with it.
    pub async fn decide_review(
        &self,
        id: i64,
        approve: bool,
        reviewer_notes: Option<&str>,
    ) -> Result<ReviewItem> {
        let item = self
            .get_review(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("review item {id}")))?;

        if !item.status.is_decidable() {
            return Err(Error::Conflict(format!(
                "review item {id} already {}",
                item.status
            )));
        }

        let status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };

        {
            let db = self.conn().await;
            db.execute(
                "UPDATE review_queue SET status = ?1, reviewer_notes = ?2, reviewed_at = ?3 \
                 WHERE id = ?4",
                params![status.as_str(), reviewer_notes, now_ts(), id],
            )?;
        }

        self.get_review(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("review item {id}")))
    }
}

fn row_to_news(row: &Row) -> rusqlite::Result<NewsItem> {
    let status: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let reviewed_at: Option<String> = row.get(10)?;
    Ok(NewsItem {
        id: row.get(0)?,
        company_id: row.get(1)?,
        site_id: row.get(2)?,
        title: row.get(3)?,
        source: row.get(4)?,
        url: row.get(5)?,
        publish_date: row.get(6)?,
        summary: row.get(7)?,
        status: ReviewStatus::parse(&status).unwrap_or(ReviewStatus::Pending),
        created_at: parse_ts(&created_at),
        reviewed_at: parse_opt_ts(reviewed_at),
    })
}

fn row_to_review(row: &Row) -> rusqlite::Result<ReviewItem> {
    let proposed: String = row.get(3)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let reviewed_at: Option<String> = row.get(8)?;
    Ok(ReviewItem {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        proposed_data: serde_json::from_str(&proposed).unwrap_or(serde_json::Value::Null),
        source: row.get(4)?,
        status: ReviewStatus::parse(&status).unwrap_or(ReviewStatus::Pending),
        reviewer_notes: row.get(6)?,
        created_at: parse_ts(&created_at),
        reviewed_at: parse_opt_ts(reviewed_at),
    })
}
