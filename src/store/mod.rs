pub mod migrations;

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::compare::effective_rate;
use crate::store::migrations::BASE_MIGRATION;
use crate::types::{Offer, ResultEnvelope};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("code value is required")]
    EmptyCode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRecord {
    pub id: i64,
    pub location: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: u32,
    pub codes_used: Vec<String>,
    pub total_results: usize,
    pub best_rate: Option<f64>,
    pub total_savings: f64,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedCode {
    pub id: i64,
    pub corporate_name: String,
    pub code_value: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct RateStore {
    conn: Connection,
}

impl RateStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    /// Persists the envelope header and every offer in one transaction.
    pub fn save_search(&self, envelope: &ResultEnvelope) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let best_rate = envelope
            .best_offer
            .as_ref()
            .map(effective_rate)
            .filter(|r| r.is_finite());
        tx.execute(
            r#"
INSERT INTO searches(
    location, check_in, check_out, guests, codes_json,
    total_results, best_rate, total_savings, searched_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#,
            params![
                envelope.query.location,
                envelope.query.check_in.map(|d| d.to_string()),
                envelope.query.check_out.map(|d| d.to_string()),
                envelope.query.guests,
                serde_json::to_string(&envelope.codes_tried)?,
                envelope.total_results() as i64,
                best_rate,
                envelope.total_savings,
                envelope.searched_at.to_rfc3339(),
            ],
        )?;
        let search_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
INSERT INTO offers(
    search_id, owner, hotel_name, brand, discount_code,
    effective_rate, savings_amount, offer_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#,
            )?;
            for offer in &envelope.offers {
                let rate = effective_rate(offer);
                stmt.execute(params![
                    search_id,
                    offer.owner_slug(),
                    offer.hotel_name,
                    offer.brand,
                    offer.variant.discount_code,
                    rate.is_finite().then_some(rate),
                    offer.variant.savings_amount,
                    serde_json::to_string(offer)?,
                ])?;
            }
        }
        tx.commit()?;
        debug!(search_id, offers = envelope.offers.len(), "saved search");
        Ok(search_id)
    }

    pub fn load_history(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, location, check_in, check_out, guests, codes_json,
       total_results, best_rate, total_savings, searched_at
FROM searches
ORDER BY searched_at DESC, id DESC
LIMIT ?1
"#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_search_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_search(&self, search_id: i64) -> Result<Option<SearchRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
SELECT id, location, check_in, check_out, guests, codes_json,
       total_results, best_rate, total_savings, searched_at
FROM searches
WHERE id = ?1
"#,
                params![search_id],
                row_to_search_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Cheapest first; rows without a usable rate sink to the bottom.
    pub fn load_offers(&self, search_id: i64) -> Result<Vec<Offer>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT offer_json
FROM offers
WHERE search_id = ?1
ORDER BY effective_rate IS NULL, effective_rate ASC, id ASC
"#,
        )?;
        let raw = stmt
            .query_map(params![search_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut offers = Vec::with_capacity(raw.len());
        for json in raw {
            offers.push(serde_json::from_str(&json)?);
        }
        Ok(offers)
    }

    pub fn add_code(
        &self,
        corporate_name: &str,
        code_value: &str,
        notes: Option<&str>,
    ) -> Result<SavedCode> {
        if code_value.is_empty() {
            return Err(WalletError::EmptyCode.into());
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
INSERT INTO discount_codes(corporate_name, code_value, notes, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?4)
"#,
            params![corporate_name, code_value, notes, now],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, corporate_name, "saved discount code");
        self.code_by_id(id)?
            .ok_or_else(|| anyhow::anyhow!("saved code {id} vanished"))
    }

    pub fn code_by_id(&self, id: i64) -> Result<Option<SavedCode>> {
        let code = self
            .conn
            .query_row(
                r#"
SELECT id, corporate_name, code_value, notes, created_at, updated_at
FROM discount_codes
WHERE id = ?1
"#,
                params![id],
                row_to_saved_code,
            )
            .optional()?;
        Ok(code)
    }

    pub fn list_codes(&self) -> Result<Vec<SavedCode>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, corporate_name, code_value, notes, created_at, updated_at
FROM discount_codes
ORDER BY created_at DESC, id DESC
"#,
        )?;
        let rows = stmt
            .query_map([], row_to_saved_code)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Saved code values, newest first, for feeding into a search.
    pub fn code_values(&self) -> Result<Vec<String>> {
        Ok(self
            .list_codes()?
            .into_iter()
            .map(|c| c.code_value)
            .collect())
    }

    pub fn codes_by_corporate(&self, corporate_name: &str) -> Result<Vec<SavedCode>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, corporate_name, code_value, notes, created_at, updated_at
FROM discount_codes
WHERE LOWER(corporate_name) = LOWER(?1)
ORDER BY created_at DESC, id DESC
"#,
        )?;
        let rows = stmt
            .query_map(params![corporate_name], row_to_saved_code)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_code_notes(&self, id: i64, notes: Option<&str>) -> Result<Option<SavedCode>> {
        let changed = self.conn.execute(
            "UPDATE discount_codes SET notes = ?1, updated_at = ?2 WHERE id = ?3",
            params![notes, Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.code_by_id(id)
    }

    pub fn delete_code(&self, id: i64) -> Result<Option<SavedCode>> {
        let Some(existing) = self.code_by_id(id)? else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM discount_codes WHERE id = ?1", params![id])?;
        Ok(Some(existing))
    }
}

/// Saves a finished search, logging instead of failing: a search result
/// stays valid when it cannot be stored.
pub fn record_search(path: &Path, envelope: &ResultEnvelope) -> Option<i64> {
    let saved = RateStore::open(path).and_then(|store| store.save_search(envelope));
    match saved {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(path = %path.display(), "failed to save search: {err:#}");
            None
        }
    }
}

/// Wallet codes to feed into a search; empty when the store is unreadable.
pub fn saved_code_values(path: &Path) -> Vec<String> {
    match RateStore::open(path).and_then(|store| store.code_values()) {
        Ok(codes) => codes,
        Err(err) => {
            warn!(path = %path.display(), "failed to load saved codes: {err:#}");
            Vec::new()
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| s.parse().ok())
}

fn row_to_search_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchRecord> {
    let codes_raw: String = row.get(5)?;
    let searched_at_raw: String = row.get(9)?;
    Ok(SearchRecord {
        id: row.get(0)?,
        location: row.get(1)?,
        check_in: parse_date(row.get(2)?),
        check_out: parse_date(row.get(3)?),
        guests: row.get(4)?,
        codes_used: serde_json::from_str(&codes_raw).unwrap_or_default(),
        total_results: row.get::<_, i64>(6)? as usize,
        best_rate: row.get(7)?,
        total_savings: row.get(8)?,
        searched_at: parse_timestamp(&searched_at_raw),
    })
}

fn row_to_saved_code(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedCode> {
    let created_raw: String = row.get(4)?;
    let updated_raw: String = row.get(5)?;
    Ok(SavedCode {
        id: row.get(0)?,
        corporate_name: row.get(1)?,
        code_value: row.get(2)?,
        notes: row.get(3)?,
        created_at: parse_timestamp(&created_raw),
        updated_at: parse_timestamp(&updated_raw),
    })
}
