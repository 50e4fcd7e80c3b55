// 💵 Ledger Transaction - the entity whose existence gates a rebuild
//
// The defaults core only reads transactions. The constructor here exists for
// the CSV importer and for tests that need a populated ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::category::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub business_id: i64,

    /// Derived from the sub-category, never chosen directly
    pub category_id: i64,
    pub subcategory_id: i64,

    pub date: NaiveDate,

    /// Signed amount in cents; refunds are negative
    pub amount_cents: i64,
    pub description: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub(crate) const COLUMNS: &'static str =
        "id, business_id, category_id, subcategory_id, date, amount_cents, description, notes, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let date: String = row.get(4)?;
        let created_at: String = row.get(8)?;

        Ok(LedgerTransaction {
            id: row.get(0)?,
            business_id: row.get(1)?,
            category_id: row.get(2)?,
            subcategory_id: row.get(3)?,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            amount_cents: row.get(5)?,
            description: row.get(6)?,
            notes: row.get(7)?,
            created_at: parse_timestamp(&created_at, 8)?,
        })
    }
}

/// Values for a transaction about to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub subcategory_id: i64,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub description: String,
    #[serde(default)]
    pub notes: String,
}

impl NewTransaction {
    pub fn new(subcategory_id: i64, date: NaiveDate, amount_cents: i64, description: &str) -> Self {
        Self {
            subcategory_id,
            date,
            amount_cents,
            description: description.to_string(),
            notes: String::new(),
        }
    }
}
