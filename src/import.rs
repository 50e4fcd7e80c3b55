// 📥 CSV import of ledger transactions into a business
//
// Columns: date, amount, description, subcategory[, notes]
//
// `subcategory` is either "Category/Sub-category" or a bare sub-category name
// that is unique within the business. Rows that fail to parse or resolve are
// reported and skipped; the rest are written in one transaction.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::{Business, NewTransaction, SubCategory};
use crate::error::{DefaultsError, Result};
use crate::repository::ChartRepository;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    amount: String,
    description: String,
    subcategory: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the file, header included.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows_read: usize,
    pub imported: usize,
    pub errors: Vec<RowError>,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Import a CSV file. With `dry_run` every row is validated but nothing is written.
pub fn import_csv(
    conn: &mut Connection,
    business: &Business,
    csv_path: &Path,
    dry_run: bool,
) -> Result<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(csv_path)
        .map_err(|e| DefaultsError::Import(format!("{}: {}", csv_path.display(), e)))?;

    let headers = rdr
        .headers()
        .map_err(|e| DefaultsError::Import(e.to_string()))?
        .clone();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let repo = ChartRepository::new(&tx, business);

    let mut report = ImportReport {
        dry_run,
        ..ImportReport::default()
    };

    for (index, record) in rdr.records().enumerate() {
        let line = index + 2;
        report.rows_read += 1;

        let parsed = record
            .map_err(|e| e.to_string())
            .and_then(|r| r.deserialize::<CsvRow>(Some(&headers)).map_err(|e| e.to_string()))
            .and_then(|row| build_transaction(&repo, row));

        match parsed {
            Ok(new) => {
                if !dry_run {
                    repo.insert_transaction(&new)?;
                }
                report.imported += 1;
            }
            Err(message) => {
                warn!(line, %message, "skipping CSV row");
                report.errors.push(RowError { line, message });
            }
        }
    }

    if dry_run {
        // Dropping tx rolls back; nothing was written anyway
        drop(tx);
    } else {
        tx.commit()?;
    }

    info!(
        business_id = business.id,
        rows = report.rows_read,
        imported = report.imported,
        errors = report.errors.len(),
        dry_run,
        "CSV import finished"
    );

    Ok(report)
}

fn build_transaction(
    repo: &ChartRepository<'_>,
    row: CsvRow,
) -> std::result::Result<NewTransaction, String> {
    let date = parse_date(&row.date).ok_or_else(|| format!("invalid date '{}'", row.date))?;
    let amount_cents =
        parse_amount(&row.amount).ok_or_else(|| format!("invalid amount '{}'", row.amount))?;
    if row.description.is_empty() {
        return Err("description is empty".to_string());
    }
    let sub = resolve_subcategory(repo, &row.subcategory)?;

    let mut new = NewTransaction::new(sub.id, date, amount_cents, &row.description);
    new.notes = row.notes.unwrap_or_default();
    Ok(new)
}

fn resolve_subcategory(
    repo: &ChartRepository<'_>,
    value: &str,
) -> std::result::Result<SubCategory, String> {
    let storage = |e: DefaultsError| e.to_string();

    if let Some((category_name, sub_name)) = value.split_once('/') {
        let category = repo
            .find_category(category_name.trim())
            .map_err(storage)?
            .ok_or_else(|| format!("unknown category '{}'", category_name.trim()))?;
        return repo
            .find_subcategory(category.id, sub_name.trim())
            .map_err(storage)?
            .ok_or_else(|| format!("unknown sub-category '{}'", value));
    }

    let mut matches = repo.find_subcategories_named(value).map_err(storage)?;
    match matches.len() {
        0 => Err(format!("unknown sub-category '{}'", value)),
        1 => Ok(matches.remove(0)),
        n => Err(format!(
            "sub-category '{}' is ambiguous ({} matches), use Category/Sub-category",
            value, n
        )),
    }
}

/// ISO dates, or US style M/D/YYYY and M/D/YY.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    let year = value.rsplit('/').next()?;
    let format = if year.len() == 2 { "%m/%d/%y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(value, format).ok()
}

/// Amount in cents. Accepts "$1,234.50", "-12", "(45.00)"; negatives are refunds.
pub fn parse_amount(value: &str) -> Option<i64> {
    let mut text = value.trim();
    let mut negative = false;

    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim();
    }

    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let dollars: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    let total = dollars.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -total } else { total })
}
