// 📚 Chart Repository - every chart-of-accounts query, scoped to one business
//
// There is no unscoped query helper: a ChartRepository is built for exactly
// one Business and every statement it runs constrains by that business id.
// It borrows a plain Connection, so the same code runs inside a
// rusqlite::Transaction (which derefs to Connection) or outside one.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use crate::entities::{
    build_tree, Business, Category, CategoryType, CategoryWithSubs, LedgerTransaction,
    NewTransaction, SubCategory,
};
use crate::error::{DefaultsError, Result};

/// Values for a category about to be created.
#[derive(Debug, Clone)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub category_type: CategoryType,
    pub schedule_c_line: Option<&'a str>,
    pub report_group: &'a str,
    pub book_reports: bool,
    pub tax_reports: bool,
    pub sort_order: i64,
}

/// Values for a sub-category about to be created.
#[derive(Debug, Clone)]
pub struct NewSubCategory<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub schedule_c_line: Option<&'a str>,
    pub sort_order: i64,
}

/// Rows removed by [`ChartRepository::delete_chart`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedRows {
    pub categories: usize,
    pub subcategories: usize,
}

pub struct ChartRepository<'c> {
    conn: &'c Connection,
    business_id: i64,
}

impl<'c> ChartRepository<'c> {
    pub fn new(conn: &'c Connection, business: &Business) -> Self {
        Self {
            conn,
            business_id: business.id,
        }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub fn find_category(&self, name: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM categories WHERE business_id = ?1 AND name = ?2",
                    Category::COLUMNS
                ),
                params![self.business_id, name],
                Category::from_row,
            )
            .optional()?;

        Ok(category)
    }

    pub fn insert_category(&self, new: &NewCategory<'_>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO categories (
                business_id, name, slug, category_type, schedule_c_line, report_group,
                book_reports, tax_reports, is_active, sort_order, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10)",
            params![
                self.business_id,
                new.name,
                new.slug,
                new.category_type.as_str(),
                new.schedule_c_line,
                new.report_group,
                new.book_reports,
                new.tax_reports,
                new.sort_order,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Categories in report order: type, then sort order, then name.
    pub fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM categories WHERE business_id = ?1
             ORDER BY category_type, sort_order, name",
            Category::COLUMNS
        ))?;

        let categories = stmt
            .query_map([self.business_id], Category::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    pub fn category_slugs(&self) -> Result<HashSet<String>> {
        self.slugs("SELECT slug FROM categories WHERE business_id = ?1")
    }

    // ========================================================================
    // Sub-categories
    // ========================================================================

    /// Sub-category `name` under `category_id`, provided the category is ours.
    pub fn find_subcategory(&self, category_id: i64, name: &str) -> Result<Option<SubCategory>> {
        let sub = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM subcategories
                     WHERE business_id = ?1 AND category_id = ?2 AND name = ?3",
                    SubCategory::COLUMNS
                ),
                params![self.business_id, category_id, name],
                SubCategory::from_row,
            )
            .optional()?;

        Ok(sub)
    }

    pub fn find_subcategory_by_id(&self, subcategory_id: i64) -> Result<Option<SubCategory>> {
        let sub = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM subcategories WHERE business_id = ?1 AND id = ?2",
                    SubCategory::COLUMNS
                ),
                params![self.business_id, subcategory_id],
                SubCategory::from_row,
            )
            .optional()?;

        Ok(sub)
    }

    /// All sub-categories with this name, across categories.
    pub fn find_subcategories_named(&self, name: &str) -> Result<Vec<SubCategory>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM subcategories WHERE business_id = ?1 AND name = ?2 ORDER BY id",
            SubCategory::COLUMNS
        ))?;

        let subs = stmt
            .query_map(params![self.business_id, name], SubCategory::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subs)
    }

    /// Create a sub-category under one of this business's categories.
    ///
    /// The insert selects the parent through the business id, so a category
    /// owned by another business yields `TenantMismatch` and writes nothing.
    pub fn insert_subcategory(&self, category_id: i64, new: &NewSubCategory<'_>) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT INTO subcategories (
                business_id, category_id, name, slug, schedule_c_line, is_active,
                sort_order, created_at
            )
            SELECT business_id, id, ?3, ?4, ?5, 1, ?6, ?7
            FROM categories
            WHERE id = ?2 AND business_id = ?1",
            params![
                self.business_id,
                category_id,
                new.name,
                new.slug,
                new.schedule_c_line,
                new.sort_order,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Err(DefaultsError::TenantMismatch(format!(
                "category {} does not belong to business {}",
                category_id, self.business_id
            )));
        }

        Ok(self.conn.last_insert_rowid())
    }

    pub fn subcategories(&self) -> Result<Vec<SubCategory>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM subcategories WHERE business_id = ?1 ORDER BY category_id, sort_order, name",
            SubCategory::COLUMNS
        ))?;

        let subs = stmt
            .query_map([self.business_id], SubCategory::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subs)
    }

    pub fn subcategory_slugs(&self) -> Result<HashSet<String>> {
        self.slugs("SELECT slug FROM subcategories WHERE business_id = ?1")
    }

    // ========================================================================
    // Whole chart
    // ========================================================================

    pub fn chart(&self) -> Result<Vec<CategoryWithSubs>> {
        Ok(build_tree(self.categories()?, self.subcategories()?))
    }

    /// (categories, sub-categories) currently owned by the business.
    pub fn counts(&self) -> Result<(i64, i64)> {
        let counts = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM categories WHERE business_id = ?1),
                (SELECT COUNT(*) FROM subcategories WHERE business_id = ?1)",
            [self.business_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(counts)
    }

    /// Remove every sub-category, then every category, of this business.
    ///
    /// Callers must hold the transaction in which `has_transactions` returned
    /// false; the RESTRICT foreign keys on `transactions` reject the delete
    /// otherwise.
    pub fn delete_chart(&self) -> Result<DeletedRows> {
        let subcategories = self.conn.execute(
            "DELETE FROM subcategories WHERE business_id = ?1",
            [self.business_id],
        )?;
        let categories = self.conn.execute(
            "DELETE FROM categories WHERE business_id = ?1",
            [self.business_id],
        )?;

        Ok(DeletedRows {
            categories,
            subcategories,
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Does this business have any ledger entries? Existence only, no count.
    pub fn has_transactions(&self) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE business_id = ?1)",
            [self.business_id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    pub fn transaction_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE business_id = ?1",
            [self.business_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// Record a transaction; its category is derived from the sub-category.
    pub fn insert_transaction(&self, new: &NewTransaction) -> Result<LedgerTransaction> {
        let sub = self
            .find_subcategory_by_id(new.subcategory_id)?
            .ok_or_else(|| {
                DefaultsError::TenantMismatch(format!(
                    "sub-category {} does not belong to business {}",
                    new.subcategory_id, self.business_id
                ))
            })?;

        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO transactions (
                business_id, category_id, subcategory_id, date, amount_cents,
                description, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.business_id,
                sub.category_id,
                sub.id,
                new.date.format("%Y-%m-%d").to_string(),
                new.amount_cents,
                new.description,
                new.notes,
                now.to_rfc3339(),
            ],
        )?;

        Ok(LedgerTransaction {
            id: self.conn.last_insert_rowid(),
            business_id: self.business_id,
            category_id: sub.category_id,
            subcategory_id: sub.id,
            date: new.date,
            amount_cents: new.amount_cents,
            description: new.description.clone(),
            notes: new.notes.clone(),
            created_at: now,
        })
    }

    /// Newest first.
    pub fn transactions(&self) -> Result<Vec<LedgerTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE business_id = ?1 ORDER BY date DESC, id DESC",
            LedgerTransaction::COLUMNS
        ))?;

        let transactions = stmt
            .query_map([self.business_id], LedgerTransaction::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    fn slugs(&self, sql: &str) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let slugs = stmt
            .query_map([self.business_id], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;

        Ok(slugs)
    }
}
