// 🧭 DefaultsService - the boundary between callers (HTTP, CLI) and the core
//
// Every operation starts from a user id and resolves the business that user
// is acting for; callers never pass a business straight through.

use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::{default_catalog, Catalog, CatalogAddition};
use crate::db::{
    active_business_id, active_memberships, find_business, last_applied_catalog_version,
    set_active_business,
};
use crate::entities::{Business, CategoryWithSubs};
use crate::error::{DefaultsError, Result};
use crate::rebuilder::{rebuild_catalog, RebuildResult};
use crate::repository::ChartRepository;
use crate::seeder::{seed_catalog, SeedResult};

/// Phrase a caller must send to run a destructive rebuild.
pub const REBUILD_CONFIRMATION: &str = "REBUILD";

/// Result of a seed request.
///
/// `already_seeded` is true when the business had a chart before the call,
/// i.e. this run only filled in missing items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedOutcome {
    #[serde(flatten)]
    pub result: SeedResult,
    pub already_seeded: bool,
}

/// Read-only summary of where a business stands in the defaults lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultsStatus {
    pub business_id: i64,
    pub has_seeded: bool,
    pub can_rebuild: bool,
    pub category_count: i64,
    pub subcategory_count: i64,
    pub transaction_count: i64,
    pub applied_catalog_version: Option<u32>,
    pub current_catalog_version: u32,
    /// Catalog entries newer than the last seed/rebuild. Applied only when
    /// the user seeds again.
    pub pending_additions: Vec<CatalogAddition>,
}

pub struct DefaultsService<'c> {
    conn: &'c mut Connection,
    catalog: &'static Catalog,
}

impl<'c> DefaultsService<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self::with_catalog(conn, default_catalog())
    }

    pub fn with_catalog(conn: &'c mut Connection, catalog: &'static Catalog) -> Self {
        Self { conn, catalog }
    }

    /// Business the user is currently acting for.
    ///
    /// The stored selection wins while the membership behind it is still
    /// active; otherwise the user's oldest active membership is used.
    pub fn resolve_business(&self, user_id: i64) -> Result<Business> {
        let memberships = active_memberships(self.conn, user_id)?;

        let selected = active_business_id(self.conn, user_id)?
            .filter(|id| memberships.iter().any(|m| m.business_id == *id));

        let business_id = match selected.or_else(|| memberships.first().map(|m| m.business_id)) {
            Some(id) => id,
            None => return Err(DefaultsError::Authorization { user_id }),
        };

        find_business(self.conn, business_id)?.ok_or(DefaultsError::Authorization { user_id })
    }

    /// The business, if `user_id` holds an active membership in it.
    pub fn verify_membership(&self, user_id: i64, business_id: i64) -> Result<Business> {
        let member = active_memberships(self.conn, user_id)?
            .iter()
            .any(|m| m.business_id == business_id);
        if !member {
            return Err(DefaultsError::Authorization { user_id });
        }

        find_business(self.conn, business_id)?.ok_or(DefaultsError::Authorization { user_id })
    }

    /// Switch the user's active business after checking membership.
    pub fn select_business(&self, user_id: i64, business_id: i64) -> Result<Business> {
        let business = self.verify_membership(user_id, business_id)?;
        set_active_business(self.conn, user_id, business.id)?;
        Ok(business)
    }

    pub fn seed_defaults(&mut self, user_id: i64) -> Result<SeedOutcome> {
        let business = self.resolve_business(user_id)?;
        let (existing_categories, _) = ChartRepository::new(self.conn, &business).counts()?;

        let result = seed_catalog(self.conn, &business, self.catalog, &actor(user_id))?;

        Ok(SeedOutcome {
            result,
            already_seeded: existing_categories > 0,
        })
    }

    pub fn rebuild_defaults(&mut self, user_id: i64, confirmation: &str) -> Result<RebuildResult> {
        if confirmation != REBUILD_CONFIRMATION {
            return Err(DefaultsError::ConfirmationRequired);
        }

        let business = self.resolve_business(user_id)?;
        rebuild_catalog(self.conn, &business, self.catalog, &actor(user_id))
    }

    pub fn defaults_status(&self, user_id: i64) -> Result<DefaultsStatus> {
        let business = self.resolve_business(user_id)?;
        let repo = ChartRepository::new(self.conn, &business);

        let (category_count, subcategory_count) = repo.counts()?;
        let transaction_count = repo.transaction_count()?;
        let applied = last_applied_catalog_version(self.conn, business.id)?;

        let pending_additions = match applied {
            Some(version) => self.catalog.additions_since(version),
            None => Vec::new(),
        };

        Ok(DefaultsStatus {
            business_id: business.id,
            has_seeded: category_count > 0,
            can_rebuild: transaction_count == 0,
            category_count,
            subcategory_count,
            transaction_count,
            applied_catalog_version: applied,
            current_catalog_version: self.catalog.version,
            pending_additions,
        })
    }

    pub fn chart(&self, user_id: i64) -> Result<Vec<CategoryWithSubs>> {
        let business = self.resolve_business(user_id)?;
        ChartRepository::new(self.conn, &business).chart()
    }
}

fn actor(user_id: i64) -> String {
    format!("user:{}", user_id)
}

// ============================================================================
// TESTS
// ============================================================================
