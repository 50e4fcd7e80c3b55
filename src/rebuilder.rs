// ♻️ Rebuilder - destructive reset of a business's chart of accounts
//
// Allowed only while the business has no transactions. The existence check,
// the delete and the re-seed share one IMMEDIATE transaction: SQLite grants
// the write lock at BEGIN, so no other connection can record a transaction
// between the check and the delete.
//
//   EMPTY --seed--> POPULATED_NO_TX --record tx--> POPULATED_WITH_TX
//                        ^      |
//                        +------+ rebuild (delete + re-seed)

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{default_catalog, Catalog};
use crate::db::{insert_event, DefaultsEvent, EventType};
use crate::entities::Business;
use crate::error::{DefaultsError, Result};
use crate::repository::ChartRepository;
use crate::seeder::{seed_within, SYSTEM_ACTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildResult {
    pub categories_deleted: usize,
    pub subcategories_deleted: usize,
    pub categories_created: usize,
    pub subcategories_created: usize,
    pub catalog_version: u32,
}

/// Rebuild `business` from the current default catalog.
pub fn rebuild(conn: &mut Connection, business: &Business) -> Result<RebuildResult> {
    rebuild_catalog(conn, business, default_catalog(), SYSTEM_ACTOR)
}

/// Rebuild from an explicit catalog, recording `actor` in the audit trail.
///
/// Fails with `GuardViolation` (nothing deleted, nothing seeded) when the
/// business has any transaction.
pub fn rebuild_catalog(
    conn: &mut Connection,
    business: &Business,
    catalog: &Catalog,
    actor: &str,
) -> Result<RebuildResult> {
    catalog.validate()?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let repo = ChartRepository::new(&tx, business);

    if repo.has_transactions()? {
        let transactions = repo.transaction_count()?;
        warn!(
            business_id = business.id,
            transactions, "rebuild blocked: business has transactions"
        );
        // tx dropped here: rolled back, nothing touched
        return Err(DefaultsError::GuardViolation { transactions });
    }

    let deleted = repo.delete_chart()?;
    let seeded = seed_within(&tx, business, catalog)?;

    let result = RebuildResult {
        categories_deleted: deleted.categories,
        subcategories_deleted: deleted.subcategories,
        categories_created: seeded.categories_created,
        subcategories_created: seeded.subcategories_created,
        catalog_version: catalog.version,
    };

    insert_event(
        &tx,
        &DefaultsEvent::new(
            business.id,
            EventType::Rebuilt,
            catalog.version,
            &catalog.fingerprint(),
            serde_json::to_value(result)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            actor,
        ),
    )?;

    tx.commit()?;

    info!(
        business_id = business.id,
        categories_deleted = result.categories_deleted,
        subcategories_deleted = result.subcategories_deleted,
        categories_created = result.categories_created,
        subcategories_created = result.subcategories_created,
        "defaults rebuilt"
    );

    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================
