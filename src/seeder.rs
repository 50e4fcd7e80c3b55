// 🌱 Seeder - fill a business's chart of accounts with the default catalog
//
// Idempotent: only missing categories / sub-categories are created, existing
// rows are never updated or deleted (a user's tax-line edits survive catalog
// updates). The whole run is one IMMEDIATE transaction: all missing rows are
// inserted, or none are.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{default_catalog, Catalog};
use crate::db::{insert_event, DefaultsEvent, EventType};
use crate::entities::Business;
use crate::error::Result;
use crate::repository::{ChartRepository, NewCategory, NewSubCategory};
use crate::slug::{unique_slug, CATEGORY_SLUG_MAX, SUBCATEGORY_SLUG_MAX};

/// Actor recorded when no user is attached to the call.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub categories_created: usize,
    pub subcategories_created: usize,
    pub catalog_version: u32,
}

impl SeedResult {
    pub fn created_anything(&self) -> bool {
        self.categories_created + self.subcategories_created > 0
    }
}

/// Seed the current default catalog into `business`.
pub fn seed(conn: &mut Connection, business: &Business) -> Result<SeedResult> {
    seed_catalog(conn, business, default_catalog(), SYSTEM_ACTOR)
}

/// Seed an explicit catalog, recording `actor` in the audit trail.
pub fn seed_catalog(
    conn: &mut Connection,
    business: &Business,
    catalog: &Catalog,
    actor: &str,
) -> Result<SeedResult> {
    catalog.validate()?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = seed_within(&tx, business, catalog)?;

    insert_event(
        &tx,
        &DefaultsEvent::new(
            business.id,
            EventType::Seeded,
            catalog.version,
            &catalog.fingerprint(),
            serde_json::json!({
                "categories_created": result.categories_created,
                "subcategories_created": result.subcategories_created,
            }),
            actor,
        ),
    )?;

    tx.commit()?;

    info!(
        business_id = business.id,
        categories_created = result.categories_created,
        subcategories_created = result.subcategories_created,
        catalog_version = catalog.version,
        "defaults seeded"
    );

    Ok(result)
}

/// Creation logic shared by the seeder and the rebuilder.
///
/// Runs on whatever transaction the caller holds; does not commit.
pub(crate) fn seed_within(
    conn: &Connection,
    business: &Business,
    catalog: &Catalog,
) -> Result<SeedResult> {
    let repo = ChartRepository::new(conn, business);
    let mut category_slugs = repo.category_slugs()?;
    let mut subcategory_slugs = repo.subcategory_slugs()?;

    let mut result = SeedResult {
        categories_created: 0,
        subcategories_created: 0,
        catalog_version: catalog.version,
    };

    for (position, spec) in catalog.categories.iter().enumerate() {
        let category_id = match repo.find_category(spec.name)? {
            Some(existing) => existing.id,
            None => {
                let slug = unique_slug(spec.name, &mut category_slugs, CATEGORY_SLUG_MAX);
                let id = repo.insert_category(&NewCategory {
                    name: spec.name,
                    slug: &slug,
                    category_type: spec.category_type,
                    schedule_c_line: spec.schedule_c_line,
                    report_group: spec.report_group,
                    book_reports: spec.book_reports,
                    tax_reports: spec.tax_reports,
                    sort_order: position as i64 + 1,
                })?;
                debug!(business_id = business.id, category = spec.name, "category created");
                result.categories_created += 1;
                id
            }
        };

        for (sub_position, sub) in spec.subcategories.iter().enumerate() {
            if repo.find_subcategory(category_id, sub.name)?.is_some() {
                continue;
            }

            let slug = unique_slug(
                &format!("{}-{}", spec.name, sub.name),
                &mut subcategory_slugs,
                SUBCATEGORY_SLUG_MAX,
            );
            repo.insert_subcategory(
                category_id,
                &NewSubCategory {
                    name: sub.name,
                    slug: &slug,
                    schedule_c_line: sub.schedule_c_line,
                    sort_order: sub_position as i64 + 1,
                },
            )?;
            debug!(
                business_id = business.id,
                category = spec.name,
                subcategory = sub.name,
                "sub-category created"
            );
            result.subcategories_created += 1;
        }
    }

    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{TRAVEL, TRAVEL_NEXT};
    use crate::db::{create_business, get_events_for_business, setup_database};
    use crate::entities::CategoryWithSubs;
    use crate::error::DefaultsError;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    /// (category, sub-category) names, for comparing chart states.
    fn snapshot(conn: &Connection, business: &Business) -> Vec<(String, Vec<String>)> {
        ChartRepository::new(conn, business)
            .chart()
            .unwrap()
            .into_iter()
            .map(|CategoryWithSubs { category, subcategories }| {
                (category.name, subcategories.into_iter().map(|s| s.name).collect())
            })
            .collect()
    }

    #[test]
    fn test_seed_travel_scenario() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();

        let first = seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();
        assert_eq!((first.categories_created, first.subcategories_created), (1, 2));

        let chart = ChartRepository::new(&conn, &business).chart().unwrap();
        assert_eq!(chart[0].category.name, "Travel");
        assert_eq!(chart[0].category.schedule_c_line.as_deref(), Some("24a"));
        assert_eq!(chart[0].subcategories[0].slug, "travel-airfare");
        assert!(chart[0].subcategories.iter().all(|s| s.schedule_c_line.is_none()));

        let second = seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();
        assert_eq!((second.categories_created, second.subcategories_created), (0, 0));
        assert!(!second.created_anything());
    }

    #[test]
    fn test_seed_is_idempotent_for_default_catalog() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();

        let first = seed(&mut conn, &business).unwrap();
        let after_first = snapshot(&conn, &business);
        let second = seed(&mut conn, &business).unwrap();

        assert_eq!(first.categories_created, default_catalog().category_count());
        assert_eq!(first.subcategories_created, default_catalog().subcategory_count());
        assert_eq!((second.categories_created, second.subcategories_created), (0, 0));
        assert_eq!(snapshot(&conn, &business), after_first);
    }

    #[test]
    fn test_seed_fills_gaps_without_touching_existing_rows() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();
        seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();

        // User edits the tax line and removes a sub-category
        conn.execute(
            "UPDATE categories SET schedule_c_line = '27b' WHERE business_id = ?1",
            [business.id],
        )
        .unwrap();
        conn.execute(
            "DELETE FROM subcategories WHERE business_id = ?1 AND name = 'Lodging'",
            [business.id],
        )
        .unwrap();

        let result = seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();
        assert_eq!((result.categories_created, result.subcategories_created), (0, 1));

        let travel = ChartRepository::new(&conn, &business)
            .find_category("Travel")
            .unwrap()
            .unwrap();
        assert_eq!(travel.schedule_c_line.as_deref(), Some("27b"));
        assert_eq!(
            snapshot(&conn, &business),
            vec![("Travel".to_string(), vec!["Airfare".to_string(), "Lodging".to_string()])]
        );
    }

    #[test]
    fn test_seed_newer_catalog_adds_only_new_entries() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();
        seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();

        let result = seed_catalog(&mut conn, &business, &TRAVEL_NEXT, "test").unwrap();

        assert_eq!((result.categories_created, result.subcategories_created), (1, 2));
        assert_eq!(result.catalog_version, 2);
        assert_eq!(ChartRepository::new(&conn, &business).counts().unwrap(), (2, 4));
    }

    #[test]
    fn test_seed_rolls_back_on_storage_failure() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_mid_seed BEFORE INSERT ON subcategories
             WHEN NEW.name = 'Lodging'
             BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END;",
        )
        .unwrap();

        let before = snapshot(&conn, &business);
        let err = seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap_err();

        assert!(matches!(err, DefaultsError::Storage(_)));
        assert_eq!(snapshot(&conn, &business), before);
        assert!(get_events_for_business(&conn, business.id).unwrap().is_empty());
    }

    #[test]
    fn test_seed_leaves_other_businesses_alone() {
        let mut conn = memory_db();
        let b1 = create_business(&conn, "One").unwrap();
        let b2 = create_business(&conn, "Two").unwrap();
        seed_catalog(&mut conn, &b2, &TRAVEL, "test").unwrap();
        conn.execute(
            "DELETE FROM subcategories WHERE business_id = ?1 AND name = 'Lodging'",
            [b2.id],
        )
        .unwrap();
        let b2_before = snapshot(&conn, &b2);

        seed(&mut conn, &b1).unwrap();

        assert_eq!(snapshot(&conn, &b2), b2_before);
        assert!(ChartRepository::new(&conn, &b1).find_category("Travel").unwrap().is_none());
    }

    #[test]
    fn test_seed_records_event() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();

        seed_catalog(&mut conn, &business, &TRAVEL, "user:7").unwrap();

        let events = get_events_for_business(&conn, business.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Seeded);
        assert_eq!(events[0].actor, "user:7");
        assert_eq!(events[0].catalog_fingerprint, TRAVEL.fingerprint());
        assert_eq!(events[0].data["subcategories_created"], 2);
    }

    #[test]
    fn test_seed_slug_avoids_user_collision() {
        let mut conn = memory_db();
        let business = create_business(&conn, "Acme").unwrap();
        // A user category already owns the slug "travel" under another name
        conn.execute(
            "INSERT INTO categories (business_id, name, slug, category_type, created_at)
             VALUES (?1, 'TRAVEL!', 'travel', 'expense', '2025-01-01T00:00:00+00:00')",
            [business.id],
        )
        .unwrap();

        seed_catalog(&mut conn, &business, &TRAVEL, "test").unwrap();

        let travel = ChartRepository::new(&conn, &business)
            .find_category("Travel")
            .unwrap()
            .unwrap();
        assert_eq!(travel.slug, "travel-2");
    }
}
