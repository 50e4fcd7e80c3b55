// 🗄️ Database - schema, connection setup, tenancy and the defaults audit trail
//
// Chart-of-accounts queries live in repository.rs and are always scoped to a
// single business. This module owns what sits around them: businesses,
// memberships, the active-business pointer and the event log.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::Config;
use crate::entities::category::parse_timestamp;
use crate::entities::{Business, Membership, Role};
use crate::error::Result;
use crate::slug::{unique_slug, BUSINESS_SLUG_MAX};

/// Open the configured database file and make sure the schema exists.
pub fn open_database(config: &Config) -> Result<Connection> {
    let conn = Connection::open(&config.database_path)?;
    configure_connection(&conn, config)?;
    setup_database(&conn)?;

    tracing::debug!(path = %config.database_path.display(), "database opened");
    Ok(conn)
}

/// Connection-level settings every connection needs before use.
pub fn configure_connection(conn: &Connection, config: &Config) -> Result<()> {
    conn.busy_timeout(config.busy_timeout())?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases answer "memory"
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        -- ==================================================================
        -- Tenancy
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS businesses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memberships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL DEFAULT 'member'
                CHECK (role IN ('owner', 'admin', 'member', 'viewer')),
            is_active INTEGER NOT NULL DEFAULT 1,
            joined_at TEXT NOT NULL,
            UNIQUE (business_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS user_business_state (
            user_id INTEGER PRIMARY KEY,
            active_business_id INTEGER REFERENCES businesses(id) ON DELETE SET NULL
        );

        -- ==================================================================
        -- Chart of accounts
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            category_type TEXT NOT NULL CHECK (category_type IN ('income', 'expense')),
            schedule_c_line TEXT,
            report_group TEXT NOT NULL DEFAULT '',
            book_reports INTEGER NOT NULL DEFAULT 1,
            tax_reports INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (business_id, name),
            UNIQUE (business_id, slug)
        );

        CREATE TABLE IF NOT EXISTS subcategories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            schedule_c_line TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (category_id, name),
            UNIQUE (business_id, slug)
        );

        -- ==================================================================
        -- Ledger (referenced read-only by the defaults core)
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE RESTRICT,
            subcategory_id INTEGER NOT NULL REFERENCES subcategories(id) ON DELETE RESTRICT,
            date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            description TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );

        -- ==================================================================
        -- Defaults audit trail
        -- ==================================================================
        CREATE TABLE IF NOT EXISTS defaults_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            event_type TEXT NOT NULL,
            catalog_version INTEGER NOT NULL,
            catalog_fingerprint TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        -- ==================================================================
        -- Indexes
        -- ==================================================================
        CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id, is_active);
        CREATE INDEX IF NOT EXISTS idx_subcategories_business ON subcategories(business_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_business ON transactions(business_id);
        CREATE INDEX IF NOT EXISTS idx_defaults_events_business ON defaults_events(business_id);
        ",
    )?;

    Ok(())
}

// ============================================================================
// Businesses & memberships
// ============================================================================

pub fn create_business(conn: &Connection, name: &str) -> Result<Business> {
    let mut used: HashSet<String> = {
        let mut stmt = conn.prepare("SELECT slug FROM businesses")?;
        let slugs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;
        slugs
    };
    let base = if name.trim().is_empty() { "business" } else { name };
    let slug = unique_slug(base, &mut used, BUSINESS_SLUG_MAX);
    let now = Utc::now();

    conn.execute(
        "INSERT INTO businesses (name, slug, created_at) VALUES (?1, ?2, ?3)",
        params![name, slug, now.to_rfc3339()],
    )?;

    Ok(Business {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        slug,
        created_at: now,
    })
}

pub fn find_business(conn: &Connection, business_id: i64) -> Result<Option<Business>> {
    let business = conn
        .query_row(
            &format!("SELECT {} FROM businesses WHERE id = ?1", Business::COLUMNS),
            [business_id],
            Business::from_row,
        )
        .optional()?;

    Ok(business)
}

/// Add (or reactivate) a user's membership in a business.
pub fn add_membership(
    conn: &Connection,
    business_id: i64,
    user_id: i64,
    role: Role,
) -> Result<Membership> {
    conn.execute(
        "INSERT INTO memberships (business_id, user_id, role, is_active, joined_at)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT (business_id, user_id) DO UPDATE SET role = excluded.role, is_active = 1",
        params![business_id, user_id, role.as_str(), Utc::now().to_rfc3339()],
    )?;

    let membership = conn.query_row(
        &format!(
            "SELECT {} FROM memberships WHERE business_id = ?1 AND user_id = ?2",
            Membership::COLUMNS
        ),
        params![business_id, user_id],
        Membership::from_row,
    )?;

    Ok(membership)
}

pub fn deactivate_membership(conn: &Connection, business_id: i64, user_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE memberships SET is_active = 0 WHERE business_id = ?1 AND user_id = ?2",
        params![business_id, user_id],
    )?;

    Ok(changed > 0)
}

/// Active memberships of a user, oldest first.
pub fn active_memberships(conn: &Connection, user_id: i64) -> Result<Vec<Membership>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM memberships WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
        Membership::COLUMNS
    ))?;

    let memberships = stmt
        .query_map([user_id], Membership::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(memberships)
}

pub fn active_business_id(conn: &Connection, user_id: i64) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT active_business_id FROM user_business_state WHERE user_id = ?1",
            [user_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;

    Ok(id.flatten())
}

/// Store the user's selected business. Membership is checked by the caller.
pub fn set_active_business(conn: &Connection, user_id: i64, business_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO user_business_state (user_id, active_business_id) VALUES (?1, ?2)
         ON CONFLICT (user_id) DO UPDATE SET active_business_id = excluded.active_business_id",
        params![user_id, business_id],
    )?;

    Ok(())
}

// ============================================================================
// Defaults audit trail
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Seeded,
    Rebuilt,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Seeded => "seeded",
            EventType::Rebuilt => "rebuilt",
        }
    }

    fn parse(value: &str) -> Option<EventType> {
        match value {
            "seeded" => Some(EventType::Seeded),
            "rebuilt" => Some(EventType::Rebuilt),
            _ => None,
        }
    }
}

/// One seed or rebuild applied to a business ("every change is an event").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsEvent {
    pub event_id: String,
    pub business_id: i64,
    pub event_type: EventType,
    pub catalog_version: u32,
    pub catalog_fingerprint: String,
    pub data: serde_json::Value,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl DefaultsEvent {
    pub fn new(
        business_id: i64,
        event_type: EventType,
        catalog_version: u32,
        catalog_fingerprint: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            business_id,
            event_type,
            catalog_version,
            catalog_fingerprint: catalog_fingerprint.to_string(),
            data,
            actor: actor.to_string(),
            timestamp: Utc::now(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &DefaultsEvent) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO defaults_events (
            event_id, business_id, event_type, catalog_version, catalog_fingerprint,
            data, actor, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.business_id,
            event.event_type.as_str(),
            event.catalog_version,
            event.catalog_fingerprint,
            data_json,
            event.actor,
            event.timestamp.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// Events for one business, newest first.
pub fn get_events_for_business(conn: &Connection, business_id: i64) -> Result<Vec<DefaultsEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, business_id, event_type, catalog_version, catalog_fingerprint,
                data, actor, timestamp
         FROM defaults_events
         WHERE business_id = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map([business_id], |row| {
            let event_type: String = row.get(2)?;
            let data_json: String = row.get(5)?;
            let timestamp: String = row.get(7)?;

            Ok(DefaultsEvent {
                event_id: row.get(0)?,
                business_id: row.get(1)?,
                event_type: EventType::parse(&event_type).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown event type '{}'", event_type).into(),
                    )
                })?,
                catalog_version: row.get(3)?,
                catalog_fingerprint: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
                timestamp: parse_timestamp(&timestamp, 7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Catalog version of the most recent seed or rebuild, if any.
pub fn last_applied_catalog_version(conn: &Connection, business_id: i64) -> Result<Option<u32>> {
    let version = conn
        .query_row(
            "SELECT catalog_version FROM defaults_events
             WHERE business_id = ?1
             ORDER BY id DESC
             LIMIT 1",
            [business_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version)
}
