// 🏢 Business Entity - the tenant that owns a chart of accounts
//
// Users reach a business only through an active membership. Everything the
// core reads or writes is resolved from "the business of the current user",
// never from an id taken at face value.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::category::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub name: String,

    /// Globally unique, derived from the name
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub(crate) const COLUMNS: &'static str = "id, name, slug, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(3)?;

        Ok(Business {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            created_at: parse_timestamp(&created_at, 3)?,
        })
    }
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

/// User-to-business association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub business_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub(crate) const COLUMNS: &'static str = "id, business_id, user_id, role, is_active, joined_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(3)?;
        let joined_at: String = row.get(5)?;

        Ok(Membership {
            id: row.get(0)?,
            business_id: row.get(1)?,
            user_id: row.get(2)?,
            role: Role::parse(&role).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown role '{}'", role).into(),
                )
            })?,
            is_active: row.get(4)?,
            joined_at: parse_timestamp(&joined_at, 5)?,
        })
    }
}
