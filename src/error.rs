// ⚠️ Error taxonomy for the defaults lifecycle
//
// Every failure leaves the store exactly as it was before the call: the
// rusqlite::Transaction is dropped (rolled back) before the error reaches
// the caller.

use thiserror::Error;

/// Errors surfaced by the seeding / rebuilding core and its boundary.
#[derive(Debug, Error)]
pub enum DefaultsError {
    /// Rebuild was requested while ledger entries still reference the chart.
    #[error(
        "cannot rebuild: {transactions} transaction(s) exist for this business, use re-seed instead"
    )]
    GuardViolation { transactions: i64 },

    /// Underlying persistence failure (connectivity, constraint, rollback).
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The caller resolved to no business they are a member of.
    #[error("user {user_id} has no active business")]
    Authorization { user_id: i64 },

    /// Rebuild invoked without the explicit confirmation phrase.
    #[error("rebuild requires explicit confirmation")]
    ConfirmationRequired,

    /// Catalog data failed its sanity checks.
    #[error("invalid default catalog: {0}")]
    Catalog(String),

    /// A reference crossed a business boundary.
    #[error("tenant mismatch: {0}")]
    TenantMismatch(String),

    #[error("import failed: {0}")]
    Import(String),
}

impl DefaultsError {
    /// Expected, user-facing outcomes as opposed to system faults.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            DefaultsError::GuardViolation { .. }
                | DefaultsError::Authorization { .. }
                | DefaultsError::ConfirmationRequired
                | DefaultsError::TenantMismatch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DefaultsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_violation_message() {
        let err = DefaultsError::GuardViolation { transactions: 3 };
        let msg = err.to_string();

        assert!(msg.contains("cannot rebuild"));
        assert!(msg.contains("use re-seed instead"));
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_storage_error_is_not_user_facing() {
        let err: DefaultsError = rusqlite::Error::QueryReturnedNoRows.into();

        assert!(matches!(err, DefaultsError::Storage(_)));
        assert!(!err.is_user_facing());
    }
}
