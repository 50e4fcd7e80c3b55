// Entity Models
//
// Each persisted row type knows its column list and how to read itself from a
// rusqlite Row. Queries live in db.rs (tenancy) and repository.rs (chart of
// accounts, always scoped to one business).

pub mod business;
pub mod category;
pub mod transaction;

pub use business::{Business, Membership, Role};
pub use category::{build_tree, Category, CategoryType, CategoryWithSubs, SubCategory};
pub use transaction::{LedgerTransaction, NewTransaction};
