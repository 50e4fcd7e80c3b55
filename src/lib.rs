// Chart Defaults - Core Library
// Default chart of accounts per business: seed, rebuild, status.
// Shared by the CLI, the API server and the tests.

#[cfg(feature = "server")]
pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod logging;
pub mod rebuilder;
pub mod repository;
pub mod seeder;
pub mod service;
pub mod slug;

// Re-export commonly used types
pub use catalog::{default_catalog, Catalog, CatalogAddition, CategorySpec, ScheduleCLine, SubCategorySpec};
pub use config::Config;
pub use db::{
    add_membership, create_business, get_events_for_business, open_database, setup_database,
    DefaultsEvent, EventType,
};
pub use entities::{
    Business, Category, CategoryType, CategoryWithSubs, LedgerTransaction, Membership,
    NewTransaction, Role, SubCategory,
};
pub use error::{DefaultsError, Result};
pub use import::{import_csv, ImportReport, RowError};
pub use rebuilder::{rebuild, RebuildResult};
pub use repository::ChartRepository;
pub use seeder::{seed, SeedResult};
pub use service::{DefaultsService, DefaultsStatus, SeedOutcome, REBUILD_CONFIRMATION};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
