mod filters;
mod models;
mod schema;
mod store;
mod trait_def;

pub use filters::{TrackFilters, DEFAULT_FIND_LIMIT, MAX_FIND_LIMIT};
pub use models::*;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogAccessor;

#[cfg(feature = "mock")]
pub use trait_def::MockCatalogAccessor;
