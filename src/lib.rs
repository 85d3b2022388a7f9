//! Local-first stamp catalog engine
//!
//! Keeps a cached copy of a remote stamp catalog in two shapes (raw remote
//! records and normalized stamps), loads it cache first, and answers the
//! browsing hierarchy (country, series, type, stamp group, year, release,
//! category, paper type, varieties) on demand from the flat collection.

pub mod config;
pub mod coordinator;
pub mod details;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod normalize;
pub mod remote;
pub mod store;
pub mod types;

pub use coordinator::{CacheCoordinator, CatalogRequest, CatalogSnapshot, CoordinatorState, MountHandle};
pub use error::{CatalogError, Result};
pub use hierarchy::HierarchyAggregator;
pub use remote::{HttpCatalogSource, RemoteCatalogSource};
pub use store::{LocalCacheStore, SqliteCacheStore, NORMALIZED_SCHEMA_VERSION};
pub use types::*;
