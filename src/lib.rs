//! vitrine — reactive furniture-catalog pipeline.
//!
//! Turns two independently changing inputs (selected category, free-text
//! search) into a live, paginated, favorite-annotated item list that stays
//! correct under rapid input changes, network failures, and an
//! offline-first favorites store.
//!
//! The moving parts:
//! - [`catalog::CatalogQueryController`] owns the current query and
//!   publishes it only on structural change.
//! - [`remote::RemoteCatalogFetcher`] fetches one relevance-sorted page per
//!   call from the search endpoint.
//! - [`favorites::FavoritesStore`] is a SQLite-backed keyed set with a
//!   push-based view and best-effort writes.
//! - [`catalog::CatalogPipeline`] drives pagination generation by
//!   generation, discards superseded results, and joins favorites into the
//!   visible list.
//! - [`connectivity::ConnectivityMonitor`] passes the platform online
//!   signal through to consumers.

pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod favorites;
pub mod remote;

pub use catalog::{
    AnnotatedItem, CatalogPipeline, CatalogQuery, CatalogQueryController, Category, LoadState,
    Page, ProductSummary,
};
pub use config::Config;
pub use connectivity::ConnectivityMonitor;
pub use favorites::{FavoriteRecord, FavoritesStore};
pub use remote::{CatalogFetcher, FetchError, RemoteCatalogFetcher};
