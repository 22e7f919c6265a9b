//! Owner of the current (category, search text) pair.

use crate::catalog::{CatalogQuery, Category};
use tokio::sync::watch;

/// Exclusively owns the current [`CatalogQuery`] and publishes it on change.
///
/// Setters are total functions: no input is invalid. A setter that produces
/// a query structurally equal to the current one is a no-op and publishes
/// nothing, so identical re-sets can never trigger a refetch downstream.
pub struct CatalogQueryController {
    watch_tx: watch::Sender<CatalogQuery>,
}

impl CatalogQueryController {
    pub fn new(initial: CatalogQuery) -> Self {
        let (watch_tx, _) = watch::channel(initial);
        Self { watch_tx }
    }

    /// The query currently in effect.
    pub fn current(&self) -> CatalogQuery {
        self.watch_tx.borrow().clone()
    }

    /// Live view of the current query.
    pub fn subscribe(&self) -> watch::Receiver<CatalogQuery> {
        self.watch_tx.subscribe()
    }

    /// Replace the category, keeping the search text. Returns true when the
    /// query actually changed.
    pub fn set_category(&self, category: Category) -> bool {
        let candidate = CatalogQuery {
            category,
            search_text: self.watch_tx.borrow().search_text.clone(),
        };
        self.publish_if_changed(candidate)
    }

    /// Replace the search text, keeping the category. Returns true when the
    /// query actually changed.
    pub fn set_search_text(&self, search_text: impl Into<String>) -> bool {
        let candidate = CatalogQuery {
            category: self.watch_tx.borrow().category,
            search_text: search_text.into(),
        };
        self.publish_if_changed(candidate)
    }

    fn publish_if_changed(&self, candidate: CatalogQuery) -> bool {
        if *self.watch_tx.borrow() == candidate {
            tracing::debug!(category = %candidate.category, "Query unchanged, skipping publish");
            return false;
        }
        tracing::debug!(
            category = %candidate.category,
            search = %candidate.search_text,
            "Query changed"
        );
        self.watch_tx.send_replace(candidate);
        true
    }
}

impl Default for CatalogQueryController {
    fn default() -> Self {
        Self::new(CatalogQuery::default())
    }
}
