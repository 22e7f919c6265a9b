//! Core value types for the catalog pipeline.

use crate::remote::FetchError;

// ============================================================================
// Category
// ============================================================================

/// Furniture category used as a fetch-query dimension.
///
/// Each category maps to a fixed set of server-side query keywords:
///
/// | Category | Query keywords                      |
/// |----------|-------------------------------------|
/// | Table    | `table`                             |
/// | Chair    | `chair`                             |
/// | Bed      | `bed`                               |
/// | Sofa     | `sofa couch`                        |
/// | Desk     | `desk`                              |
/// | Curtain  | `curtains drapes window treatment`  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Category {
    Table,
    Chair,
    Bed,
    Sofa,
    Desk,
    Curtain,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Table,
        Category::Chair,
        Category::Bed,
        Category::Sofa,
        Category::Desk,
        Category::Curtain,
    ];

    /// Server-side search keywords for this category.
    pub fn query_keywords(self) -> &'static str {
        match self {
            Category::Table => "table",
            Category::Chair => "chair",
            Category::Bed => "bed",
            Category::Sofa => "sofa couch",
            Category::Desk => "desk",
            Category::Curtain => "curtains drapes window treatment",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Category::Table => "Table",
            Category::Chair => "Chair",
            Category::Bed => "Bed",
            Category::Sofa => "Sofa",
            Category::Desk => "Desk",
            Category::Curtain => "Curtain",
        };
        f.write_str(label)
    }
}

// ============================================================================
// CatalogQuery
// ============================================================================

/// The (category, search text) pair driving the remote search.
///
/// Equality is structural; the pipeline treats two queries as the same
/// iff both fields are equal, and never refetches on an identical re-set.
/// An empty `search_text` means "no text filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub category: Category,
    pub search_text: String,
}

impl CatalogQuery {
    pub fn new(category: Category, search_text: impl Into<String>) -> Self {
        Self {
            category,
            search_text: search_text.into(),
        }
    }

    /// The combined `q=` string sent to the remote endpoint: category
    /// keywords, narrowed by the free-text filter when present.
    pub fn search_terms(&self) -> String {
        let keywords = self.category.query_keywords();
        let text = self.search_text.trim();
        if text.is_empty() {
            keywords.to_string()
        } else {
            format!("{} {}", keywords, text)
        }
    }
}

impl Default for CatalogQuery {
    /// Initial browse query: tables, no text filter.
    fn default() -> Self {
        Self::new(Category::Table, "")
    }
}

// ============================================================================
// Product and page types
// ============================================================================

/// One catalog entry as returned by the remote search.
///
/// Identity is `id`; all other fields are replace-on-refresh, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    /// Unique, stable remote identifier.
    pub id: String,
    pub name: String,
    /// Widest available thumbnail image, when the result carries any.
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub viewer_url: Option<String>,
    pub download_url: Option<String>,
}

/// One bounded slice of a remote result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<ProductSummary>,
    /// Offset at which the next page starts (request offset + items returned).
    pub next_offset: usize,
    /// True when the server returned fewer items than requested.
    pub end_of_data: bool,
}

/// A product joined with its current favorite status.
///
/// `is_favorite` is derived from the favorites set on every change of
/// either side of the join; it is never persisted with the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedItem {
    pub product: ProductSummary,
    pub is_favorite: bool,
}

// ============================================================================
// LoadState
// ============================================================================

/// Observable state of one fetch phase.
///
/// The refresh phase (page 0) and the append phase (loading more) carry
/// independent `LoadState`s so a consumer can distinguish "whole list is
/// loading" from "has data, loading more".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No fetch has been requested yet for this phase.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch for this phase failed; prior data is untouched.
    Failed(FetchError),
    /// The last fetch for this phase completed.
    NotLoading,
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_equality_is_structural() {
        let a = CatalogQuery::new(Category::Chair, "oak");
        let b = CatalogQuery::new(Category::Chair, "oak");
        let c = CatalogQuery::new(Category::Chair, "walnut");
        let d = CatalogQuery::new(Category::Desk, "oak");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_search_terms_without_text_is_category_keywords() {
        let q = CatalogQuery::new(Category::Curtain, "");
        assert_eq!(q.search_terms(), "curtains drapes window treatment");
    }

    #[test]
    fn test_search_terms_narrows_with_text() {
        let q = CatalogQuery::new(Category::Sofa, "leather");
        assert_eq!(q.search_terms(), "sofa couch leather");
    }

    #[test]
    fn test_search_terms_ignores_whitespace_only_text() {
        let q = CatalogQuery::new(Category::Bed, "   ");
        assert_eq!(q.search_terms(), "bed");
    }

    #[test]
    fn test_default_query_is_table_browse() {
        let q = CatalogQuery::default();
        assert_eq!(q.category, Category::Table);
        assert!(q.search_text.is_empty());
    }

    #[test]
    fn test_every_category_has_keywords() {
        for category in Category::ALL {
            assert!(!category.query_keywords().is_empty());
        }
    }

    #[test]
    fn test_load_state_predicates() {
        assert!(LoadState::Loading.is_loading());
        assert!(!LoadState::Idle.is_loading());
        assert!(LoadState::Failed(FetchError::Timeout).is_failed());
        assert!(!LoadState::NotLoading.is_failed());
    }
}
