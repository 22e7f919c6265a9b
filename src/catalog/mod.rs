mod merger;
mod query;
mod types;

pub use merger::CatalogPipeline;
pub use query::CatalogQueryController;
pub use types::{AnnotatedItem, CatalogQuery, Category, LoadState, Page, ProductSummary};
