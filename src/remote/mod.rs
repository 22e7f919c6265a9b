mod fetcher;
mod response;

pub use fetcher::{
    CatalogFetcher, FetchError, RemoteCatalogFetcher, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT,
};
