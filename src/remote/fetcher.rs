//! Remote catalog search client.
//!
//! Issues one outbound request per `fetch_page` call; no caching, no
//! internal retries. Retry policy belongs to the caller.

use crate::catalog::{CatalogQuery, Page};
use crate::remote::response::SearchResponse;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single page fetch. All variants are terminal for that
/// request; the pipeline attaches them to the phase that issued the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused, TLS, offline).
    #[error("Network unavailable")]
    NetworkUnavailable,
    /// Non-2xx HTTP response.
    #[error("Server error: status {0}")]
    ServerError(u16),
    /// Response body could not be decoded as a search result.
    #[error("Malformed response")]
    MalformedResponse,
    /// Request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,
}

/// Abstraction over the remote search so the merger can be driven by
/// scripted fakes in tests.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetch one page of results for `query` starting at `offset`.
    ///
    /// Callers guarantee `page_size > 0`; violating that is a programming
    /// error, not a runtime failure.
    async fn fetch_page(
        &self,
        query: &CatalogQuery,
        offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError>;
}

/// HTTP implementation of [`CatalogFetcher`] against the search endpoint:
///
/// `GET {base}/search?type=models&q=<terms>&downloadable=true&sort_by=-likeCount&count=<n>&offset=<n>`
///
/// Results are relevance-sorted by like count (highest first); category
/// keywords and search text narrow the query server-side.
pub struct RemoteCatalogFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    timeout: Duration,
}

impl RemoteCatalogFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach a bearer token sent on every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn classify(err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::MalformedResponse
        } else {
            FetchError::NetworkUnavailable
        }
    }
}

#[async_trait]
impl CatalogFetcher for RemoteCatalogFetcher {
    async fn fetch_page(
        &self,
        query: &CatalogQuery,
        offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError> {
        debug_assert!(page_size > 0, "page_size must be positive");

        let url = format!("{}/search", self.base_url);
        let terms = query.search_terms();

        tracing::debug!(
            category = %query.category,
            terms = %terms,
            offset,
            page_size,
            "Fetching catalog page"
        );

        let count = page_size.to_string();
        let offset_param = offset.to_string();
        let mut request = self.client.get(&url).query(&[
            ("type", "models"),
            ("q", terms.as_str()),
            ("downloadable", "true"),
            ("sort_by", "-likeCount"),
            ("count", count.as_str()),
            ("offset", offset_param.as_str()),
        ]);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), offset, "Catalog search failed");
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let body: SearchResponse = response.json().await.map_err(|err| {
            tracing::warn!(error = %err, "Catalog response could not be decoded");
            FetchError::MalformedResponse
        })?;

        let items: Vec<_> = body
            .results
            .into_iter()
            .map(|model| model.into_summary())
            .collect();

        // A short page means the server ran out of results.
        let end_of_data = items.len() < page_size;

        tracing::debug!(
            returned = items.len(),
            end_of_data,
            "Catalog page fetched"
        );

        Ok(Page {
            next_offset: offset + items.len(),
            items,
            end_of_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_body(count: usize) -> String {
        let results: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"uid": "id-{i}", "name": "Item {i}"}}"#))
            .collect();
        format!(r#"{{"results": [{}]}}"#, results.join(","))
    }

    #[tokio::test]
    async fn test_fetch_sends_expected_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "models"))
            .and(query_param("q", "sofa couch leather"))
            .and(query_param("downloadable", "true"))
            .and(query_param("sort_by", "-likeCount"))
            .and(query_param("count", "20"))
            .and(query_param("offset", "40"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_body(20)))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri());
        let query = CatalogQuery::new(Category::Sofa, "leather");

        let page = fetcher.fetch_page(&query, 40, 20).await.unwrap();
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.next_offset, 60);
        assert!(!page.end_of_data);
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_body(1)))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri())
            .with_token(SecretString::from("test-token"));

        fetcher
            .fetch_page(&CatalogQuery::default(), 0, 20)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_short_page_marks_end_of_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_body(5)))
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri());
        let page = fetcher
            .fetch_page(&CatalogQuery::default(), 20, 20)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 5);
        assert_eq!(page.next_offset, 25);
        assert!(page.end_of_data);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri());
        let err = fetcher
            .fetch_page(&CatalogQuery::default(), 0, 20)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::ServerError(503));
    }

    #[tokio::test]
    async fn test_invalid_body_maps_to_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri());
        let err = fetcher
            .fetch_page(&CatalogQuery::default(), 0, 20)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::MalformedResponse);
    }

    #[tokio::test]
    async fn test_slow_server_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_body(1))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), server.uri())
            .with_timeout(Duration::from_millis(50));
        let err = fetcher
            .fetch_page(&CatalogQuery::default(), 0, 20)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_network_unavailable() {
        // Bind to an ephemeral port, then drop the listener so nothing answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher =
            RemoteCatalogFetcher::new(reqwest::Client::new(), format!("http://{}", addr));
        let err = fetcher
            .fetch_page(&CatalogQuery::default(), 0, 20)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NetworkUnavailable);
    }
}
