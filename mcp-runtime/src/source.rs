use std::future::Future;
use std::sync::{Arc, OnceLock};

use berlin_services_core::ServiceCatalog;
use reqwest::Url;
use thiserror::Error;

/// Upstream export of all Berlin administrative services.
pub const BERLIN_SERVICES_URL: &str = "https://service.berlin.de/export/dienstleistungen/json/";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to reach {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response is not a valid service catalog: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where the catalog document comes from.
pub trait CatalogTransport {
    fn fetch_catalog(&self) -> impl Future<Output = Result<ServiceCatalog, FetchError>> + Send;
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Plain `GET` against the export URL. No timeout and no retry.
pub struct HttpCatalogTransport {
    http: reqwest::Client,
    url: Url,
}

impl HttpCatalogTransport {
    pub fn new(url: Url) -> Self {
        Self {
            http: client(),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl CatalogTransport for HttpCatalogTransport {
    async fn fetch_catalog(&self) -> Result<ServiceCatalog, FetchError> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: self.url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Body {
            url: self.url.to_string(),
            source,
        })?;
        Ok(ServiceCatalog::from_slice(&bytes)?)
    }
}

/// Fetch-once holder for the catalog.
///
/// The first successful fetch is kept for the lifetime of the source; there is
/// no expiry and no refresh. A failed fetch stores nothing, so the next call
/// tries again. Overlapping first calls are not coalesced: each of them hits
/// the transport, the first one to finish wins the cell and the others return
/// that stored value.
pub struct CatalogSource<T> {
    transport: T,
    cache: OnceLock<Arc<ServiceCatalog>>,
}

impl<T: CatalogTransport> CatalogSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: OnceLock::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cached(&self) -> Option<Arc<ServiceCatalog>> {
        self.cache.get().cloned()
    }

    pub async fn catalog(&self) -> Result<Arc<ServiceCatalog>, FetchError> {
        if let Some(catalog) = self.cache.get() {
            return Ok(Arc::clone(catalog));
        }

        tracing::debug!("service catalog not cached, fetching");
        let fetched = self
            .transport
            .fetch_catalog()
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "service catalog fetch failed"))?;
        let services = fetched.services().len();
        let stored = self.cache.get_or_init(|| Arc::new(fetched));
        tracing::info!(services, "service catalog cached");
        Ok(Arc::clone(stored))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::test_support::{SpyTransport, fixture_catalog, fixture_json};

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let source = CatalogSource::new(SpyTransport::new(fixture_catalog()));

        let first = source.catalog().await.unwrap();
        let second = source.catalog().await.unwrap();
        let third = source.catalog().await.unwrap();

        assert_eq!(source.transport().calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_on_next_call() {
        let source = CatalogSource::new(SpyTransport::failing_first(fixture_catalog(), 2));

        assert!(source.catalog().await.is_err());
        assert!(source.cached().is_none());
        assert!(source.catalog().await.is_err());

        let catalog = source.catalog().await.unwrap();
        assert_eq!(catalog.services().len(), 4);
        assert_eq!(source.transport().calls(), 3);

        source.catalog().await.unwrap();
        assert_eq!(source.transport().calls(), 3);
    }

    #[tokio::test]
    async fn overlapping_first_fetches_are_not_coalesced() {
        let source = CatalogSource::new(SpyTransport::new(fixture_catalog()).yielding());

        let (a, b) = tokio::join!(source.catalog(), source.catalog());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(source.transport().calls(), 2);
        assert!(Arc::ptr_eq(&a, &b));
        source.catalog().await.unwrap();
        assert_eq!(source.transport().calls(), 2);
    }

    #[tokio::test]
    async fn http_transport_parses_catalog() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/export/dienstleistungen/json/");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(fixture_json());
            })
            .await;

        let url = Url::parse(&server.url("/export/dienstleistungen/json/")).unwrap();
        let source = CatalogSource::new(HttpCatalogTransport::new(url));

        let catalog = source.catalog().await.unwrap();
        assert_eq!(catalog.datacount, Some(4));
        assert_eq!(catalog.services()[0].id, "120686");
        source.catalog().await.unwrap();

        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn http_transport_reports_non_success_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json/");
                then.status(503).body("maintenance");
            })
            .await;

        let url = Url::parse(&server.url("/json/")).unwrap();
        let err = HttpCatalogTransport::new(url)
            .fetch_catalog()
            .await
            .expect_err("503 should fail");

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn http_transport_reports_malformed_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json/");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let url = Url::parse(&server.url("/json/")).unwrap();
        let err = HttpCatalogTransport::new(url)
            .fetch_catalog()
            .await
            .expect_err("html should not parse");

        assert!(matches!(err, FetchError::Decode(_)));
    }
}
