use std::sync::atomic::{AtomicUsize, Ordering};

use berlin_services_core::ServiceCatalog;

use crate::source::{CatalogTransport, FetchError};

const FIXTURE: &str = include_str!("../../fixtures/catalog.json");

pub fn fixture_json() -> &'static str {
    FIXTURE
}

pub fn fixture_catalog() -> ServiceCatalog {
    ServiceCatalog::from_slice(FIXTURE.as_bytes()).expect("fixture catalog should parse")
}

/// In-process transport that counts fetches and can fail on demand.
pub struct SpyTransport {
    catalog: ServiceCatalog,
    calls: AtomicUsize,
    failures: usize,
    yield_before_reply: bool,
}

impl SpyTransport {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self::failing_first(catalog, 0)
    }

    /// Fails the first `failures` fetches with an HTTP 503.
    pub fn failing_first(catalog: ServiceCatalog, failures: usize) -> Self {
        Self {
            catalog,
            calls: AtomicUsize::new(0),
            failures,
            yield_before_reply: false,
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(ServiceCatalog::default(), usize::MAX)
    }

    /// Suspend once inside every fetch so concurrent callers interleave.
    pub fn yielding(mut self) -> Self {
        self.yield_before_reply = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogTransport for SpyTransport {
    async fn fetch_catalog(&self) -> Result<ServiceCatalog, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.yield_before_reply {
            tokio::task::yield_now().await;
        }
        if call < self.failures {
            return Err(FetchError::Status {
                url: "http://upstream.test/json/".to_string(),
                status: 503,
            });
        }
        Ok(self.catalog.clone())
    }
}
