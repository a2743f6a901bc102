use crate::catalog::ServiceCatalog;

const FIXTURE: &str = include_str!("../../fixtures/catalog.json");

pub fn fixture_catalog() -> ServiceCatalog {
    ServiceCatalog::from_slice(FIXTURE.as_bytes()).expect("fixture catalog should parse")
}
