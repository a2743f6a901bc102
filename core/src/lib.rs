//! Data model, queries and text rendering for the Berlin administrative
//! services export (`service.berlin.de/export/dienstleistungen/json/`).

pub mod catalog;
pub mod query;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Service, ServiceCatalog};
