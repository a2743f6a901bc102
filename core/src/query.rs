use serde::Serialize;

use crate::catalog::{Service, ServiceCatalog};

/// Search previews keep at most this many characters of the description.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 200;
pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Search hit projected from a [`Service`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    /// Description cut to [`DESCRIPTION_PREVIEW_CHARS`], `...` appended when cut
    pub description: String,
    /// Empty when the service carries no canonical URL
    pub url: String,
    /// Empty when the service carries no fee description
    pub fees: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Case-insensitive substring match on name and description, in catalog order.
///
/// An empty query matches every service.
pub fn search(catalog: &ServiceCatalog, query: &str) -> Vec<SearchResult> {
    let needle = query.to_lowercase();
    catalog
        .services()
        .iter()
        .filter(|service| {
            let name = service.name.as_deref().unwrap_or_default().to_lowercase();
            let description = service
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            name.contains(&needle) || description.contains(&needle)
        })
        .map(search_result)
        .collect()
}

/// First service whose identifier equals `id` exactly.
pub fn get_by_id<'a>(catalog: &'a ServiceCatalog, id: &str) -> Option<&'a Service> {
    catalog.services().iter().find(|service| service.id == id)
}

/// First `limit` services in catalog order, after clamping to `0..=MAX_LIST_LIMIT`.
pub fn list(catalog: &ServiceCatalog, limit: i64) -> Vec<ListingEntry> {
    catalog
        .services()
        .iter()
        .take(clamp_limit(limit))
        .map(|service| ListingEntry {
            id: service.id.clone(),
            name: service.name.clone().unwrap_or_default(),
            url: service.url().unwrap_or_default().to_string(),
        })
        .collect()
}

pub fn clamp_limit(limit: i64) -> usize {
    // Bounded by MAX_LIST_LIMIT, so the cast cannot truncate.
    limit.clamp(0, MAX_LIST_LIMIT) as usize
}

fn search_result(service: &Service) -> SearchResult {
    SearchResult {
        id: service.id.clone(),
        name: service.name.clone().unwrap_or_default(),
        description: preview(service.description.as_deref().unwrap_or_default()),
        url: service.url().unwrap_or_default().to_string(),
        fees: service.fees.clone().unwrap_or_default(),
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceMeta;
    use crate::test_support::fixture_catalog;

    fn service(id: &str, name: &str, description: &str) -> Service {
        Service {
            id: id.to_string(),
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            ..Service::default()
        }
    }

    fn numbered_catalog(count: usize) -> ServiceCatalog {
        ServiceCatalog {
            datacount: Some(count as u64),
            data: (0..count)
                .map(|i| service(&i.to_string(), &format!("Service {i}"), ""))
                .collect(),
            ..ServiceCatalog::default()
        }
    }

    #[test]
    fn search_matches_name_case_insensitively() {
        let catalog = fixture_catalog();
        let results = search(&catalog, "anmeldung");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "120686");
        assert_eq!(results[0].name, "Anmeldung einer Wohnung");
        assert_eq!(
            results[0].url,
            "https://service.berlin.de/dienstleistung/120686/"
        );
    }

    #[test]
    fn search_matches_description_and_excludes_the_rest() {
        let catalog = fixture_catalog();
        for query in ["WOHNSITZ", "pass", "Gewerbe", "Umzug", "xyz-no-hit"] {
            let needle = query.to_lowercase();
            let hits: Vec<String> = search(&catalog, query)
                .into_iter()
                .map(|hit| hit.id)
                .collect();
            for service in catalog.services() {
                let name = service.name.clone().unwrap_or_default().to_lowercase();
                let description = service
                    .description
                    .clone()
                    .unwrap_or_default()
                    .to_lowercase();
                let matches = name.contains(&needle) || description.contains(&needle);
                assert_eq!(
                    hits.contains(&service.id),
                    matches,
                    "query {query:?} vs service {}",
                    service.id
                );
            }
        }
    }

    #[test]
    fn empty_query_matches_every_service_in_order() {
        let catalog = fixture_catalog();
        let ids: Vec<String> = search(&catalog, "").into_iter().map(|r| r.id).collect();
        let expected: Vec<String> = catalog.services().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn search_preview_is_truncated_with_ellipsis() {
        let long = "ä".repeat(250);
        let catalog = ServiceCatalog {
            data: vec![
                service("1", "Lang", &long),
                service("2", "Kurz", "kurze Beschreibung"),
                service("3", "Genau", &"x".repeat(200)),
            ],
            ..ServiceCatalog::default()
        };

        let results = search(&catalog, "");
        assert_eq!(results[0].description.chars().count(), 203);
        assert!(results[0].description.ends_with("..."));
        assert_eq!(results[1].description, "kurze Beschreibung");
        assert_eq!(results[2].description.chars().count(), 200);
        assert!(
            results
                .iter()
                .all(|r| r.description.chars().count() <= DESCRIPTION_PREVIEW_CHARS + 3)
        );
    }

    #[test]
    fn search_result_defaults_missing_url_and_fees_to_empty() {
        let catalog = ServiceCatalog {
            data: vec![service("7", "Ohne Meta", "")],
            ..ServiceCatalog::default()
        };
        let results = search(&catalog, "meta");
        assert_eq!(results[0].url, "");
        assert_eq!(results[0].fees, "");
    }

    #[test]
    fn get_by_id_round_trips_every_present_id() {
        let catalog = fixture_catalog();
        for service in catalog.services() {
            let found = get_by_id(&catalog, &service.id).expect("present id");
            assert_eq!(found.id, service.id);
        }
        assert!(get_by_id(&catalog, "999999").is_none());
        assert!(get_by_id(&catalog, "").is_none());
    }

    #[test]
    fn get_by_id_first_match_wins() {
        let catalog = ServiceCatalog {
            data: vec![service("1", "first", ""), service("1", "second", "")],
            ..ServiceCatalog::default()
        };
        assert_eq!(
            get_by_id(&catalog, "1").and_then(|s| s.name.as_deref()),
            Some("first")
        );
    }

    #[test]
    fn list_returns_min_of_limit_cap_and_length_in_order() {
        let catalog = numbered_catalog(250);
        for (limit, expected) in [(0, 0), (1, 1), (50, 50), (200, 200), (201, 200), (9999, 200)] {
            let entries = list(&catalog, limit);
            assert_eq!(entries.len(), expected, "limit {limit}");
            for (i, entry) in entries.iter().enumerate() {
                assert_eq!(entry.id, i.to_string());
            }
        }

        let small = numbered_catalog(3);
        assert_eq!(list(&small, DEFAULT_LIST_LIMIT).len(), 3);
    }

    #[test]
    fn list_with_non_positive_limit_is_empty() {
        let catalog = numbered_catalog(10);
        assert!(list(&catalog, 0).is_empty());
        assert!(list(&catalog, -5).is_empty());
    }

    #[test]
    fn list_entries_carry_url_or_empty_string() {
        let mut with_url = service("1", "Mit URL", "");
        with_url.meta = Some(ServiceMeta {
            url: Some("https://service.berlin.de/dienstleistung/1/".to_string()),
            lastupdate: None,
        });
        let catalog = ServiceCatalog {
            data: vec![with_url, service("2", "Ohne URL", "")],
            ..ServiceCatalog::default()
        };
        let entries = list(&catalog, 10);
        assert_eq!(entries[0].url, "https://service.berlin.de/dienstleistung/1/");
        assert_eq!(entries[1].url, "");
    }
}
