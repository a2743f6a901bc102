//! Plain-text rendering of catalog data for tool responses.
//!
//! Output is markdown-flavoured text. Absent scalar fields render as `N/A`,
//! absent list sections are left out entirely.

use std::fmt::Write;

use crate::catalog::{Reference, Service, ServiceCatalog};
use crate::query::{ListingEntry, SearchResult};

const NOT_AVAILABLE: &str = "N/A";
/// Prerequisite name the export uses to say "there are none".
const NO_PREREQUISITES: &str = "keine";
const MAX_AUTHORITIES_SHOWN: usize = 5;

pub fn format_search_summary(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No services found matching '{query}'");
    }

    let mut output = format!(
        "Found {} service(s) matching '{query}':\n\n",
        results.len()
    );
    for result in results {
        let _ = write!(
            output,
            "**{}**\nID: {}\nURL: {}\nFees: {}\nDescription: {}\n\n",
            result.name, result.id, result.url, result.fees, result.description
        );
    }
    output
}

pub fn format_service_details(service: &Service) -> String {
    let id = if service.id.is_empty() {
        NOT_AVAILABLE
    } else {
        service.id.as_str()
    };
    let mut lines = vec![
        format!("# {}", or_na(service.name.as_deref())),
        format!("\n**ID:** {id}"),
        format!("**URL:** {}", or_na(service.url())),
        "\n## Description".to_string(),
        or_na(service.description.as_deref()).to_string(),
        "\n## Fees".to_string(),
        or_na(service.fees.as_deref()).to_string(),
        "\n## Process Time".to_string(),
        or_na(service.process_time.as_deref()).to_string(),
    ];

    if !service.requirements.is_empty() {
        lines.push("\n## Requirements".to_string());
        for requirement in &service.requirements {
            lines.push(format!("\n### {}", or_na(requirement.name.as_deref())));
            lines.push(requirement.description.clone().unwrap_or_default());
        }
    }

    if !service.prerequisites.is_empty() && !only_no_prerequisites(&service.prerequisites) {
        lines.push("\n## Prerequisites".to_string());
        for prerequisite in &service.prerequisites {
            lines.push(format!("- {}", or_na(prerequisite.name.as_deref())));
        }
    }

    if !service.forms.is_empty() {
        lines.push("\n## Forms".to_string());
        lines.extend(service.forms.iter().map(linked_bullet));
    }

    if let Some(link) = service.online_processing_link() {
        lines.push("\n## Online Processing".to_string());
        lines.push(format!("[Process online]({link})"));
    }

    if let Some(link) = service.appointment_link() {
        lines.push("\n## Appointment".to_string());
        lines.push(format!("[Book appointment]({link})"));
    }

    if !service.authorities.is_empty() {
        lines.push("\n## Responsible Authorities".to_string());
        for authority in service.authorities.iter().take(MAX_AUTHORITIES_SHOWN) {
            lines.push(format!("- {}", or_na(authority.name.as_deref())));
        }
        if service.authorities.len() > MAX_AUTHORITIES_SHOWN {
            lines.push(format!(
                "- ... and {} more",
                service.authorities.len() - MAX_AUTHORITIES_SHOWN
            ));
        }
    }

    if !service.legal.is_empty() {
        lines.push("\n## Legal Basis".to_string());
        lines.extend(service.legal.iter().map(linked_bullet));
    }

    lines.join("\n")
}

pub fn format_listing(entries: &[ListingEntry], total: u64) -> String {
    let mut output = format!(
        "Berlin Administrative Services (showing {} of {total} total):\n\n",
        entries.len()
    );
    for entry in entries {
        let _ = write!(
            output,
            "- **{}** (ID: {})\n  {}\n",
            entry.name, entry.id, entry.url
        );
    }
    output
}

pub fn format_stats(catalog: &ServiceCatalog) -> String {
    let count = catalog
        .datacount
        .map(|count| count.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    format!(
        "# Berlin Services Statistics\n\n\
         **Total Services:** {count}\n\
         **Last Updated:** {}\n\
         **Locale:** {}\n\
         **Data Hash:** {}\n\
         **Error Status:** {}\n\n\
         The dataset contains information about {} administrative services provided by Berlin authorities.\n",
        or_na(catalog.created.as_deref()),
        or_na(catalog.locale.as_deref()),
        or_na(catalog.hash.as_deref()),
        catalog.error.unwrap_or(false),
        catalog.datacount.unwrap_or(0),
    )
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}

fn only_no_prerequisites(prerequisites: &[Reference]) -> bool {
    matches!(prerequisites, [only] if only.name.as_deref() == Some(NO_PREREQUISITES))
}

fn linked_bullet(reference: &Reference) -> String {
    let name = or_na(reference.name.as_deref());
    match reference.link() {
        Some(link) => format!("- [{name}]({link})"),
        None => format!("- {name}"),
    }
}
