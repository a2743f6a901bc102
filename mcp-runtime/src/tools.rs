use berlin_services_core::query::{self, DEFAULT_LIST_LIMIT};
use berlin_services_core::render;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::source::{CatalogSource, CatalogTransport, FetchError};

pub const SEARCH_SERVICES: &str = "search_services";
pub const GET_SERVICE_DETAILS: &str = "get_service_details";
pub const LIST_SERVICES: &str = "list_services";
pub const GET_SERVICES_STATS: &str = "get_services_stats";

/// Failure of a single tool call. `Display` is the text handed back to the caller.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Error: {0} parameter is required")]
    MissingParameter(&'static str),
    #[error("Error: '{field}' must be {expected}")]
    InvalidParameter {
        field: &'static str,
        expected: &'static str,
    },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Error: {0}")]
    Fetch(#[from] FetchError),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::MissingParameter(_) | ToolError::InvalidParameter { .. } => {
                "validation_failed"
            }
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Fetch(_) => "fetch_failed",
        }
    }
}

/// Result envelope of `tools/call`: always a single text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub text: String,
    pub is_error: bool,
}

impl ToolReply {
    fn text(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn error(err: &ToolError) -> Self {
        Self {
            text: err.to_string(),
            is_error: true,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error
        })
    }
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_SERVICES,
            description: "Search for Berlin administrative services by name or description. Returns a list of matching services with basic information.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query (searches in service name and description)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: GET_SERVICE_DETAILS,
            description: "Get detailed information about a specific Berlin service by its ID. Returns comprehensive information including requirements, forms, fees, appointments, and more.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "service_id": {
                        "type": "string",
                        "description": "The ID of the service"
                    }
                },
                "required": ["service_id"]
            }),
        },
        ToolDefinition {
            name: LIST_SERVICES,
            description: "List all available Berlin administrative services. Returns a paginated list of services with their names and IDs.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of services to return (default: 50, max: 200)",
                        "default": DEFAULT_LIST_LIMIT
                    }
                }
            }),
        },
        ToolDefinition {
            name: GET_SERVICES_STATS,
            description: "Get statistics about the Berlin services dataset (total count, last update, etc.)",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Dispatches tool calls against the cached catalog.
pub struct ToolRouter<T> {
    source: CatalogSource<T>,
}

impl<T: CatalogTransport> ToolRouter<T> {
    pub fn new(source: CatalogSource<T>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &CatalogSource<T> {
        &self.source
    }

    /// Runs one tool call. Every failure is folded into the reply text.
    pub async fn call(&self, name: &str, args: &Map<String, Value>) -> ToolReply {
        match self.execute(name, args).await {
            Ok(text) => ToolReply::text(text),
            Err(err) => {
                tracing::warn!(
                    tool = name,
                    error = err.code(),
                    detail = %err,
                    "tool call failed"
                );
                ToolReply::error(&err)
            }
        }
    }

    async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<String, ToolError> {
        // Load the catalog before looking at arguments: an unreachable
        // upstream reports the same way for every tool.
        let catalog = self.source.catalog().await?;

        match name {
            SEARCH_SERVICES => {
                let query = required_string(args, "query")?;
                let results = query::search(&catalog, &query);
                Ok(render::format_search_summary(&query, &results))
            }
            GET_SERVICE_DETAILS => {
                let service_id = required_identifier(args, "service_id")?;
                Ok(match query::get_by_id(&catalog, &service_id) {
                    Some(service) => render::format_service_details(service),
                    None => format!("Service with ID '{service_id}' not found"),
                })
            }
            LIST_SERVICES => {
                let limit = arg_optional_limit(args, "limit")?.unwrap_or(DEFAULT_LIST_LIMIT);
                let entries = query::list(&catalog, limit);
                Ok(render::format_listing(
                    &entries,
                    catalog.datacount.unwrap_or(0),
                ))
            }
            GET_SERVICES_STATS => Ok(render::format_stats(&catalog)),
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }
}

fn required_string(args: &Map<String, Value>, key: &'static str) -> Result<String, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ToolError::MissingParameter(key)),
        Some(Value::String(v)) if v.is_empty() => Err(ToolError::MissingParameter(key)),
        Some(Value::String(v)) => Ok(v.clone()),
        Some(_) => Err(ToolError::InvalidParameter {
            field: key,
            expected: "a string",
        }),
    }
}

/// Like [`required_string`] but also takes a bare JSON integer, since the
/// export itself mixes numeric and string identifiers.
fn required_identifier(
    args: &Map<String, Value>,
    key: &'static str,
) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(Value::Number(_)) => Err(ToolError::InvalidParameter {
            field: key,
            expected: "a string",
        }),
        _ => required_string(args, key),
    }
}

fn arg_optional_limit(
    args: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        // Fractional limits truncate; out-of-range values saturate and are clamped later.
        Some(Value::Number(n)) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))),
        Some(_) => Err(ToolError::InvalidParameter {
            field: key,
            expected: "a number",
        }),
    }
}
