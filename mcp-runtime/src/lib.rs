use clap::Subcommand;
use reqwest::Url;
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncRead, AsyncWrite, BufReader};

pub mod framing;
pub mod source;
pub mod tools;

#[cfg(test)]
mod test_support;

use berlin_services_core::ServiceCatalog;
use framing::{read_frame, write_frame};
use source::{CatalogSource, CatalogTransport, HttpCatalogTransport};
use tools::{ToolRouter, tool_definitions};

pub use source::BERLIN_SERVICES_URL;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "berlin-services-mcp";

#[derive(Subcommand, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum McpCommands {
    /// Serve the Berlin services tools over stdio (default)
    #[default]
    Serve,
    /// Fetch the catalog once and print a short summary
    Check,
}

pub async fn run(source_url: Url, command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve => {
            let transport = HttpCatalogTransport::new(source_url.clone());
            let server = McpServer::new(CatalogSource::new(transport));
            emit_startup_status(&source_url);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    tracing::error!(error = %err, "stdio transport failed");
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err.to_string(),
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Check => {
            let transport = HttpCatalogTransport::new(source_url.clone());
            match transport.fetch_catalog().await {
                Ok(catalog) => {
                    println!("{}", to_pretty_json(&catalog_report(&source_url, &catalog)));
                    0
                }
                Err(err) => {
                    let payload = json!({
                        "error": "fetch_failed",
                        "message": err.to_string(),
                        "source_url": source_url.as_str(),
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
    }
}

fn emit_startup_status(source_url: &Url) {
    let payload = json!({
        "event": "mcp_server_started",
        "server": MCP_SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "source_url": source_url.as_str(),
    });
    eprintln!("{payload}");
}

fn catalog_report(source_url: &Url, catalog: &ServiceCatalog) -> Value {
    let mut report = json!({
        "status": "ready",
        "source_url": source_url.as_str(),
        "total_services": catalog.datacount,
        "loaded_services": catalog.services().len(),
        "created": catalog.created,
        "locale": catalog.locale,
    });
    if let Some(first) = catalog.services().first() {
        report["first_service"] = json!({
            "id": first.id,
            "name": first.name,
            "url": first.url(),
        });
    }
    report
}

/// MCP server answering JSON-RPC requests for the catalog tools.
pub struct McpServer<T> {
    router: ToolRouter<T>,
}

impl<T: CatalogTransport> McpServer<T> {
    pub fn new(source: CatalogSource<T>) -> Self {
        Self {
            router: ToolRouter::new(source),
        }
    }

    pub fn router(&self) -> &ToolRouter<T> {
        &self.router
    }

    pub async fn serve_stdio(&self) -> Result<(), std::io::Error> {
        self.serve(io::stdin(), io::stdout()).await
    }

    /// Reads messages until EOF, answering each in the framing it arrived in.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), std::io::Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);

        while let Some(frame) = read_frame(&mut reader).await? {
            let response = match frame.body {
                Ok(incoming) => self.handle_incoming_message(incoming).await,
                Err(err) => {
                    tracing::warn!(error = %err, "unparseable MCP message");
                    Some(error_response(
                        Value::Null,
                        RpcError::parse_error(format!("Invalid JSON payload: {err}")),
                    ))
                }
            };
            if let Some(response) = response {
                write_frame(&mut writer, &response, frame.framing).await?;
            }
        }

        tracing::debug!("stdin closed, shutting down");
        Ok(())
    }

    /// Handles a single request or a batch. `None` when nothing needs answering.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Value::Array(batch) = incoming else {
            return self.handle_single_message(incoming).await;
        };

        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }
        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_single_message(item).await {
                responses.push(response);
            }
        }
        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; this server never sends requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "notification received");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        tracing::debug!(tool = name, "tool call");
        Ok(self.router.call(name, &args).await.to_value())
    }
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "resources": {
                "listChanged": false
            },
            "prompts": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Use search_services to find Berlin administrative services by keyword (German terms work best, e.g. 'Anmeldung', 'Reisepass'), then get_service_details with a returned ID for requirements, fees, forms and appointment links. list_services pages through the catalog (at most 200 entries); get_services_stats reports dataset metadata."
    })
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
