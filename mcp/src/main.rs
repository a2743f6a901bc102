use clap::Parser;
use reqwest::Url;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use berlin_services_mcp_runtime::{BERLIN_SERVICES_URL, McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "berlin-services-mcp",
    version,
    about = "Berlin services MCP server over stdio"
)]
struct Cli {
    /// Export URL of the service catalog
    #[arg(long, env = "BERLIN_SERVICES_URL", default_value = BERLIN_SERVICES_URL)]
    source_url: Url,

    #[command(subcommand)]
    command: Option<McpCommands>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let code = run_mcp(cli.source_url, cli.command.unwrap_or_default()).await;
    std::process::exit(code);
}
