mod client_factory;
mod config;
mod context;
mod error;
mod http;
mod identity;
mod logging;
mod mcp;
mod models;
mod shutdown;
mod stdio;
#[cfg(test)]
mod test_support;
mod tools;
mod zendesk;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_factory::ZendeskClientFactory;
use config::{ServerSettings, ServiceConfig};
use identity::IdentityResolver;
use models::ArticleSearchParams;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "mcp-server-zendesk", version, about = "Zendesk Help Center MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over stdin/stdout (default).
    Stdio,
    /// Serve MCP over HTTP at POST /mcp.
    Http {
        /// Overrides MCP_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Serve POST /mcp from an AWS Lambda function URL.
    #[cfg(feature = "lambda")]
    Lambda,
    /// Run one article search with the service identity and print the result.
    CheckApi {
        #[arg(long, default_value = "アカウント")]
        query: String,
        #[arg(long, default_value_t = 3)]
        per_page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = ServerSettings::from_env();
    logging::init(&settings);

    let config = match ServiceConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!(error = %err, "Failed to load Zendesk configuration");
            return Err(err.into());
        }
    };

    let resolver = IdentityResolver::new(Arc::clone(&config));
    let factory = Arc::new(ZendeskClientFactory::new(Arc::clone(&config)));

    match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => {
            let server = mcp::McpServer::new(resolver, factory);
            stdio::boot_stdio_server(server).await
        }
        Command::Http { port } => {
            let settings = match port {
                Some(port) => settings.with_port(port),
                None => settings,
            };
            let state = http::AppState { resolver, factory };
            http::boot_http_server(state, settings.bind_addr).await
        }
        #[cfg(feature = "lambda")]
        Command::Lambda => {
            let state = http::AppState { resolver, factory };
            http::run_lambda(state).await
        }
        Command::CheckApi { query, per_page } => check_api(&factory, query, per_page).await,
    }
}

async fn check_api(factory: &ZendeskClientFactory, query: String, per_page: u32) -> Result<()> {
    let client = factory.create_client_from_config()?;
    let params = ArticleSearchParams {
        query,
        locale: tools::DEFAULT_SEARCH_LOCALE.to_string(),
        per_page,
        page: 1,
    };

    info!(query = %params.query, "Checking Zendesk API connectivity");
    let articles = client.search_articles(&params).await?;

    println!("Found {} article(s)", articles.len());
    for article in &articles {
        println!(
            "- [{}] {}",
            article.id.map(|id| id.to_string()).unwrap_or_default(),
            article.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}
