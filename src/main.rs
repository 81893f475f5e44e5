//! Gateway entry point (§6: "CLI surface"): `--config <path>`, `--port <n>`,
//! `--version`. Exit code 0 on graceful shutdown, 1 on initialization
//! failure.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use gw_mcp::{Connector, ConnectorStore, StaticConnectorStore};
use gw_storage::{EmptyVectorSearch, InMemoryConversationStorage, InMemoryResponseStorage};
use tracing::{error, info};

use resp_gateway::backend::{BackendClient, ChatCompletionsAdapter, ResponsesBackendClient};
use resp_gateway::config::{BackendKind, GatewayConfig};
use resp_gateway::engine::Engine;
use resp_gateway::observability::{logging, metrics};
use resp_gateway::routers;

#[derive(Parser)]
#[command(name = "resp-gateway", version, about = "Responses API gateway")]
struct Args {
    /// Path to the gateway's YAML config file.
    #[arg(long, default_value = "gateway.yaml")]
    config: String,

    /// Overrides the config file's `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("resp-gateway: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = GatewayConfig::from_file(&args.config).await?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _logging_guard = logging::init(&config.logging);
    metrics::init_metrics();

    let http = reqwest::Client::new();

    let backend: Arc<dyn BackendClient> = match config.backend.kind {
        BackendKind::Responses => Arc::new(ResponsesBackendClient::new(
            http.clone(),
            config.backend.base_url.clone(),
            config.backend.api_key.clone(),
        )),
        BackendKind::Chat => Arc::new(ChatCompletionsAdapter::new(
            http.clone(),
            config.backend.base_url.clone(),
            config.backend.api_key.clone(),
        )),
    };

    let mut connector_store = StaticConnectorStore::new();
    for connector in &config.connectors {
        connector_store = connector_store.with_connector(Connector {
            connector_id: connector.connector_id.clone(),
            url: connector.url.clone(),
            server_label: connector.server_label.clone(),
        });
    }

    let engine = Engine {
        backend,
        connectors: Arc::new(connector_store) as Arc<dyn ConnectorStore>,
        conversations: Arc::new(InMemoryConversationStorage::new()),
        responses: Arc::new(InMemoryResponseStorage::new()),
        vector_search: Arc::new(EmptyVectorSearch),
        http,
    };

    let app = routers::build(engine);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "resp-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("resp-gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}
