//! SDS Orchestrator
//!
//! One binary, three roles:
//!
//! - `controller`: REST front door; forwards work to docks over HTTP
//! - `dock`: discovers local docks and pools, then serves dock requests
//! - `standalone`: both in one process, with the dock reached in-process

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sds_orchestrator::{
    metrics, ApiServer, ApiServerConfig, CliOverrides, Config, Controller, Discovery,
    DockOrchestrator, DockServer, DriverRegistry, FileInventory, HttpDockClient,
    LocalDockService, Reconciler, ResourceRepository, StoreBackend,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// SDS Orchestrator - policy-driven block storage control plane
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// YAML configuration file
    #[arg(long, short, env = "SDS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// State store backend
    #[arg(long, env = "SDS_STORE_BACKEND", value_enum, global = true)]
    store_backend: Option<StoreBackend>,

    /// etcd gateway endpoints, comma separated
    #[arg(
        long = "store-endpoint",
        env = "SDS_STORE_ENDPOINTS",
        value_delimiter = ',',
        global = true
    )]
    store_endpoints: Vec<String>,

    /// Metrics server bind address; empty disables it
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controller and its REST API
    Controller {
        /// REST API bind address
        #[arg(long, env = "SDS_CONTROLLER_ADDR")]
        listen: Option<String>,
    },
    /// Run a dock
    Dock {
        /// Dock endpoint bind address
        #[arg(long, env = "SDS_DOCK_ADDR")]
        listen: Option<String>,

        /// Inventory file listing local docks and pools
        #[arg(long, env = "SDS_INVENTORY")]
        inventory: Option<PathBuf>,
    },
    /// Run controller and dock in one process
    Standalone {
        /// REST API bind address
        #[arg(long, env = "SDS_CONTROLLER_ADDR")]
        listen: Option<String>,

        /// Inventory file listing local docks and pools
        #[arg(long, env = "SDS_INVENTORY")]
        inventory: Option<PathBuf>,
    },
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            store_backend: self.store_backend,
            store_endpoints: self.store_endpoints.clone(),
            metrics_addr: self.metrics_addr.clone(),
            ..Default::default()
        };
        match &self.command {
            Command::Controller { listen } => {
                overrides.controller_addr = listen.clone();
            }
            Command::Dock { listen, inventory } => {
                overrides.dock_addr = listen.clone();
                overrides.inventory_path = inventory.clone();
            }
            Command::Standalone { listen, inventory } => {
                overrides.controller_addr = listen.clone();
                overrides.inventory_path = inventory.clone();
            }
        }
        overrides
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_cli_overrides(&args.overrides());

    info!("Starting SDS Orchestrator");
    info!("  Version: {}", sds_orchestrator::VERSION);
    info!("  Store backend: {:?}", config.store.backend);

    if config.metrics.enabled() {
        let addr = config.metrics.socket_addr()?;
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let repo = config.store.build_repository()?;

    let result = match args.command {
        Command::Controller { .. } => run_controller(&config, repo.clone()).await,
        Command::Dock { .. } => run_dock(&config, repo.clone()).await,
        Command::Standalone { .. } => run_standalone(&config, repo.clone()).await,
    };

    // The role's own failure takes precedence over a close failure
    let closed = repo.store().close().await;
    result?;
    closed?;

    info!("Shutdown complete");
    Ok(())
}

async fn run_controller(config: &Config, repo: Arc<ResourceRepository>) -> anyhow::Result<()> {
    let client = HttpDockClient::new(Duration::from_secs(
        config.controller.dock_call_timeout_secs,
    ))?;
    let controller = Controller::new(repo, Arc::new(client));
    serve_api(config, controller).await
}

async fn run_dock(config: &Config, repo: Arc<ResourceRepository>) -> anyhow::Result<()> {
    let orchestrator = start_dock(config, repo).await?;

    let server = Arc::new(DockServer::new(config.dock.socket_addr()?, orchestrator));
    shutdown_on_ctrl_c({
        let server = server.clone();
        move || server.shutdown()
    });
    server.run().await?;
    Ok(())
}

async fn run_standalone(config: &Config, repo: Arc<ResourceRepository>) -> anyhow::Result<()> {
    let orchestrator = start_dock(config, repo.clone()).await?;
    let controller = Controller::new(repo, Arc::new(LocalDockService::new(orchestrator)));
    serve_api(config, controller).await
}

/// Register the local inventory and build the orchestrator.
///
/// A discovery failure aborts start-up.
async fn start_dock(
    config: &Config,
    repo: Arc<ResourceRepository>,
) -> anyhow::Result<Arc<DockOrchestrator>> {
    let inventory = FileInventory::new(&config.dock.inventory_path);
    info!("Discovering local resources from {}", inventory.path().display());

    let report = Discovery::new(repo.clone(), Arc::new(inventory)).run().await?;
    info!(
        "Discovery complete: {} docks, {} pools",
        report.docks, report.pools
    );

    let drivers = DriverRegistry::with_defaults();
    info!("Drivers available: {}", drivers.names().join(", "));

    Ok(DockOrchestrator::new(
        repo,
        drivers,
        Reconciler::new(config.dock.reconcile.clone()),
    ))
}

async fn serve_api(config: &Config, controller: Arc<Controller>) -> anyhow::Result<()> {
    let api_config = ApiServerConfig {
        rest_addr: config.controller.socket_addr()?,
    };
    let server = Arc::new(ApiServer::new(api_config, controller));
    shutdown_on_ctrl_c({
        let server = server.clone();
        move || server.shutdown()
    });
    server.run().await?;
    Ok(())
}

fn shutdown_on_ctrl_c<F>(shutdown: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                shutdown();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "tower_http=info", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    fn reply(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
        let mut response = Response::new(body.into());
        *response.status_mut() = status;
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }

    // Registers the operation metrics before the first scrape
    metrics::global();

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/metrics" => match metrics::gather_text() {
                    Ok((content_type, buffer)) => reply(StatusCode::OK, &content_type, buffer),
                    Err(e) => reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        e.to_string(),
                    ),
                },
                "/healthz" => reply(StatusCode::OK, "text/plain", "ok"),
                _ => reply(StatusCode::NOT_FOUND, "text/plain", "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    info!("Metrics server listening on {}", addr);
    Server::try_bind(&addr)?.serve(make_svc).await?;

    Ok(())
}
