// Binario principal para ejecutar el servidor realtime de Atrio CRM
// Compile: cargo build --bin atrio-server
// Run: cargo run --bin atrio-server

use atrio_server_application::escalation::{EscalationScheduler, EscalationSchedulerConfig};
use atrio_server_application::notifications::NotificationDispatcher;
use atrio_server_domain::escalation::EscalationPolicy;
use atrio_server_domain::shared_kernel::OrgId;
use atrio_server_infrastructure::ledger::NotificationLedger;
use atrio_server_infrastructure::persistence::{
    InMemoryDirectory, InMemoryOrganizations, InMemoryTicketStore,
};
use atrio_server_infrastructure::realtime::metrics::RealtimeMetrics;
use atrio_server_infrastructure::realtime::rate_limit::IngressRateLimiter;
use atrio_server_infrastructure::realtime::registry::ConnectionRegistry;
use atrio_server_infrastructure::realtime::router::BroadcastRouter;
use atrio_server_interface::websocket::{
    IdentityVerifier, JwtConfig, WebSocketState, handle_websocket,
};
use atrio_shared::config::{AtrioConfig, ConfigLoader};
use axum::routing::get;
use clap::Parser;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{error, info, warn};

/// CLI arguments for atrio-server
#[derive(clap::Parser, Debug)]
#[command(name = "atrio-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Atrio CRM Realtime Server", long_about = None)]
struct Args {
    /// Optional path to a .env file
    #[arg(long)]
    env_file: Option<std::path::PathBuf>,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = ConfigLoader::new(args.env_file.clone());
    let config = loader.load()?;

    setup_logging(&config, args.debug);
    info!("🚀 Starting Atrio CRM Realtime Server");

    // Metrics
    let metrics = Arc::new(RealtimeMetrics::new());
    let mut prom_registry = prometheus::Registry::new();
    metrics.register(&mut prom_registry);

    // Realtime core, constructed once and injected everywhere
    let rate_limiter = Arc::new(IngressRateLimiter::new(config.ingress.events_per_minute));
    let registry = Arc::new(ConnectionRegistry::new(rate_limiter.clone(), metrics.clone()));
    let router = Arc::new(BroadcastRouter::new(registry.clone(), metrics.clone()));
    let ledger = Arc::new(NotificationLedger::new(config.ledger.retention_days));
    let policy = Arc::new(EscalationPolicy::default());

    // Persistence collaborator. The hosted row store lives behind these
    // ports; the in-memory adapters back dev mode.
    let directory = Arc::new(InMemoryDirectory::new());
    let ticket_store = Arc::new(InMemoryTicketStore::new());
    let organizations = Arc::new(InMemoryOrganizations::new());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        router.clone(),
        directory.clone(),
        ledger.clone(),
        policy.clone(),
        metrics.clone(),
    ));

    let scheduler = Arc::new(EscalationScheduler::new(
        ticket_store,
        dispatcher,
        policy,
        ledger,
        metrics.clone(),
        Some(EscalationSchedulerConfig {
            tick_interval: Duration::from_secs(config.escalation.tick_interval_secs),
        }),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    scheduler.clone().start(shutdown_tx.subscribe());

    let verifier = Arc::new(IdentityVerifier::new(
        JwtConfig::new(
            config.auth.jwt_secret.clone(),
            config.auth.jwt_issuer.clone(),
        ),
        directory,
    ));
    let state = WebSocketState::new(
        registry,
        router,
        rate_limiter,
        verifier,
        organizations,
        metrics,
    );

    tokio::spawn(serve_websocket(config.server.bind_address, state));
    tokio::spawn(serve_metrics(
        config.server.metrics_bind_address,
        prom_registry,
    ));

    keep_running().await;
    let _ = shutdown_tx.send(());
    Ok(())
}

/// Setup logging based on config and the debug flag.
fn setup_logging(config: &AtrioConfig, debug: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = if debug { "debug" } else { &config.logging.level };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Accept websocket upgrades and hand each connection to the handler.
async fn serve_websocket(addr: SocketAddr, state: WebSocketState) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "Failed to bind websocket listener");
            return;
        }
    };
    info!(%addr, "WebSocket listener ready");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let mut headers = hyper::HeaderMap::new();
            let mut claimed_org: Option<OrgId> = None;

            let callback = |req: &Request, resp: Response| {
                headers = req.headers().clone();
                let query = req.uri().query().unwrap_or("");

                // Browser clients cannot set headers on the upgrade request;
                // accept the token as a query parameter fallback
                if !headers.contains_key(hyper::header::AUTHORIZATION) {
                    if let Some(token) = token_from_query(query) {
                        if let Ok(value) = format!("Bearer {}", token).parse() {
                            headers.insert(hyper::header::AUTHORIZATION, value);
                        }
                    }
                }

                match org_from_query(query) {
                    Some(org) => {
                        claimed_org = Some(org);
                        Ok(resp)
                    }
                    None => Err(http_bad_request("missing or invalid org parameter")),
                }
            };

            match accept_hdr_async(stream, callback).await {
                Ok(ws) => {
                    // The callback guarantees the org is present on success
                    if let Some(org) = claimed_org {
                        handle_websocket(ws, state, headers, org).await;
                    }
                }
                Err(e) => {
                    warn!(%peer, error = %e, "WebSocket handshake rejected");
                }
            }
        });
    }
}

/// Parse `org=<uuid>` out of the upgrade request's query string.
fn org_from_query(query: &str) -> Option<OrgId> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("org="))
        .and_then(|raw| OrgId::from_str(raw).ok())
}

fn token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
}

fn http_bad_request(body: &str) -> ErrorResponse {
    Response::builder()
        .status(400)
        .body(Some(body.to_string()))
        .expect("static response")
}

/// Serve the operational surface: health probe and Prometheus metrics.
async fn serve_metrics(addr: SocketAddr, registry: prometheus::Registry) {
    let app = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    prometheus::TextEncoder::new()
                        .encode_to_string(&registry.gather())
                        .unwrap_or_default()
                }
            }),
        );

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "Failed to bind metrics listener");
            return;
        }
    };
    info!(%addr, "Metrics listener ready");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Metrics server stopped");
    }
}

/// Keep the application running until interrupted.
async fn keep_running() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to setup signal handler: {}", e);
    }

    info!("Shutting down gracefully...");
}
