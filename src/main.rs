use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use campus_gate::config::{self, CONFIG};
use campus_gate::router::{GateState, gate_router};
use campus_gate::service::upstream_actor;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        bind_addr = %cfg.basic.bind_addr,
        database_url = %cfg.basic.database_url,
        routes = cfg.routes.len(),
        loglevel = %cfg.basic.loglevel,
    );

    if cfg.auth.jwt_secret == config::DEFAULT_JWT_SECRET {
        warn!("running with the built-in development JWT secret; set GATE_AUTH__JWT_SECRET");
    }
    if cfg.routes.is_empty() {
        warn!("no routes configured; only the auth endpoints will be served");
    }

    let storage = campus_gate::db::connect(&cfg.basic.database_url).await?;
    let upstreams = upstream_actor::spawn(cfg.routes.clone(), &cfg.proxy).await?;

    let state = GateState::new(storage, upstreams, cfg)?;
    let app = gate_router(state);

    let listener = TcpListener::bind(&cfg.basic.bind_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}
