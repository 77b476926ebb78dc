//! Keygate API server binary.
//!
//! Loads configuration from the environment (and `.env`), connects to
//! PostgreSQL or an in-memory store, loads the API-key signing key and serves
//! the HTTP API until interrupted.

use std::sync::Arc;

use clap::Parser;
use keygate_api::AppState;
use keygate_api::config::ApiConfig;
use keygate_core::auth::keys::KeyManager;
use keygate_core::store::AuthStore;
use keygate_core::store::memory::InMemoryStore;
use keygate_core::store::postgres::PgStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "keygate_api_server", about = "Keygate API server", version)]
struct Args {
    /// Port to listen on, overriding the port in `BIND_ADDR` (0 = ephemeral).
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/keygate"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep all state in memory instead of PostgreSQL. Data is lost on exit.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

/// Replace the port of `bind_addr` with `port`.
fn with_port(bind_addr: &str, port: u16) -> String {
    let host = bind_addr
        .rsplit_once(':')
        .map_or(bind_addr, |(host, _)| host);
    format!("{host}:{port}")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keygate_api=debug,keygate_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.database_url = args.database_url.clone();
    if let Some(port) = args.port {
        config.bind_addr = with_port(&config.bind_addr, port);
    }
    info!(?config, in_memory = args.in_memory, "starting keygate_api_server");

    // A missing signing key outside test mode is fatal here, never per request.
    let keys = Arc::new(KeyManager::load(&config.key_source, config.environment)?);
    if keys.is_ephemeral() {
        warn!("using an ephemeral API-key signing key; issued keys will not survive restart");
    }

    let store: Arc<dyn AuthStore> = if args.in_memory {
        warn!("in-memory store: all users and tokens are lost on exit");
        Arc::new(InMemoryStore::new())
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        keygate_core::migrate::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = keygate_api::router(AppState::new(store, keys, config));

    info!(addr = %local_addr, "REST API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_override_keeps_host() {
        assert_eq!(with_port("127.0.0.1:3100", 8080), "127.0.0.1:8080");
        assert_eq!(with_port("0.0.0.0:3100", 0), "0.0.0.0:0");
        assert_eq!(with_port("localhost", 9000), "localhost:9000");
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["keygate_api_server", "--port", "4000", "--in-memory"]);
        assert_eq!(args.port, Some(4000));
        assert!(args.in_memory);
        assert_eq!(args.max_connections, 5);
    }
}
