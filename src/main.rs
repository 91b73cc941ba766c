mod auth;
mod call;
mod chat;
mod config;
mod db;
mod routes;
mod state;
mod ws;

use std::sync::Arc;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gatherly_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gatherly_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Gatherly realtime server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database (shared with the web application)
    let db = db::init_db(&config.data_dir)?;

    // Resolve the cookie-signing secret (configured, or generated in data_dir)
    let session_secret =
        auth::secret::load_or_generate_session_secret(&config.session_secret, &config.data_dir)?;

    // Build application state
    let app_state = state::AppState {
        db,
        registry: Arc::new(ws::registry::Registry::new()),
        session_secret,
        session_cookie: config.session_cookie.clone(),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
