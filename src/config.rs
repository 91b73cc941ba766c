use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Gatherly realtime server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "gatherly-server", version, about = "Gatherly realtime chat and signaling server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "GATHERLY_PORT", default_value = "4000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "GATHERLY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./gatherly.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "GATHERLY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, session secret)
    #[arg(long, env = "GATHERLY_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Name of the session cookie set by the web application
    #[arg(long, env = "GATHERLY_SESSION_COOKIE", default_value = "connect.sid")]
    pub session_cookie: String,

    /// Secret used to verify signed session cookies.
    /// Must match the web application's cookie-signing secret.
    /// If empty, a secret is loaded or generated under data_dir.
    #[arg(long, env = "GATHERLY_SESSION_SECRET", default_value = "")]
    pub session_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            bind_address: "0.0.0.0".to_string(),
            config: "./gatherly.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            session_cookie: "connect.sid".to_string(),
            session_secret: String::new(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (GATHERLY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("GATHERLY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Gatherly Realtime Server Configuration
# Place this file at ./gatherly.toml or specify with --config <path>
# All settings can be overridden via environment variables (GATHERLY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4000)
# port = 4000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and session secret
# data_dir = "./data"

# Name of the session cookie issued by the web application (default: connect.sid)
# session_cookie = "connect.sid"

# Secret used to verify signed session cookies.
# MUST match the web application's cookie-signing secret in production.
# Auto-generated under data_dir when left empty (standalone/dev deployments).
# session_secret = ""
"#
    .to_string()
}
