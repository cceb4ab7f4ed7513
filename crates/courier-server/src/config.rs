use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

/// Process configuration, read once at startup. Missing mandatory values
/// are fatal; the process must not come up half-configured.
pub struct Config {
    /// Shared secret required on outbound-send requests.
    pub send_secret: String,
    /// Identifier of the single session this process manages.
    pub session_id: String,
    /// WebSocket endpoint of the protocol-client sidecar.
    pub client_url: String,
    pub db_path: PathBuf,
    /// Credential-storage directory, handed to the sidecar. Opaque to us.
    pub auth_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            send_secret: require("COURIER_SEND_SECRET")?,
            session_id: require("COURIER_SESSION_ID")?,
            client_url: require("COURIER_CLIENT_URL")?,
            db_path: env::var("COURIER_DB_PATH")
                .unwrap_or_else(|_| "courier.db".into())
                .into(),
            auth_dir: env::var("COURIER_AUTH_DIR")
                .unwrap_or_else(|_| "auth".into())
                .into(),
            host: env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("COURIER_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .context("COURIER_PORT is not a valid port")?,
        })
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("{name} must be set"))
}
