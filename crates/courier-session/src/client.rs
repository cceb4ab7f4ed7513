//! Boundary traits for the external protocol client.
//!
//! Everything protocol-specific (pairing, encryption, framing) lives behind
//! these two traits; the lifecycle controller only sees an event stream and
//! a send call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use courier_types::events::ClientEvent;

/// Live handle to a connected protocol client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Submit text to a chat. Returns the protocol message id once the
    /// client has accepted the send.
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<String>;
}

/// One established client connection: the send handle plus its event stream.
/// The stream ends at (or shortly after) a `Closed` event; dropping the
/// receiver tears the subscription down.
pub struct ClientSession {
    pub client: Arc<dyn ChatClient>,
    pub events: mpsc::Receiver<ClientEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The stored credentials are invalidated; reconnecting cannot help.
    #[error("session credentials invalidated")]
    LoggedOut,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Constructs client connections. Called once at startup and again on every
/// scheduled restart.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self) -> Result<ClientSession, ConnectError>;
}
