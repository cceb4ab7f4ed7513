use serde::{Deserialize, Serialize};

use courier_types::events::{ClientEvent, CloseReason, InboundEnvelope};

/// Close reason string the sidecar uses for invalidated credentials.
pub const LOGOUT_REASON: &str = "logged_out";

/// Frames sent to the sidecar.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarCommand<'a> {
    /// First frame on every connection: which session to drive and where
    /// the sidecar keeps its credential material.
    Init {
        session_id: &'a str,
        auth_dir: &'a str,
    },
    Send {
        message_id: &'a str,
        chat_id: &'a str,
        text: &'a str,
    },
}

/// Frames received from the sidecar.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarFrame {
    PairingCode {
        code: String,
    },
    Connected {
        #[serde(default)]
        phone: Option<String>,
    },
    CredentialsUpdated,
    Message {
        #[serde(flatten)]
        envelope: InboundEnvelope,
    },
    Closed {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl SidecarFrame {
    pub fn into_event(self) -> ClientEvent {
        match self {
            Self::PairingCode { code } => ClientEvent::PairingCode(code),
            Self::Connected { phone } => ClientEvent::Connected { phone },
            Self::CredentialsUpdated => ClientEvent::CredentialsUpdated,
            Self::Message { envelope } => ClientEvent::Message(envelope),
            Self::Closed { reason } => ClientEvent::Closed {
                reason: close_reason(reason.as_deref()),
            },
        }
    }
}

/// Only the sidecar's explicit logout marker is terminal; every other (or
/// missing) reason is a transient loss.
pub fn close_reason(reason: Option<&str>) -> CloseReason {
    match reason {
        Some(LOGOUT_REASON) => CloseReason::LoggedOut,
        Some(other) => CloseReason::Other(other.to_string()),
        None => CloseReason::Other("connection closed".to_string()),
    }
}
