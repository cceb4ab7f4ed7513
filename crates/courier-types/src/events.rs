use serde::{Deserialize, Serialize};

/// Events pushed to WebSocket observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A fresh pairing code was issued (or replayed to a new observer).
    #[serde(rename = "qr")]
    Qr(String),

    /// The protocol session came up.
    #[serde(rename = "connected")]
    Connected,

    /// An inbound text message was accepted.
    #[serde(rename = "msg-received")]
    MsgReceived { from: String, message: Option<String> },

    /// The session's credentials were invalidated; no reconnect will follow.
    #[serde(rename = "session_logged_out")]
    SessionLoggedOut,
}

/// Why the protocol client's connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Credentials invalidated; terminal for the reconnect policy.
    LoggedOut,
    /// Anything else (network loss, server restart, unknown).
    Other(String),
}

impl CloseReason {
    pub fn is_logout(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// One inbound message as delivered by the protocol client, before routing.
///
/// Text is spread across three candidate fields because the wire format
/// carries plain bodies, quoted/extended bodies, and media captions in
/// different places. `display_text` picks the first populated one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InboundEnvelope {
    pub chat_id: String,
    pub sender: String,
    pub from_me: bool,
    pub body: Option<String>,
    pub extended_body: Option<String>,
    pub caption: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<i64>,
    /// Tenant/session hint from the message's context metadata, if any.
    pub session_hint: Option<String>,
}

impl InboundEnvelope {
    /// First populated text field, or None for non-text payloads.
    pub fn display_text(&self) -> Option<&str> {
        [&self.body, &self.extended_body, &self.caption]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .find(|s| !s.is_empty())
    }
}

/// Events emitted by the protocol-client boundary, consumed by the
/// lifecycle controller's dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A pairing challenge was issued; the session stays in `connecting`.
    PairingCode(String),
    /// The connection opened; identity may be resolved at this point.
    Connected { phone: Option<String> },
    /// Credential material was (re)written by the client library.
    CredentialsUpdated,
    /// An inbound message arrived.
    Message(InboundEnvelope),
    /// The connection closed. The stream ends after this.
    Closed { reason: CloseReason },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_event_wire_names() {
        let json = serde_json::to_string(&GatewayEvent::Qr("ABCD-1234".into())).unwrap();
        assert_eq!(json, r#"{"type":"qr","data":"ABCD-1234"}"#);

        let json = serde_json::to_string(&GatewayEvent::MsgReceived {
            from: "15551234567".into(),
            message: Some("hi".into()),
        })
        .unwrap();
        assert!(json.contains(r#""type":"msg-received""#));

        let json = serde_json::to_string(&GatewayEvent::SessionLoggedOut).unwrap();
        assert_eq!(json, r#"{"type":"session_logged_out"}"#);
    }

    #[test]
    fn display_text_prefers_plain_body() {
        let env = InboundEnvelope {
            body: Some("plain".into()),
            extended_body: Some("extended".into()),
            caption: Some("caption".into()),
            ..Default::default()
        };
        assert_eq!(env.display_text(), Some("plain"));
    }

    #[test]
    fn display_text_falls_through_to_caption() {
        let env = InboundEnvelope {
            caption: Some("a photo".into()),
            ..Default::default()
        };
        assert_eq!(env.display_text(), Some("a photo"));
    }

    #[test]
    fn display_text_none_for_non_text_payloads() {
        assert_eq!(InboundEnvelope::default().display_text(), None);
    }

    #[test]
    fn empty_body_does_not_mask_caption() {
        let env = InboundEnvelope {
            body: Some(String::new()),
            caption: Some("a photo".into()),
            ..Default::default()
        };
        assert_eq!(env.display_text(), Some("a photo"));
    }
}
