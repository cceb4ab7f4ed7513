use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, warn};
use uuid::Uuid;

use courier_session::{ChatClient, ClientFactory, ClientSession, ConnectError};
use courier_types::events::ClientEvent;

use crate::wire::{SidecarCommand, SidecarFrame, close_reason};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connects to the protocol-client sidecar over a local WebSocket. Each
/// `connect` call produces a fresh socket, so a restart never shares state
/// with the torn-down connection.
pub struct SidecarFactory {
    url: String,
    session_id: String,
    auth_dir: PathBuf,
}

impl SidecarFactory {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>, auth_dir: PathBuf) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            auth_dir,
        }
    }
}

#[async_trait]
impl ClientFactory for SidecarFactory {
    async fn connect(&self) -> Result<ClientSession, ConnectError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| anyhow!("sidecar connect to {} failed: {e}", self.url))?;

        info!("connected to sidecar at {}", self.url);
        let (mut sink, stream) = socket.split();

        let auth_dir = self.auth_dir.to_string_lossy();
        let init = SidecarCommand::Init {
            session_id: &self.session_id,
            auth_dir: &auth_dir,
        };
        let json = serde_json::to_string(&init).map_err(anyhow::Error::from)?;
        sink.send(Message::text(json))
            .await
            .map_err(|e| anyhow!("sidecar init failed: {e}"))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(pump(stream, tx));

        Ok(ClientSession {
            client: Arc::new(SidecarClient {
                sink: Mutex::new(sink),
            }),
            events: rx,
        })
    }
}

/// Forward sidecar frames to the controller until the socket or the
/// controller goes away. A socket loss without an explicit `closed` frame
/// is surfaced as a transient close so the reconnect policy still runs.
async fn pump(mut stream: WsStream, tx: mpsc::Sender<ClientEvent>) {
    let mut saw_close_frame = false;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let text = text.as_str();
                match serde_json::from_str::<SidecarFrame>(text) {
                    Ok(frame) => {
                        let is_close = matches!(frame, SidecarFrame::Closed { .. });
                        if tx.send(frame.into_event()).await.is_err() {
                            // Controller dropped the stream; nothing left to do.
                            return;
                        }
                        if is_close {
                            saw_close_frame = true;
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("unrecognized sidecar frame: {e} -- raw: {}", frame_preview(text));
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("sidecar socket error: {e}");
                break;
            }
        }
    }

    if !saw_close_frame {
        let _ = tx
            .send(ClientEvent::Closed {
                reason: close_reason(None),
            })
            .await;
    }
}

/// First 200 characters of a frame for log output. Cuts on a character
/// boundary; frames are arbitrary bytes-as-UTF-8 and a byte slice could
/// land mid code point.
fn frame_preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

struct SidecarClient {
    sink: Mutex<WsSink>,
}

#[async_trait]
impl ChatClient for SidecarClient {
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let cmd = SidecarCommand::Send {
            message_id: &message_id,
            chat_id,
            text,
        };
        let json = serde_json::to_string(&cmd)?;

        self.sink
            .lock()
            .await
            .send(Message::text(json))
            .await
            .map_err(|e| anyhow!("sidecar send failed: {e}"))?;

        Ok(message_id)
    }
}
