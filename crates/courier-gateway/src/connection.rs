use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use courier_db::Database;
use courier_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one observer connection: replay the live pairing code if one
/// exists, then forward every broadcast event until either side goes away.
///
/// Observers are read-only; inbound text frames are ignored.
pub async fn handle_observer(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    session_id: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("observer connected to gateway");

    // Subscribe before the replay so no event can fall between the two.
    let mut broadcast_rx = dispatcher.subscribe();

    // Replay the authoritative pairing code, not any in-memory copy, so an
    // expired code is never re-surfaced.
    let replay_db = db.clone();
    let replay_session = session_id.clone();
    let code = tokio::task::spawn_blocking(move || replay_db.get_pairing_code(&replay_session))
        .await
        .unwrap_or_else(|e| Err(anyhow::anyhow!("join error: {e}")));

    match code {
        Ok(Some(code)) => {
            let event = GatewayEvent::Qr(code);
            let text = serde_json::to_string(&event).unwrap();
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        Ok(None) => {}
        Err(e) => warn!("pairing-code replay failed: {e:#}"),
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("observer lagged by {} events", n);
                        continue;
                    }
                    Err(_) => break,
                };

                let text = serde_json::to_string(&event).unwrap();
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // observers have nothing to say
                    Some(Err(_)) => break,
                }
            }
            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("heartbeat timeout (missed {} pongs), dropping observer", missed_heartbeats);
                        break;
                    }
                }
                pong_received = false;
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("observer disconnected from gateway");
}
