use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use courier_db::Database;
use courier_gateway::Dispatcher;
use courier_types::events::{GatewayEvent, InboundEnvelope};
use courier_types::session::Direction;

/// Shape of an `inbound_events` stream entry.
#[derive(Serialize)]
struct StreamRecord<'a> {
    session_id: &'a str,
    chat_id: &'a str,
    counterparty: &'a str,
    text: Option<&'a str>,
    message_id: Option<&'a str>,
    timestamp: Option<i64>,
}

/// Routes one inbound message to the event stream, the audit log, and the
/// notification channel.
///
/// The three side effects are independent: a failed write is logged and
/// swallowed, and never blocks the others.
pub struct InboundRouter {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    fallback_session: Option<String>,
}

impl InboundRouter {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, fallback_session: Option<String>) -> Self {
        Self {
            db,
            dispatcher,
            fallback_session,
        }
    }

    pub async fn handle(&self, env: InboundEnvelope) {
        // Self-originated messages are echoes of our own sends.
        if env.from_me {
            return;
        }

        let Some(session_id) = env
            .session_hint
            .clone()
            .or_else(|| self.fallback_session.clone())
        else {
            warn!(chat_id = %env.chat_id, "dropping inbound message with no resolvable session id");
            return;
        };

        let text = env.display_text();

        let record = StreamRecord {
            session_id: &session_id,
            chat_id: &env.chat_id,
            counterparty: &env.sender,
            text,
            message_id: env.message_id.as_deref(),
            timestamp: env.timestamp,
        };
        match serde_json::to_string(&record) {
            Ok(payload) => {
                if let Err(e) = self.db.append_inbound_event(&session_id, &payload) {
                    warn!("inbound event append failed: {e:#}");
                }
            }
            Err(e) => warn!("inbound event serialization failed: {e}"),
        }

        match self.db.insert_message(
            &session_id,
            Direction::Inbound,
            &env.chat_id,
            Some(&env.sender),
            text,
            env.message_id.as_deref(),
        ) {
            Ok(true) => {}
            Ok(false) => debug!(message_id = ?env.message_id, "duplicate inbound message ignored by audit log"),
            Err(e) => warn!("inbound audit insert failed: {e:#}"),
        }

        self.dispatcher.broadcast(GatewayEvent::MsgReceived {
            from: env.sender.clone(),
            message: text.map(str::to_owned),
        });
    }
}
