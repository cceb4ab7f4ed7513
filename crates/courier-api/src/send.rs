use axum::Json;
use axum::extract::State;
use tracing::{error, warn};

use courier_types::api::{SendRequest, SendResponse};
use courier_types::session::Direction;

use crate::{AppState, error::ApiError};

/// Domain suffix the protocol uses for direct chats.
pub const CHAT_DOMAIN: &str = "@s.whatsapp.net";

pub const MAX_MESSAGE_LEN: usize = 1000;

/// Strip everything but digits; a valid recipient is 6-20 digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (6..=20).contains(&digits.len()).then_some(digits)
}

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest(format!(
            "message exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

/// Submit an outbound text through the live client. Succeeds only once the
/// client has accepted the send; the audit write afterwards is best-effort
/// and cannot retract an already-sent message.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    validate_message(&req.message)?;
    let digits = normalize_phone(&req.to)
        .ok_or_else(|| ApiError::BadRequest("malformed phone number".into()))?;

    let Some(client) = state.session.client().await else {
        return Err(ApiError::ClientUnavailable);
    };

    let chat_id = format!("{digits}{CHAT_DOMAIN}");
    let message_id = client
        .send_text(&chat_id, &req.message)
        .await
        .map_err(ApiError::Internal)?;

    // Run blocking DB insert off the async runtime
    let db = state.db.clone();
    let session_id = state.session_id.clone();
    let body = req.message.clone();
    let audit = tokio::task::spawn_blocking(move || {
        db.insert_message(
            &session_id,
            Direction::Outbound,
            &chat_id,
            Some(&digits),
            Some(&body),
            Some(&message_id),
        )
    })
    .await;
    match audit {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("outbound audit insert failed: {e:#}"),
        Err(e) => error!("spawn_blocking join error: {}", e),
    }

    Ok(Json(SendResponse { status: "sent" }))
}
