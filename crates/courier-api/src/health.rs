use axum::Json;
use axum::extract::State;

use courier_types::api::HealthResponse;
use courier_types::session::SessionStatus;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        wa_connected: state.session.status() == SessionStatus::Connected,
    })
}
