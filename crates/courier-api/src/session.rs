use axum::Json;
use axum::extract::{Path, State};
use tracing::{error, warn};

use courier_types::api::{QrResponse, StatusResponse};
use courier_types::session::SessionStatus;

use crate::{AppState, error::ApiError};

/// Current pairing code for a session. 404 when none was issued or the
/// cached one expired.
pub async fn get_qr(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QrResponse>, ApiError> {
    let db = state.db.clone();
    let code = tokio::task::spawn_blocking(move || db.get_pairing_code(&id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("join error"))
        })??;

    match code {
        Some(qr) => Ok(Json(QrResponse { qr })),
        None => Err(ApiError::NotFound("no pairing code available".into())),
    }
}

/// Session status as last persisted. Unknown sessions read as
/// `{"status":"unknown"}` rather than an error.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_session(&id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("join error"))
        })??;

    let response = match row {
        Some(row) => StatusResponse {
            status: row.status.parse().unwrap_or_else(|e| {
                warn!("corrupt session status for '{}': {}", row.id, e);
                SessionStatus::Unknown
            }),
            updated_at: Some(row.updated_at),
            phone: row.phone,
        },
        None => StatusResponse {
            status: SessionStatus::Unknown,
            updated_at: None,
            phone: None,
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use courier_db::Database;
    use courier_gateway::Dispatcher;
    use courier_session::{ControllerConfig, LifecycleController};

    use crate::AppStateInner;

    use super::*;

    struct NeverFactory;

    #[async_trait::async_trait]
    impl courier_session::ClientFactory for NeverFactory {
        async fn connect(
            &self,
        ) -> Result<courier_session::ClientSession, courier_session::ConnectError> {
            Err(courier_session::ConnectError::Other(anyhow::anyhow!(
                "not wired in this test"
            )))
        }
    }

    fn state_with(db: Arc<Database>) -> AppState {
        let (_controller, handle) = LifecycleController::new(
            db.clone(),
            Dispatcher::new(),
            Arc::new(NeverFactory),
            ControllerConfig::new("s1"),
        );
        Arc::new(AppStateInner {
            db,
            session: handle,
            send_secret: "hunter2".into(),
            session_id: "s1".into(),
        })
    }

    #[tokio::test]
    async fn qr_returns_live_code() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.put_pairing_code("s1", "ABCD-1234", Duration::from_secs(120))
            .unwrap();

        let response = get_qr(State(state_with(db)), Path("s1".into()))
            .await
            .unwrap();
        assert_eq!(response.qr, "ABCD-1234");
    }

    #[tokio::test]
    async fn qr_is_404_when_absent_or_expired() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.put_pairing_code("s1", "ABCD-1234", Duration::ZERO).unwrap();
        let state = state_with(db);

        let absent = get_qr(State(state.clone()), Path("other".into())).await;
        assert!(matches!(absent, Err(ApiError::NotFound(_))));

        let expired = get_qr(State(state), Path("s1".into())).await;
        assert!(matches!(expired, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn status_reflects_persisted_row() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_session_status("s1", SessionStatus::Connected, Some("15551234567"))
            .unwrap();

        let response = get_status(State(state_with(db)), Path("s1".into()))
            .await
            .unwrap();
        assert_eq!(response.status, SessionStatus::Connected);
        assert_eq!(response.phone.as_deref(), Some("15551234567"));
        assert!(response.updated_at.is_some());
    }

    #[tokio::test]
    async fn unknown_session_reads_as_unknown() {
        let db = Arc::new(Database::open_in_memory().unwrap());

        let response = get_status(State(state_with(db)), Path("nope".into()))
            .await
            .unwrap();
        assert_eq!(response.status, SessionStatus::Unknown);
        assert_eq!(response.updated_at, None);
        assert_eq!(response.phone, None);
    }
}
