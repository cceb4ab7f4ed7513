use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;

// -- Outbound send --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendRequest {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: &'static str,
}

// -- Session reads --

#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub qr: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SessionStatus,
    pub updated_at: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub wa_connected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
