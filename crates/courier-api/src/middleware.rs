use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::{AppState, error::ApiError};

pub const SECRET_HEADER: &str = "x-courier-secret";

pub fn secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|presented| presented == expected)
}

/// Reject unauthenticated requests before any body validation runs.
pub async fn require_send_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !secret_matches(req.headers(), &state.send_secret) {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(SECRET_HEADER, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn correct_secret_passes() {
        assert!(secret_matches(&headers_with(Some("hunter2")), "hunter2"));
    }

    #[test]
    fn wrong_missing_or_unreadable_secret_fails() {
        assert!(!secret_matches(&headers_with(Some("hunter3")), "hunter2"));
        assert!(!secret_matches(&headers_with(None), "hunter2"));

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_bytes(b"\xff").unwrap());
        assert!(!secret_matches(&headers, "hunter2"));
    }
}
