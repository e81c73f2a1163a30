// src/auth.rs

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

pub const API_KEY_ENV: &str = "ALGOGRADE_API_KEY";

/// Bearer key guarding the grading routes. `None` leaves them open.
#[derive(Debug, Clone, Default)]
pub struct ApiKey(pub Option<Arc<str>>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(Arc::from(key.into())))
    }

    /// Key from `ALGOGRADE_API_KEY`; an empty value counts as unset.
    pub fn from_env() -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(v) if !v.trim().is_empty() => Self::new(v.trim()),
            _ => Self(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

pub async fn api_key_auth(State(key): State<ApiKey>, req: Request<Body>, next: Next) -> Response {
    let expected = match &key.0 {
        Some(k) => k,
        None => return next.run(req).await,
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == &**expected => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok": false,
                "error": { "code": "UNAUTHORIZED", "message": "missing or invalid API key" }
            })),
        )
            .into_response(),
    }
}
