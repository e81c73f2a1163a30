// src/runtime.rs

//! HTTP runtime.
//!
//! - `GET  /health`
//! - `GET  /languages`
//! - `POST /execute`    one program, one input
//! - `POST /run-tests`  caller-supplied fixtures
//! - `POST /validate`   catalog fixtures for an algorithm, scored
//!
//! The POST routes sit behind [`api_key_auth`]. Handlers share read-only
//! state, so requests never affect each other. Hidden fixtures are redacted
//! from everything returned.

use crate::auth::{api_key_auth, ApiKey};
use crate::catalog::FixtureSource;
use crate::engine::{
    ExecutionRequest, ExecutionResult, Grader, RawFixture, TestCaseResult, ValidationReport,
};
use crate::error::GradeError;
use crate::request_id::RequestId;

use axum::debug_handler;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Span;

/* ---------------- state ---------------- */

#[derive(Clone)]
pub struct AppState {
    pub grader: Grader,
    pub catalog: Arc<dyn FixtureSource>,
}

/* ---------------- server ---------------- */

pub fn router(state: AppState, key: ApiKey) -> Router {
    let protected = Router::new()
        .route("/execute", post(execute))
        .route("/run-tests", post(run_tests))
        .route("/validate", post(validate))
        .layer(middleware::from_fn_with_state(key, api_key_auth));

    Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages))
        .merge(protected)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        request_id = %RequestId::new(),
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "request completed"
                    );
                }),
        )
}

pub async fn serve<F>(addr: &str, state: AppState, key: ApiKey, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if !key.is_configured() {
        tracing::warn!("no API key configured; grading routes are open");
    }

    let app = router(state, key);

    let socket: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(socket).await?;

    tracing::info!("algograde runtime listening on http://{}", socket);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/* ---------------- errors ---------------- */

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Grade(#[from] GradeError),

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Grade(GradeError::UnsupportedLanguage(_)) => StatusCode::BAD_REQUEST,
            ApiError::Grade(GradeError::MalformedFixture { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Grade(GradeError::UnknownAlgorithm(_)) => StatusCode::NOT_FOUND,
            ApiError::Grade(GradeError::Catalog(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Grade(e) => e.code(),
            ApiError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "ok": false,
                "error": { "code": self.error_code(), "message": self.to_string() },
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/* ---------------- request models ---------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunTestsRequest {
    code: String,
    language: String,
    #[serde(default)]
    fixtures: Vec<RawFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    algorithm_id: u32,
    code: String,
    language: String,
    #[serde(default)]
    threshold: Option<u8>,
}

/* ---------------- endpoints ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn languages(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.grader.engine().registry().languages())
}

#[debug_handler]
async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecutionRequest>,
) -> ApiResult<ExecutionResult> {
    let result = state.grader.engine().execute(&req).await?;
    Ok(Json(result))
}

#[debug_handler]
async fn run_tests(
    State(state): State<AppState>,
    Json(req): Json<RunTestsRequest>,
) -> ApiResult<Vec<TestCaseResult>> {
    let results = state
        .grader
        .run_raw_fixtures(&req.code, &req.language, req.fixtures)
        .await?;
    Ok(Json(results.iter().map(TestCaseResult::redacted).collect()))
}

#[debug_handler]
async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<ValidationReport> {
    let threshold = req.threshold.unwrap_or(state.grader.threshold());
    if threshold > 100 {
        return Err(ApiError::Validation(format!(
            "threshold must be 0-100, got {}",
            threshold
        )));
    }

    let fixtures = state.catalog.fixtures_for(req.algorithm_id)?;
    let report = state
        .grader
        .validate(&req.code, &req.language, &fixtures, threshold)
        .await?;
    Ok(Json(report.redacted()))
}
