// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! | Method | Path | Success | Errors |
//! |--------|------|---------|--------|
//! | POST | `/tasks?mode=single\|multi` | 200 result (sync), 202 `{jobId}` (async) | 400, 401, 403 |
//! | GET | `/tasks/{jobId}` | 200 job status | 401, 404 |
//! | DELETE | `/tasks/{jobId}` | 200 cancelled job status | 401, 404, 409 |
//! | GET | `/monitor/status?windowMinutes=N` | 200 alerts + usage | 400 |
//! | GET | `/health` | 200 | |
//!
//! Callers identify themselves with the `x-caller-id` header. Errors are
//! rendered as `{"error": <kind>, "reason": <message>}`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::task_service::{Submission, TaskService, TaskServiceError};
use crate::domain::job::{JobError, JobId};
use crate::domain::policy::PolicyRejection;
use crate::domain::task::{Caller, DispatchMode, TaskRequest};

pub const CALLER_HEADER: &str = "x-caller-id";

pub fn app(service: Arc<TaskService>) -> Router {
    Router::new()
        .route("/tasks", post(submit_task))
        .route("/tasks/{job_id}", get(get_job).delete(cancel_job))
        .route("/monitor/status", get(monitor_status))
        .route("/health", get(health))
        .with_state(service)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    #[serde(default)]
    mode: DispatchMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery {
    window_minutes: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted {
    job_id: JobId,
}

async fn submit_task(
    State(service): State<Arc<TaskService>>,
    query: Result<Query<TaskQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&service, &headers).await?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let response = match service.submit(&caller, request, query.mode).await? {
        Submission::Single(result) => (StatusCode::OK, Json(result)).into_response(),
        Submission::Multi(result) => (StatusCode::OK, Json(result)).into_response(),
        Submission::Queued(status) => (
            StatusCode::ACCEPTED,
            Json(Accepted {
                job_id: status.job_id,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

async fn get_job(
    State(service): State<Arc<TaskService>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = authenticate(&service, &headers).await?;
    let job_id = parse_job_id(&job_id)?;
    let status = service.poll(&caller, job_id)?;
    Ok(Json(status).into_response())
}

async fn cancel_job(
    State(service): State<Arc<TaskService>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = authenticate(&service, &headers).await?;
    let job_id = parse_job_id(&job_id)?;
    let status = service.cancel(&caller, job_id)?;
    Ok(Json(status).into_response())
}

async fn monitor_status(
    State(service): State<Arc<TaskService>>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let window = match query.window_minutes {
        Some(0) => {
            return Err(ApiError::BadRequest(
                "windowMinutes must be at least 1".to_string(),
            ))
        }
        Some(minutes) => Some(Duration::from_secs(minutes.saturating_mul(60))),
        None => None,
    };
    Ok(Json(service.monitor_status(window)).into_response())
}

async fn health(State(service): State<Arc<TaskService>>) -> Response {
    Json(service.health()).into_response()
}

async fn authenticate(service: &TaskService, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller_id = headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok());
    Ok(service.authenticate(caller_id).await?)
}

/// Malformed ids cannot name an existing job
fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("job {} not found", raw)))
}

fn panic_response(_payload: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    ApiError::Internal("internal fault while handling the request".to_string()).into_response()
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthenticated(String),
    Forbidden(PolicyRejection),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, reason, check) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.as_str(), None),
            Self::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg.as_str(), None)
            }
            Self::Forbidden(rejection) => (
                StatusCode::FORBIDDEN,
                "policy_rejected",
                rejection.reason.as_str(),
                Some(rejection.check.as_str()),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.as_str(), None),
            Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg.as_str(), None)
            }
        };

        let body = ErrorBody {
            error,
            reason,
            check,
        };
        (status, Json(body)).into_response()
    }
}

impl From<TaskServiceError> for ApiError {
    fn from(err: TaskServiceError) -> Self {
        match err {
            TaskServiceError::Unauthenticated(msg) => Self::Unauthenticated(msg),
            TaskServiceError::Validation(e) => Self::BadRequest(e.to_string()),
            TaskServiceError::Rejected(rejection) => Self::Forbidden(rejection),
            TaskServiceError::Job(e @ JobError::NotFound(_)) => Self::NotFound(e.to_string()),
            TaskServiceError::Job(e @ JobError::InvalidTransition { .. }) => {
                Self::Conflict(e.to_string())
            }
            TaskServiceError::Directory(e) => {
                error!("Caller directory lookup failed: {}", e);
                Self::Internal("caller directory unavailable".to_string())
            }
        }
    }
}
