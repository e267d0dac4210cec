use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use policy_ai::answer::AnswerEngine;
use policy_core::error::{AppError, ErrorCategory};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Message returned for every non-validation failure; details only go to the log.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to answer question";

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnswerEngine>,
    pub answer_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<AnswerEngine>, answer_timeout: Duration) -> Self {
        Self {
            engine,
            answer_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorPayload<'a> {
    code: &'a str,
    message: &'a str,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ask", post(ask_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Inference if err.code == "INFERENCE_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AppError) -> Response {
    let status = status_for(err);
    let message = if status == StatusCode::BAD_REQUEST {
        warn!(code = %err.code, message = %err.message, "Rejected question");
        err.message.as_str()
    } else {
        error!(
            code = %err.code,
            message = %err.message,
            details = err.details.as_deref().unwrap_or(""),
            "Failed to answer question"
        );
        GENERIC_FAILURE_MESSAGE
    };
    (
        status,
        Json(ErrorBody {
            error: ErrorPayload {
                code: &err.code,
                message,
            },
        }),
    )
        .into_response()
}

fn rejection_error(rejection: &JsonRejection) -> AppError {
    let code = match rejection {
        JsonRejection::JsonDataError(_) => "VALIDATION_QUESTION_INVALID",
        JsonRejection::JsonSyntaxError(_) => "VALIDATION_BODY_MALFORMED",
        JsonRejection::MissingJsonContentType(_) => "VALIDATION_CONTENT_TYPE",
        _ => "VALIDATION_BODY_INVALID",
    };
    let message = match rejection {
        JsonRejection::JsonDataError(_) => "Request body must contain a string field \"question\"",
        JsonRejection::MissingJsonContentType(_) => "Expected Content-Type: application/json",
        _ => "Request body must be a JSON object",
    };
    AppError::new(code, message).with_details(rejection.body_text())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "chunks": state.engine.store().len(),
        "model": state.engine.model(),
    }))
}

async fn ask_handler(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    let question = match payload {
        Ok(Json(req)) => req.question,
        Err(rejection) => return error_response(&rejection_error(&rejection)),
    };
    match answer_with_timeout(&state, question).await {
        Ok(answer) => (StatusCode::OK, Json(AskResponse { answer })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Run the blocking answer pipeline off the async workers, bounded by the configured timeout.
async fn answer_with_timeout(state: &AppState, question: String) -> Result<String, AppError> {
    let engine = state.engine.clone();
    let started = std::time::Instant::now();
    let task = tokio::task::spawn_blocking(move || engine.answer(&question));

    let out = match tokio::time::timeout(state.answer_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(AppError::new("ANSWER_TASK_FAILED", "Answer task failed")
            .with_details(join.to_string())),
        Err(_) => Err(AppError::new(
            "INFERENCE_TIMEOUT",
            "Timed out waiting for an answer",
        )
        .with_details(format!("timeout_secs={}", state.answer_timeout.as_secs()))),
    };

    if out.is_ok() {
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Answered question");
    }
    out
}
