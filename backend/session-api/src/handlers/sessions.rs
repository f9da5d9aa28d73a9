use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    handlers::error_response,
    metrics::{CODE_RUNS_TOTAL, PROMPTS_RELAYED_TOTAL},
    models::{
        ChatRequest, ChatResponse, CreateSessionRequest, CreateSessionResponse,
        InputCheckResponse, NavigateRequest, RunCodeRequest, UpdateCodeRequest,
    },
    proctor::controller::SubmitReason,
    proctor::lockdown::InputEvent,
    proctor::signals::EnvironmentSignal,
    services::{chat_service::ChatEndpoint, AppState, SessionHandle},
};

fn validation_error(e: validator::ValidationErrors) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

fn lookup(state: &AppState, session_id: &str) -> Result<SessionHandle, (StatusCode, String)> {
    state.sessions.get(session_id).map_err(error_response)
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;

    tracing::info!(candidate_id = ?req.candidate_id, "creating session");
    let (session_id, _handle) = state.create_session();

    let response = CreateSessionResponse {
        session_id,
        questions: state.catalog.iter().map(|q| q.view()).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(session_id = %session_id, "start requested");
    let handle = lookup(&state, &session_id)?;

    match handle.controller.start().await {
        Ok(snapshot) => Ok((StatusCode::OK, Json(snapshot))),
        Err(e) => {
            tracing::warn!(session_id = %session_id, "start failed: {e}");
            Err(error_response(e))
        }
    }
}

pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(session_id = %session_id, "resume requested");
    let handle = lookup(&state, &session_id)?;

    match handle.controller.resume().await {
        Ok(snapshot) => Ok((StatusCode::OK, Json(snapshot))),
        Err(e) => {
            tracing::warn!(session_id = %session_id, "resume failed: {e}");
            Err(error_response(e))
        }
    }
}

/// Raw environment report from the client; the monitor decides what (if
/// anything) it means.
pub async fn report_signal(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(signal): Json<EnvironmentSignal>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = lookup(&state, &session_id)?;
    tracing::debug!(session_id = %session_id, ?signal, "environment signal");
    handle.link.report(signal);
    Ok(StatusCode::ACCEPTED)
}

/// Lockdown policy check for clients forwarding input events instead of
/// suppressing them locally.
pub async fn check_input(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(event): Json<InputEvent>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = lookup(&state, &session_id)?;
    let suppress = handle.controller.blocks_input(&event);
    Ok(Json(InputCheckResponse { suppress }))
}

pub async fn update_code(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<UpdateCodeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;
    let handle = lookup(&state, &session_id)?;

    match handle.controller.edit_code(&req.question_id, req.code).await {
        Ok(snapshot) => Ok((StatusCode::OK, Json(snapshot))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = lookup(&state, &session_id)?;

    match handle.controller.navigate(req.direction).await {
        Ok(snapshot) => Ok((StatusCode::OK, Json(snapshot))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(session_id = %session_id, "manual submission requested");
    let handle = lookup(&state, &session_id)?;

    match handle.controller.submit(SubmitReason::Manual).await {
        Ok(report) => Ok((StatusCode::OK, Json(report))),
        Err(e) => {
            tracing::warn!(session_id = %session_id, "submission failed: {e}");
            Err(error_response(e))
        }
    }
}

/// Single-use hand-off to the results view.
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    lookup(&state, &session_id)?;

    match state.results.take(&session_id) {
        Some(report) => Ok((StatusCode::OK, Json(report))),
        None => Err((
            StatusCode::NOT_FOUND,
            "no results available for this session".to_string(),
        )),
    }
}

/// Runs the candidate's current buffer against the active question's test
/// cases via the code-execution collaborator.
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<RunCodeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;
    let handle = lookup(&state, &session_id)?;

    let question = handle
        .controller
        .active_question()
        .await
        .map_err(error_response)?;
    let language = req.language.unwrap_or_else(|| question.language.clone());

    match state
        .compiler
        .run(&language, &req.code, &question.test_cases)
        .await
    {
        Ok(report) => {
            let outcome = if report.all_passed { "passed" } else { "failed" };
            CODE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
            Ok((StatusCode::OK, Json(report)))
        }
        Err(e) => {
            CODE_RUNS_TOTAL.with_label_values(&["error"]).inc();
            tracing::warn!(session_id = %session_id, "code run failed: {e}");
            Err(error_response(e))
        }
    }
}

pub async fn chat_interviewer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    relay_chat(&state, &session_id, ChatEndpoint::Interviewer, req).await
}

pub async fn chat_assistant(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    relay_chat(&state, &session_id, ChatEndpoint::Assistant, req).await
}

/// Prompts are attributed to the question on screen; one successful
/// round-trip increments that question's counter exactly once. A failed
/// relay leaves the counter and the session phase untouched.
async fn relay_chat(
    state: &AppState,
    session_id: &str,
    endpoint: ChatEndpoint,
    req: ChatRequest,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;
    let handle = lookup(state, session_id)?;

    let question = handle
        .controller
        .active_question()
        .await
        .map_err(error_response)?;

    let reply = state
        .chat
        .relay(endpoint, &req.prompt, &question)
        .await
        .map_err(|e| {
            tracing::warn!(
                session_id = %session_id,
                endpoint = endpoint.as_str(),
                "chat relay failed: {e}"
            );
            error_response(e)
        })?;

    handle
        .controller
        .record_prompt(&question.id)
        .await
        .map_err(error_response)?;
    PROMPTS_RELAYED_TOTAL
        .with_label_values(&[endpoint.as_str()])
        .inc();

    Ok(Json(ChatResponse { reply }))
}
