use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::json;
use tokio::time::timeout;
use tower::ServiceExt;

use proctordash_session_api::models::Phase;
use proctordash_session_api::{create_router, AppState, Config};

mod common;

use common::{create_test_app, create_test_app_with, get_json, post_json, pump_fullscreen};

async fn create_session(app: &common::TestApp) -> String {
    let (status, body) = post_json(&app.router, "/api/v1/sessions/", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

async fn wait_for_phase(app: &common::TestApp, session_id: &str, phase: Phase) {
    let handle = app.state.sessions.get(session_id).unwrap();
    let mut rx = handle.controller.subscribe();
    timeout(Duration::from_secs(2), async {
        loop {
            if rx.borrow_and_update().phase == phase {
                return;
            }
            rx.changed().await.expect("snapshot channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for phase {:?}", phase));
}

#[tokio::test]
async fn create_session_returns_sanitized_questions() {
    let app = create_test_app().await;
    let (status, body) = post_json(&app.router, "/api/v1/sessions/", json!({})).await;

    assert_eq!(status, StatusCode::CREATED);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["id"], "question_1");
    assert_eq!(questions[0]["title"], "Two Sum");
    assert!(questions[0]["starter_code"]
        .as_str()
        .unwrap()
        .starts_with("def twoSum"));
    // The scoring reference never reaches the candidate.
    assert!(questions[0].get("expected_answer").is_none());
    assert!(questions[1].get("expected_answer").is_none());
}

#[tokio::test]
async fn full_manual_flow_scores_in_order_with_shared_elapsed_time() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());

    let base = format!("/api/v1/sessions/{session_id}");

    let (status, body) = post_json(&app.router, &format!("{base}/start"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "active");
    assert!(body["started_at"].is_string());

    let (status, _) = post_json(
        &app.router,
        &format!("{base}/code"),
        json!({"question_id": "question_1", "code": "answer-A"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/navigate"),
        json!({"direction": "next"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_question"], 1);

    let (status, _) = post_json(
        &app.router,
        &format!("{base}/code"),
        json!({"question_id": "question_2", "code": "answer-B"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = post_json(&app.router, &format!("{base}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["question_id"], "question_1");
    assert_eq!(results[0]["question_title"], "Two Sum");
    assert_eq!(results[1]["question_id"], "question_2");
    assert_eq!(results[0]["overall"]["score"], 21.0);

    // Exactly one scoring call per question, in catalog order, all sharing
    // one elapsed value.
    let calls = app.scorer_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["question_id"], "question_1");
    assert_eq!(calls[0]["payload"]["candidate_answer"], "answer-A");
    assert_eq!(calls[1]["question_id"], "question_2");
    assert_eq!(calls[1]["payload"]["candidate_answer"], "answer-B");
    assert_eq!(
        calls[0]["payload"]["elapsed_seconds"],
        calls[1]["payload"]["elapsed_seconds"]
    );

    // Results hand-off is single-use.
    let (status, body) = get_json(&app.router, &format!("{base}/results")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    let (status, _) = get_json(&app.router, &format!("{base}/results")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_submission_is_rejected_without_extra_scoring() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&app.router, &format!("{base}/start"), json!({})).await;
    let (status, _) = post_json(&app.router, &format!("{base}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(&app.router, &format!("{base}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.scorer_calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn start_without_client_ack_fails_and_can_be_retried() {
    let app = create_test_app_with(50).await;
    let session_id = create_session(&app).await;
    let base = format!("/api/v1/sessions/{session_id}");

    // No client is pumping the link: the fullscreen directive goes nowhere.
    let (status, _) = post_json(&app.router, &format!("{base}/start"), json!({})).await;
    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);

    let handle = app.state.sessions.get(&session_id).unwrap();
    assert_eq!(handle.controller.snapshot().await.phase, Phase::NotStarted);

    // Once a client answers directives, the retry succeeds.
    pump_fullscreen(&handle);
    let (status, body) = post_json(&app.router, &format!("{base}/start"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "active");
}

#[tokio::test]
async fn tab_switch_forces_submission_without_blocking() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&app.router, &format!("{base}/start"), json!({})).await;

    let (status, _) = post_json(
        &app.router,
        &format!("{base}/signals"),
        json!({"type": "visibility", "hidden": true}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_phase(&app, &session_id, Phase::Submitted).await;
    assert_eq!(app.scorer_calls.lock().unwrap().len(), 2);

    let (status, body) = get_json(&app.router, &format!("{base}/results")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["total_seconds"].is_number());
}

#[tokio::test]
async fn fullscreen_loss_blocks_until_resume() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    let handle = app.state.sessions.get(&session_id).unwrap();
    pump_fullscreen(&handle);
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&app.router, &format!("{base}/start"), json!({})).await;
    post_json(
        &app.router,
        &format!("{base}/code"),
        json!({"question_id": "question_1", "code": "answer-A"}),
    )
    .await;

    post_json(
        &app.router,
        &format!("{base}/signals"),
        json!({"type": "fullscreen", "active": false}),
    )
    .await;
    wait_for_phase(&app, &session_id, Phase::Blocked).await;

    // The blocking overlay makes editing and chat inert.
    let (status, _) = post_json(
        &app.router,
        &format!("{base}/code"),
        json!({"question_id": "question_1", "code": "sneaky"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = post_json(
        &app.router,
        &format!("{base}/chat/assistant"),
        json!({"prompt": "help"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post_json(&app.router, &format!("{base}/resume"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "active");
    assert_eq!(body["code_by_question"]["question_1"], "answer-A");

    // No submission happened along the way.
    assert!(app.scorer_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chat_round_trips_increment_the_prompt_counter() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&app.router, &format!("{base}/start"), json!({})).await;

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/chat/assistant"),
        json!({"prompt": "how do I start?"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "echo: how do I start?");

    let (status, _) = post_json(
        &app.router,
        &format!("{base}/chat/interviewer"),
        json!({"prompt": "what is the rubric?"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let handle = app.state.sessions.get(&session_id).unwrap();
    let snapshot = handle.controller.snapshot().await;
    assert_eq!(snapshot.prompt_count_by_question["question_1"], 2);
    assert_eq!(snapshot.prompt_count_by_question["question_2"], 0);
}

#[tokio::test]
async fn unreachable_chat_collaborator_does_not_count_a_prompt() {
    // Point the assistant at a dead endpoint; everything else stays real.
    let (base_url, _calls) = common::spawn_collaborators().await;
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        scorer_url: format!("{base_url}/api/score"),
        interviewer_url: format!("{base_url}/api/interviewer"),
        assistant_url: "http://127.0.0.1:9/api/candidate".to_string(),
        compiler_url: format!("{base_url}/api/compile"),
        question_catalog: None,
        fullscreen_ack_ms: 1_000,
        collaborator_timeout_secs: 2,
    };
    let state = Arc::new(AppState::new(config).unwrap());
    let router = create_router(state.clone());

    let (status, body) = post_json(&router, "/api/v1/sessions/", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();
    let handle = state.sessions.get(&session_id).unwrap();
    pump_fullscreen(&handle);
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&router, &format!("{base}/start"), json!({})).await;

    let (status, _) = post_json(
        &router,
        &format!("{base}/chat/assistant"),
        json!({"prompt": "hello?"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let snapshot = handle.controller.snapshot().await;
    assert_eq!(snapshot.prompt_count_by_question["question_1"], 0);
    // The failure is inline; the session stays active.
    assert_eq!(snapshot.phase, Phase::Active);
}

#[tokio::test]
async fn code_runs_fail_cases_with_stderr_regardless_of_passed_flag() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());
    let base = format!("/api/v1/sessions/{session_id}");

    post_json(&app.router, &format!("{base}/start"), json!({})).await;

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/run"),
        json!({"code": "def twoSum(nums, target):\n    return [0, 1]"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["passed"], true);
    // The collaborator claimed passed: true, but stderr wins.
    assert_eq!(results[1]["passed"], false);
    assert_eq!(body["all_passed"], false);
}

#[tokio::test]
async fn input_lockdown_policy_follows_session_lifecycle() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;
    pump_fullscreen(&app.state.sessions.get(&session_id).unwrap());
    let base = format!("/api/v1/sessions/{session_id}");

    // Before start nothing is suppressed.
    let (status, body) = post_json(&app.router, &format!("{base}/input"), json!({"kind": "copy"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suppress"], false);

    post_json(&app.router, &format!("{base}/start"), json!({})).await;

    let (_, body) = post_json(&app.router, &format!("{base}/input"), json!({"kind": "copy"})).await;
    assert_eq!(body["suppress"], true);
    let (_, body) = post_json(
        &app.router,
        &format!("{base}/input"),
        json!({"kind": "key", "key": "v", "ctrl": true}),
    )
    .await;
    assert_eq!(body["suppress"], true);
    let (_, body) = post_json(
        &app.router,
        &format!("{base}/input"),
        json!({"kind": "key", "key": "z", "ctrl": true}),
    )
    .await;
    assert_eq!(body["suppress"], false);

    // After submission the restrictions are gone.
    post_json(&app.router, &format!("{base}/submit"), json!({})).await;
    let (_, body) = post_json(&app.router, &format!("{base}/input"), json!({"kind": "copy"})).await;
    assert_eq!(body["suppress"], false);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = create_test_app().await;
    let (status, _) = get_json(&app.router, "/api/v1/sessions/no-such-session/results").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post_json(
        &app.router,
        "/api/v1/sessions/no-such-session/start",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_stream_opens_with_a_snapshot_event() {
    let app = create_test_app().await;
    let session_id = create_session(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri(format!("/api/v1/sessions/{session_id}/stream"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let frame = timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("timed out waiting for first SSE frame")
        .expect("stream ended early")
        .expect("stream errored");
    let chunk = frame.into_data().expect("expected a data frame");
    let text = String::from_utf8_lossy(&chunk);
    assert!(text.contains("event: snapshot"), "got frame: {text}");
    assert!(text.contains("not_started"), "got frame: {text}");
}

#[tokio::test]
async fn health_reports_service_identity() {
    let app = create_test_app().await;
    let (status, body) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "proctordash-session-api");
    assert_eq!(body["questions"], 2);
}
