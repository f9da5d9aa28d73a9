use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use proctordash_session_api::{create_router, AppState, Config};
use proctordash_session_api::proctor::signals::{ClientDirective, EnvironmentSignal};
use proctordash_session_api::services::SessionHandle;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub scorer_calls: Arc<Mutex<Vec<Value>>>,
}

/// In-process stand-in for the scoring/chat/code-execution collaborators,
/// bound to an ephemeral port. Score calls are recorded for assertions.
pub async fn spawn_collaborators() -> (String, Arc<Mutex<Vec<Value>>>) {
    let calls: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    async fn score(
        State(calls): State<Arc<Mutex<Vec<Value>>>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        calls.lock().unwrap().push(body);
        Json(json!({
            "reply": {
                "prompt_quality": {"score": 8, "justification": "structured prompts"},
                "answer_accuracy": {"score": 7, "justification": "mostly right"},
                "creativity_innovation": {"score": 6, "justification": "sensible questions"},
                "overall": {"score": 21, "justification": "sum"}
            }
        }))
    }

    async fn chat(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["prompt"].as_str().unwrap_or_default();
        Json(json!({ "reply": format!("echo: {prompt}") }))
    }

    async fn compile(Json(_body): Json<Value>) -> Json<Value> {
        Json(json!({
            "results": [
                {"input": [[2, 7, 11, 15], 9], "expected": "[0,1]", "actual": "[0,1]", "passed": true},
                {"input": [[3, 2, 4], 6], "expected": "[1,2]", "actual": "", "stderr": "Traceback (most recent call last): ...", "passed": true}
            ]
        }))
    }

    let router = Router::new()
        .route("/api/score", post(score))
        .route("/api/interviewer", post(chat))
        .route("/api/candidate", post(chat))
        .route("/api/compile", post(compile))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock collaborator listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), calls)
}

pub async fn create_test_app_with(fullscreen_ack_ms: u64) -> TestApp {
    let (base, scorer_calls) = spawn_collaborators().await;
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        scorer_url: format!("{base}/api/score"),
        interviewer_url: format!("{base}/api/interviewer"),
        assistant_url: format!("{base}/api/candidate"),
        compiler_url: format!("{base}/api/compile"),
        question_catalog: None,
        fullscreen_ack_ms,
        collaborator_timeout_secs: 5,
    };
    let state = Arc::new(AppState::new(config).expect("failed to build app state"));
    TestApp {
        router: create_router(state.clone()),
        state,
        scorer_calls,
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(1_000).await
}

/// Simulates the browser side of the environment link: every
/// `EnterFullscreen` directive is acknowledged with a fullscreen report.
pub fn pump_fullscreen(handle: &SessionHandle) {
    let link = handle.link.clone();
    let mut directives = link.subscribe_directives();
    tokio::spawn(async move {
        while let Ok(directive) = directives.recv().await {
            if directive == ClientDirective::EnterFullscreen {
                link.report(EnvironmentSignal::Fullscreen { active: true });
            }
        }
    });
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
