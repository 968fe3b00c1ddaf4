//! In-process mock of the ComfyDeploy run API for integration tests.
//!
//! Serves `POST /api/run`, `GET /api/run?run_id=`, and
//! `GET /files/{name}` on an ephemeral localhost port.  Any file whose
//! name starts with `broken` answers 500.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use comfydeploy_backend::config::DeploySettings;

pub const TEST_TOKEN: &str = "test-token";
pub const RUN_ID: &str = "abc";

/// How the mock behaves for one test.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    /// Non-terminal polls answered before the run ends.
    pub running_polls: usize,
    /// Output filenames listed on the terminal poll.
    pub files: Vec<String>,
    /// Answer the submit call without a `run_id`.
    pub omit_run_id: bool,
}

pub struct MockState {
    scenario: Scenario,
    base_url: String,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub downloads: AtomicUsize,
    pub submitted_bodies: Mutex<Vec<Value>>,
    pub polled_run_ids: Mutex<Vec<String>>,
}

pub struct MockDeploy {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockDeploy {
    /// Bind to `127.0.0.1:0` and serve `scenario` in the background.
    pub async fn start(scenario: Scenario) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");

        let state = Arc::new(MockState {
            scenario,
            base_url: format!("http://{addr}"),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            submitted_bodies: Mutex::new(Vec::new()),
            polled_run_ids: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/run", get(run_status).post(submit_run))
            .route("/files/{name}", get(download_file))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self { addr, state }
    }

    /// Settings pointing at this mock with the given token.
    pub fn settings(&self, token: &str) -> DeploySettings {
        let mut settings = DeploySettings::new(token, "wf-test", "machine-test");
        settings.api_endpoint = format!("http://{}/api/run", self.addr);
        settings
    }

    pub fn submits(&self) -> usize {
        self.state.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.state.downloads.load(Ordering::SeqCst)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

async fn submit_run(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.submits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    state.submitted_bodies.lock().unwrap().push(body);

    if state.scenario.omit_run_id {
        Json(json!({"message": "queued"})).into_response()
    } else {
        Json(json!({"run_id": RUN_ID})).into_response()
    }
}

async fn run_status(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    let n = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .polled_run_ids
        .lock()
        .unwrap()
        .push(params.get("run_id").cloned().unwrap_or_default());

    if n <= state.scenario.running_polls {
        return Json(json!({"status": "running", "ended_at": null, "outputs": []})).into_response();
    }

    let images: Vec<Value> = state
        .scenario
        .files
        .iter()
        .map(|name| json!({"filename": name, "url": format!("{}/files/{name}", state.base_url)}))
        .collect();

    Json(json!({
        "status": "success",
        "ended_at": "2024-01-01T00:00:00Z",
        "outputs": [{"data": {"images": images}}],
    }))
    .into_response()
}

async fn download_file(State(state): State<Arc<MockState>>, Path(name): Path<String>) -> Response {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    if name.starts_with("broken") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "render node crashed").into_response();
    }
    name.into_bytes().into_response()
}
