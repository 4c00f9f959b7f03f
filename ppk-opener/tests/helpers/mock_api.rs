//! Mock open-box endpoint
//!
//! Answers every POST with a fixed status and body and records what it got.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const OPEN_BOX_PATH: &str = "/sandbox/v1/Access/openbox";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    /// Parsed body, or the raw text as a JSON string if it was not valid JSON
    pub body: Value,
    pub body_is_json: bool,
}

struct MockState {
    status: StatusCode,
    body: String,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockAccessApi {
    pub url: String,
    state: Arc<MockState>,
}

impl MockAccessApi {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

pub async fn start_mock_api(status: StatusCode, body: impl Into<String>) -> MockAccessApi {
    let state = Arc::new(MockState {
        status,
        body: body.into(),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route(OPEN_BOX_PATH, post(open_box))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockAccessApi {
        url: format!("http://{}{}", addr, OPEN_BOX_PATH),
        state,
    }
}

async fn open_box(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let (parsed, body_is_json) = match serde_json::from_str::<Value>(&body) {
        Ok(value) => (value, true),
        Err(_) => (Value::String(body), false),
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: header_text(header::AUTHORIZATION),
        content_type: header_text(header::CONTENT_TYPE),
        body: parsed,
        body_is_json,
    });

    (state.status, state.body.clone())
}
