use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// What the gateway sent upstream.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
struct MockState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    replies: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
}

/// Stands in for both provider APIs. Replies are served in the order they
/// were queued; an empty queue answers `200 {}`.
pub struct MockUpstream {
    pub base_url: String,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(record).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock upstream listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock upstream listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock upstream server should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            state,
            handle,
        }
    }

    pub fn reply(&self, status: StatusCode, body: Value) {
        self.reply_raw(status, body.to_string());
    }

    pub fn reply_raw(&self, status: StatusCode, body: impl Into<String>) {
        self.state
            .replies
            .lock()
            .expect("reply queue lock")
            .push_back((status, body.into()));
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().expect("seen lock").clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.seen.lock().expect("seen lock").push(SeenRequest {
        path: uri.path().to_string(),
        query: uri.query().map(ToString::to_string),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let (status, body) = state
        .replies
        .lock()
        .expect("reply queue lock")
        .pop_front()
        .unwrap_or((StatusCode::OK, "{}".to_string()));

    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
