#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use shortreels_core::{
    ApiClient, ClientConfig, Session, ViewReceiver,
    api::{ApiRequest, ApiResponse, Method, Transport},
    error::ApiError,
    view_channel,
};
use tempfile::TempDir;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    /// Never answers; the per-call timeout fires
    Hang,
    NetworkError,
}

pub fn ok(body: Value) -> Reply {
    Reply::Json(200, body)
}

pub fn status(code: u16) -> Reply {
    Reply::Json(code, json!({ "detail": format!("status {}", code) }))
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub at: Instant,
}

struct Route {
    method: Method,
    prefix: String,
    replies: VecDeque<Reply>,
}

/// In-memory backend. Each route answers with its scripted replies in order
/// and keeps repeating the last one.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script `prefix`, replacing any earlier script for it.
    pub fn on(&self, method: Method, prefix: &str, replies: Vec<Reply>) {
        assert!(!replies.is_empty());
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|r| !(r.method == method && r.prefix == prefix));
        routes.push(Route {
            method,
            prefix: prefix.to_string(),
            replies: replies.into(),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .count()
    }

    pub fn bodies(&self, prefix: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .filter_map(|c| c.body.clone())
            .collect()
    }

    fn next_reply(&self, request: &ApiRequest) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.path.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())?;
        if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.calls.lock().unwrap().push(Call {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
            at: Instant::now(),
        });

        match self.next_reply(&request) {
            Some(Reply::Json(status, body)) => Ok(ApiResponse {
                status,
                body: serde_json::to_vec(&body).unwrap(),
            }),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::NetworkError) => Err(ApiError::Network("connection reset".into())),
            None => Ok(ApiResponse {
                status: 404,
                body: br#"{"detail":"Not Found"}"#.to_vec(),
            }),
        }
    }
}

pub struct Harness {
    pub session: Session,
    pub view: ViewReceiver,
    pub transport: Arc<FakeTransport>,
    pub dir: TempDir,
}

pub fn harness() -> Harness {
    let transport = FakeTransport::new();
    let dir = tempfile::tempdir().unwrap();
    let (tx, view) = view_channel();
    let session = Session::new(client(&transport, &dir), tx);
    Harness {
        session,
        view,
        transport,
        dir,
    }
}

pub fn client(transport: &Arc<FakeTransport>, dir: &TempDir) -> ApiClient {
    let config = ClientConfig::with_host("http://localhost:8000", dir.path()).unwrap();
    ApiClient::with_transport(config, transport.clone())
}

pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

pub fn processing() -> Reply {
    ok(json!({ "status": "processing", "current_step": "collecting_assets", "progress": 10 }))
}

pub fn completed(request_id: &str) -> Reply {
    ok(json!({
        "status": "completed",
        "watermarked_url": format!("/api/serve-video/{}?watermarked=true", request_id),
    }))
}
