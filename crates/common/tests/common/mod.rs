//! In-process stand-in for the design-time file API, served by axum on a
//! loopback port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use percent_encoding::percent_decode_str;
use serde_json::json;
use url::Url;

use common::remote::{RemoteConfig, CSRF_TOKEN_HEADER};

pub const USERNAME: &str = "dev";
pub const PASSWORD: &str = "s3cret";

#[derive(Debug, Clone)]
pub enum Node {
    File(Vec<u8>),
    Dir(Vec<(String, bool)>),
    /// Served verbatim for every kind of request
    Raw(String),
}

/// How the token handshake answers
#[derive(Debug, Clone, Copy)]
pub enum Handshake {
    Issue,
    Fail(StatusCode),
    Unsafe,
}

pub struct ServiceState {
    token: Mutex<String>,
    issued: AtomicUsize,
    handshake: Mutex<Handshake>,
    reject_all: AtomicBool,
    nodes: Mutex<HashMap<String, Node>>,
    pub refreshes: AtomicUsize,
    pub file_requests: AtomicUsize,
    pub last_authorization: Mutex<Option<String>>,
}

impl ServiceState {
    pub fn expire_token(&self) {
        *self.token.lock().unwrap() = "expired-on-server".to_string();
    }

    pub fn set_handshake(&self, handshake: Handshake) {
        *self.handshake.lock().unwrap() = handshake;
    }

    /// Demand a fresh token on every file request, valid or not
    pub fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, path: &str, node: Node) {
        self.nodes.lock().unwrap().insert(path.to_string(), node);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn file_requests(&self) -> usize {
        self.file_requests.load(Ordering::SeqCst)
    }
}

pub struct FakeService {
    pub addr: SocketAddr,
    pub state: Arc<ServiceState>,
}

impl FakeService {
    pub async fn start(handshake: Handshake) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let state = Arc::new(ServiceState {
            token: Mutex::new(String::new()),
            issued: AtomicUsize::new(0),
            handshake: Mutex::new(handshake),
            reject_all: AtomicBool::new(false),
            nodes: Mutex::new(default_tree()),
            refreshes: AtomicUsize::new(0),
            file_requests: AtomicUsize::new(0),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .fallback(dispatch)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn config(&self) -> RemoteConfig {
        let url = Url::parse(&format!(
            "http://{}:{}@{}",
            USERNAME, PASSWORD, self.addr
        ))
        .unwrap();
        RemoteConfig::new(url)
    }
}

fn default_tree() -> HashMap<String, Node> {
    let mut nodes = HashMap::new();
    nodes.insert(
        "/".to_string(),
        Node::Dir(vec![("pkg".to_string(), true)]),
    );
    nodes.insert(
        "/pkg".to_string(),
        Node::Dir(vec![("a.txt".to_string(), false), ("sub".to_string(), true)]),
    );
    nodes.insert("/pkg/a.txt".to_string(), Node::File(b"hello world".to_vec()));
    nodes.insert("/pkg/sub".to_string(), Node::Dir(Vec::new()));
    nodes
}

async fn dispatch(
    State(state): State<Arc<ServiceState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy().into_owned();
    let path = path.as_str();
    if path == "/sap/hana/xs/dt/base/info" && method == Method::HEAD {
        return info(&state, &headers);
    }

    match path.strip_prefix("/sap/hana/xs/dt/base/file") {
        Some(rest) if method == Method::GET => {
            let file_path = if rest.is_empty() { "/" } else { rest };
            let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
                .map(|Query(query)| query)
                .unwrap_or_default();
            serve(&state, file_path, &query, &headers)
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn info(state: &ServiceState, headers: &HeaderMap) -> Response {
    state.refreshes.fetch_add(1, Ordering::SeqCst);

    let asked = headers
        .get(CSRF_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if asked != "fetch" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let handshake = *state.handshake.lock().unwrap();
    match handshake {
        Handshake::Issue => {
            let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let token = format!("token-{n}");
            *state.token.lock().unwrap() = token.clone();
            (StatusCode::OK, [(CSRF_TOKEN_HEADER, token)]).into_response()
        }
        Handshake::Fail(status) => status.into_response(),
        Handshake::Unsafe => (StatusCode::OK, [(CSRF_TOKEN_HEADER, "unsafe")]).into_response(),
    }
}

fn serve(
    state: &ServiceState,
    path: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Response {
    state.file_requests.fetch_add(1, Ordering::SeqCst);

    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if authorization.is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    *state.last_authorization.lock().unwrap() = authorization;

    let presented = headers
        .get(CSRF_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let current = state.token.lock().unwrap().clone();
    if state.reject_all.load(Ordering::SeqCst) || presented != current {
        return (StatusCode::FORBIDDEN, [(CSRF_TOKEN_HEADER, "Required")]).into_response();
    }

    let node = state.nodes.lock().unwrap().get(path).cloned();
    let Some(node) = node else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    let depth = query.get("depth").map(String::as_str);
    let meta = query.get("parts").map(String::as_str) == Some("meta");

    match (node, depth) {
        (Node::Raw(body), _) => body.into_response(),
        (Node::Dir(_), Some("0")) if meta => Json(json!({
            "Name": name,
            "Directory": true,
            "LocalTimeStamp": 1_700_000_000_000_i64,
            "Attributes": {"ReadOnly": false, "Executable": true},
        }))
        .into_response(),
        (Node::File(_), Some("0")) if meta => Json(json!({
            "Name": name,
            "Directory": false,
            "LocalTimeStamp": 1_700_000_000_000_i64,
            "Attributes": {"ReadOnly": false, "Executable": true, "SapBackPack": {"Activated": true}},
        }))
        .into_response(),
        (Node::Dir(children), Some("1")) => {
            let children: Vec<_> = children
                .iter()
                .map(|(child, directory)| {
                    let child_path = if path == "/" {
                        format!("/{child}")
                    } else {
                        format!("{path}/{child}")
                    };
                    json!({
                        "Name": child,
                        "ContentLocation": format!("/sap/hana/xs/dt/base/file{child_path}"),
                        "Directory": directory,
                    })
                })
                .collect();
            Json(json!({"Name": name, "Directory": true, "Children": children})).into_response()
        }
        (Node::File(content), None) => content.into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}
