//! Fake catalog API lifecycle management
//!
//! Serves a [`FakeCatalog`] over the same endpoints and paging objects as the
//! real Web API. Every test gets its own server on a random port. Failures
//! can be scripted up front: each request pops the next scripted status and
//! returns it instead of the real response.

use super::constants::*;
use super::fixtures::FakeCatalog;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

struct ServerState {
    catalog: Mutex<FakeCatalog>,
    scripted_failures: Mutex<VecDeque<StatusCode>>,
    hits: AtomicUsize,
    paths: Mutex<Vec<String>>,
}

/// Fake API instance
///
/// When dropped, the server shuts down.
pub struct FakeApiServer {
    /// Base URL for the client (e.g., "http://127.0.0.1:12345/v1")
    pub base_url: String,

    state: Arc<ServerState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeApiServer {
    /// Spawns the fake API on a random port and waits until it accepts
    /// connections.
    pub async fn spawn(catalog: FakeCatalog) -> Self {
        let state = Arc::new(ServerState {
            catalog: Mutex::new(catalog),
            scripted_failures: Mutex::new(VecDeque::new()),
            hits: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/v1/search", get(search))
            .route("/v1/artists/{id}/albums", get(artist_albums))
            .route("/v1/albums/{id}/tracks", get(album_tracks))
            .route("/v1/audio-features", get(audio_features))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}/v1", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready(port).await;
        server
    }

    async fn wait_for_ready(&self, port: u16) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Fake API did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }
            match client.get(format!("http://127.0.0.1:{}/", port)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS))
                        .await
                }
            }
        }
    }

    /// Fail the next requests with these statuses, in order.
    pub fn fail_next(&self, statuses: &[StatusCode]) {
        self.state
            .scripted_failures
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
    }

    /// Number of API requests served, scripted failures included.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Request paths with their query strings, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.state.paths.lock().unwrap().clone()
    }

    /// Mutate the served catalog.
    pub fn edit_catalog(&self, edit: impl FnOnce(&mut FakeCatalog)) {
        edit(&mut self.state.catalog.lock().unwrap());
    }
}

/// Count the request, check auth and pop a scripted failure if any.
fn intercept(state: &ServerState, headers: &HeaderMap, path: String) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.paths.lock().unwrap().push(path);

    let expected = format!("Bearer {}", TEST_TOKEN);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Some(error_response(StatusCode::UNAUTHORIZED, "Invalid access token"));
    }

    let failure = state.scripted_failures.lock().unwrap().pop_front()?;
    if failure == StatusCode::TOO_MANY_REQUESTS {
        return Some((failure, [(header::RETRY_AFTER, "0")]).into_response());
    }
    Some(error_response(failure, "Scripted failure"))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"status": status.as_u16(), "message": message}})),
    )
        .into_response()
}

fn paging_object(all: &[Value], params: &HashMap<String, String>) -> Value {
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(20);
    let offset = params
        .get("offset")
        .and_then(|o| o.parse::<usize>().ok())
        .unwrap_or(0);
    let start = offset.min(all.len());
    let end = (start + limit).min(all.len());
    let next = if end < all.len() {
        Value::String(format!("https://api.example.com/v1?offset={}&limit={}", end, limit))
    } else {
        Value::Null
    };
    json!({
        "items": &all[start..end],
        "limit": limit,
        "offset": offset,
        "total": all.len(),
        "next": next,
    })
}

fn describe(path: &str, params: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = params.iter().collect();
    keys.sort();
    let query: Vec<String> = keys.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", path, query.join("&"))
}

async fn search(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(response) = intercept(&state, &headers, describe("/search", &params)) {
        return response;
    }
    if params.get("type").map(String::as_str) != Some("artist") {
        return error_response(StatusCode::BAD_REQUEST, "Unsupported search type");
    }
    let query = params.get("q").cloned().unwrap_or_default();
    let name = query.trim_start_matches("artist:").trim().to_lowercase();

    let results = state
        .catalog
        .lock()
        .unwrap()
        .search
        .get(&name)
        .cloned()
        .unwrap_or_default();
    Json(json!({"artists": paging_object(&results, &params)})).into_response()
}

async fn artist_albums(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(artist_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = format!("/artists/{}/albums", artist_id);
    if let Some(response) = intercept(&state, &headers, describe(&path, &params)) {
        return response;
    }
    if params.get("market").map(String::as_str) != Some(TEST_MARKET) {
        return error_response(StatusCode::BAD_REQUEST, "Missing market");
    }
    let albums = state.catalog.lock().unwrap().albums.get(&artist_id).cloned();
    match albums {
        Some(albums) => Json(paging_object(&albums, &params)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Non existing id"),
    }
}

async fn album_tracks(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(album_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = format!("/albums/{}/tracks", album_id);
    if let Some(response) = intercept(&state, &headers, describe(&path, &params)) {
        return response;
    }
    let tracks = state.catalog.lock().unwrap().tracks.get(&album_id).cloned();
    match tracks {
        Some(tracks) => Json(paging_object(&tracks, &params)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Non existing id"),
    }
}

async fn audio_features(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(response) = intercept(&state, &headers, describe("/audio-features", &params)) {
        return response;
    }
    let catalog = state.catalog.lock().unwrap();
    let features: Vec<Value> = params
        .get("ids")
        .map(|ids| {
            ids.split(',')
                .map(|id| catalog.features.get(id).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({"audio_features": features})).into_response()
}
