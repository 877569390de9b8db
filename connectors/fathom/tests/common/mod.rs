use axum::{
    extract::{Path, Query, State},
    http::{header::RETRY_AFTER, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use omni_fathom_exporter::FathomConfig;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
}

type CannedResponse = (StatusCode, JsonValue);

#[derive(Clone, Default)]
struct MockState {
    // Keyed by cursor; "" is the first page.
    pages: Arc<Mutex<HashMap<String, JsonValue>>>,
    list_override: Arc<Mutex<Option<CannedResponse>>>,
    list_failures: Arc<Mutex<VecDeque<StatusCode>>>,
    legacy: Arc<Mutex<HashMap<String, CannedResponse>>>,
    transcripts: Arc<Mutex<HashMap<String, CannedResponse>>>,
    // Statuses served, in order, before the canned transcript response.
    transcript_failures: Arc<Mutex<HashMap<String, VecDeque<StatusCode>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockState {
    fn record(&self, path: String, query: HashMap<String, String>, headers: &HeaderMap) {
        let api_key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            path,
            query,
            api_key,
        });
    }
}

/// In-process stand-in for the Fathom API.
pub struct MockFathom {
    pub base_url: String,
    state: MockState,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockFathom {
    pub async fn start() -> anyhow::Result<Self> {
        let state = MockState::default();

        let app = Router::new()
            .route("/external/v1/meetings", get(handle_list_meetings))
            .route(
                "/external/v1/recordings/:recording_id/transcript",
                get(handle_transcript),
            )
            .route("/v1/:resource", get(handle_legacy))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _server_handle: server_handle,
        })
    }

    /// Serves `items` for `cursor` ("" for the first page).
    pub fn add_page(&self, cursor: &str, items: JsonValue, next_cursor: Option<&str>) {
        self.state.pages.lock().unwrap().insert(
            cursor.to_string(),
            json!({ "items": items, "next_cursor": next_cursor }),
        );
    }

    pub fn set_list_response(&self, status: StatusCode, body: JsonValue) {
        *self.state.list_override.lock().unwrap() = Some((status, body));
    }

    /// Queues statuses served by the next list calls, ahead of any page.
    pub fn fail_list(&self, statuses: &[StatusCode]) {
        self.state
            .list_failures
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
    }

    pub fn set_legacy_response(&self, resource: &str, status: StatusCode, body: JsonValue) {
        self.state
            .legacy
            .lock()
            .unwrap()
            .insert(resource.to_string(), (status, body));
    }

    pub fn set_transcript(&self, recording_id: &str, body: JsonValue) {
        self.set_transcript_response(recording_id, StatusCode::OK, body);
    }

    pub fn set_transcript_response(&self, recording_id: &str, status: StatusCode, body: JsonValue) {
        self.state
            .transcripts
            .lock()
            .unwrap()
            .insert(recording_id.to_string(), (status, body));
    }

    pub fn fail_transcript(&self, recording_id: &str, statuses: &[StatusCode]) {
        self.state
            .transcript_failures
            .lock()
            .unwrap()
            .insert(recording_id.to_string(), statuses.iter().copied().collect());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn config(&self, output_dir: &FsPath) -> FathomConfig {
        self.config_with(output_dir, &[])
    }

    pub fn config_with(&self, output_dir: &FsPath, extra: &[(&str, &str)]) -> FathomConfig {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("FATHOM_API_KEY".to_string(), "test-api-key".to_string()),
            ("FATHOM_API_BASE_URL".to_string(), self.base_url.clone()),
            (
                "FATHOM_OUTPUT_DIR".to_string(),
                output_dir.to_string_lossy().to_string(),
            ),
            ("FATHOM_RETRY_DELAY_MS".to_string(), "0".to_string()),
            ("FATHOM_HTTP_TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        FathomConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }
}

async fn handle_list_meetings(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record("external/v1/meetings".to_string(), query.clone(), &headers);

    let failure = state.list_failures.lock().unwrap().pop_front();
    if let Some(status) = failure {
        return (status, Json(json!({"error": "temporarily unavailable"}))).into_response();
    }

    if let Some((status, body)) = state.list_override.lock().unwrap().clone() {
        return (status, Json(body)).into_response();
    }

    let cursor = query.get("cursor").cloned().unwrap_or_default();
    match state.pages.lock().unwrap().get(&cursor) {
        Some(page) => (StatusCode::OK, Json(page.clone())).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("unknown cursor '{}'", cursor)})),
        )
            .into_response(),
    }
}

async fn handle_legacy(
    State(state): State<MockState>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(format!("v1/{}", resource), query, &headers);

    match state.legacy.lock().unwrap().get(&resource) {
        Some((status, body)) => (*status, Json(body.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response(),
    }
}

async fn handle_transcript(
    State(state): State<MockState>,
    Path(recording_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(
        format!("external/v1/recordings/{}/transcript", recording_id),
        query,
        &headers,
    );

    let failure = state
        .transcript_failures
        .lock()
        .unwrap()
        .get_mut(&recording_id)
        .and_then(|queue| queue.pop_front());

    if let Some(status) = failure {
        return match status {
            StatusCode::TOO_MANY_REQUESTS => (
                status,
                [(RETRY_AFTER, "0")],
                "Currently, you are able to make a maximum of 60 calls to the API in a 60 second window.",
            )
                .into_response(),
            _ => (status, Json(json!({"error": "temporarily unavailable"}))).into_response(),
        };
    }

    match state.transcripts.lock().unwrap().get(&recording_id) {
        Some((status, body)) => (*status, Json(body.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "no transcript"}))).into_response(),
    }
}
