//! Exercises the client against a local HTTP server

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use compute_module_client::{ModuleClient, TransportError};
use compute_module_core::domain::connection::Endpoints;
use compute_module_core::dto::schema::{DataType, PrimitiveType, SchemaCatalogEntry, StructType};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    auth: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ServerState {
    fn record(&self, path: String, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            path,
            auth: header("module-auth-token"),
            content_type: header("content-type"),
            body: body.to_vec(),
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn job(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.record("/job".to_string(), &headers, &[]);
    Json(json!({
        "type": "computeModuleJobV1",
        "computeModuleJobV1": { "jobId": "job-7", "queryType": "greet", "query": "Ada" }
    }))
}

async fn no_job() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn result(
    State(state): State<ServerState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.record(format!("/results/{}", job_id), &headers, &body);
    if job_id == "rejected" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn schemas(State(state): State<ServerState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    state.record("/schemas".to_string(), &headers, &body);
    StatusCode::OK
}

async fn serve() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/job", get(job))
        .route("/empty", get(no_job))
        .route("/results/{job_id}", post(result))
        .route("/schemas", post(schemas))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn client(base: &str, job_path: &str) -> ModuleClient {
    ModuleClient::new(Endpoints {
        get_job_url: format!("{}{}", base, job_path),
        post_result_url: format!("{}/results", base),
        post_schema_url: Some(format!("{}/schemas", base)),
        auth_token: "module-token".to_string(),
        trust_store: None,
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_job_parses_envelope_and_sends_auth() {
    let (base, state) = serve().await;
    let client = client(&base, "/job");

    let job = client.fetch_job().await.unwrap().expect("job");
    assert_eq!(job.job_id, "job-7");
    assert_eq!(job.query_type, "greet");
    assert_eq!(job.query, json!("Ada"));

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].auth.as_deref(), Some("module-token"));
}

#[tokio::test]
async fn test_fetch_job_non_200_is_no_job() {
    let (base, _state) = serve().await;

    let empty = client(&base, "/empty");
    assert!(empty.fetch_job().await.unwrap().is_none());

    let missing = client(&base, "/does-not-exist");
    assert!(missing.fetch_job().await.unwrap().is_none());
}

#[tokio::test]
async fn test_post_result_uses_octet_stream() {
    let (base, state) = serve().await;
    let client = client(&base, "/job");

    client.post_result("job-7", &json!("Hello Ada")).await.unwrap();

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/results/job-7");
    assert_eq!(requests[0].auth.as_deref(), Some("module-token"));
    assert_eq!(
        requests[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(requests[0].body, b"Hello Ada");
}

#[tokio::test]
async fn test_post_result_failure_carries_status() {
    let (base, _state) = serve().await;
    let client = client(&base, "/job");

    let err = client.post_result("rejected", &json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::ApiError { status: 500, .. }));
    assert!(err.is_server_error());
}

#[tokio::test]
async fn test_post_schema_catalog_sends_json_array() {
    let (base, state) = serve().await;
    let client = client(&base, "/job");

    let entries = vec![SchemaCatalogEntry {
        name: "greet".to_string(),
        input_type: StructType::default(),
        output_type: DataType::primitive(PrimitiveType::String),
    }];
    client.post_schema_catalog(&entries).await.unwrap();

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body[0]["name"], "greet");
    assert_eq!(body[0]["outputType"]["primitiveType"], "STRING");
}
