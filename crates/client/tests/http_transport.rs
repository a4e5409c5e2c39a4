use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};

use a2abase_client::{
    A2ABase, AgentSpec, ClientConfig, Error, RetryPolicy, RunState, RunStatusUpdate, StreamEvent,
};

const KEY: &str = "pk_live1:sk_topsecret";

type Hits = Arc<AtomicUsize>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig::new(KEY)
        .unwrap()
        .with_base_url(base_url)
        .unwrap()
        .with_request_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            factor: 2.0,
            jitter: 0.0,
        })
}

fn agent_body() -> Value {
    json!({ "agent_id": "a-1", "name": "Helper", "system_prompt": "prompt" })
}

async fn flaky_create(State(hits): State<Hits>, headers: HeaderMap) -> Response {
    assert_eq!(headers["x-api-key"], KEY);
    assert_eq!(headers["authorization"], format!("Bearer {}", KEY).as_str());
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        return (StatusCode::INTERNAL_SERVER_ERROR, "try again").into_response();
    }
    Json(agent_body()).into_response()
}

async fn always(State(hits): State<Hits>, status: StatusCode) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (status, Json(json!({ "detail": "nope" }))).into_response()
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let hits = Hits::default();
    let app = Router::new()
        .route("/api/agents", post(flaky_create))
        .with_state(hits.clone());
    let sdk = A2ABase::new(config(&serve(app).await)).unwrap();

    let agent = sdk
        .agents()
        .create(&AgentSpec::new("Helper", "prompt"))
        .await
        .unwrap();
    assert_eq!(agent.id(), "a-1");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_remote_error() {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/api/agents",
            post(|state: State<Hits>| always(state, StatusCode::SERVICE_UNAVAILABLE)),
        )
        .with_state(hits.clone());
    let sdk = A2ABase::new(config(&serve(app).await)).unwrap();

    let err = sdk
        .agents()
        .create(&AgentSpec::new("Helper", "prompt"))
        .await
        .unwrap_err();
    match err {
        Error::Remote { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "nope");
        }
        other => panic!("expected remote error, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/api/agents/a-1",
            get(|state: State<Hits>| always(state, StatusCode::NOT_FOUND)),
        )
        .with_state(hits.clone());
    let sdk = A2ABase::new(config(&serve(app).await)).unwrap();

    let err = sdk.agents().get("a-1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_host_reports_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sdk = A2ABase::new(config(&format!("http://{}/api", addr))).unwrap();
    let err = sdk.agents().get("a-1").await.unwrap_err();
    assert_eq!(err.status(), None);
    assert!(matches!(err, Error::Remote { status: 0, .. }));
}

fn run_routes(stream: Router<()>) -> Router {
    Router::new()
        .route(
            "/api/threads/t-1/messages/add",
            post(|| async {
                Json(json!({ "message_id": "m-1", "thread_id": "t-1", "type": "user" }))
            }),
        )
        .route(
            "/api/thread/t-1/agent/start",
            post(|| async { Json(json!({ "agent_run_id": "r-1", "status": "running" })) }),
        )
        .merge(stream)
}

#[tokio::test]
async fn test_stream_over_http() {
    let stream = Router::new().route(
        "/api/agent-run/r-1/stream",
        get(|| async {
            let chunks = futures::stream::iter(vec![
                Ok::<_, io::Error>(Bytes::from_static(b"tok:hi\ntok:the")),
                Ok(Bytes::from_static(b"re\nstatus:done\n")),
            ]);
            Body::from_stream(chunks)
        }),
    );
    let sdk = A2ABase::new(config(&serve(run_routes(stream)).await)).unwrap();

    let run = sdk
        .runs()
        .start("a-1", "t-1", "say hi", &Default::default())
        .await
        .unwrap();
    let events: Vec<_> = run.stream().await.unwrap().into_stream().collect().await;

    assert_eq!(
        events,
        vec![
            StreamEvent::token("hi"),
            StreamEvent::token("there"),
            StreamEvent::status(RunStatusUpdate::Completed),
        ]
    );
    assert_eq!(run.state().await, RunState::Completed);
}

#[tokio::test]
async fn test_stream_dropped_mid_run() {
    let stream = Router::new().route(
        "/api/agent-run/r-1/stream",
        get(|| async {
            let head = futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(
                b"tok:partial\n",
            ))]);
            let tail = futures::stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            });
            Body::from_stream(head.chain(tail))
        }),
    );
    let sdk = A2ABase::new(config(&serve(run_routes(stream)).await)).unwrap();

    let run = sdk
        .runs()
        .start("a-1", "t-1", "work", &Default::default())
        .await
        .unwrap();
    let events: Vec<_> = run.stream().await.unwrap().into_stream().collect().await;

    assert_eq!(events.first(), Some(&StreamEvent::token("partial")));
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
    assert_eq!(run.state().await, RunState::Failed);
}

type Seen = Arc<std::sync::Mutex<Vec<String>>>;

async fn record_content_type(State(seen): State<Seen>, headers: HeaderMap, body: String) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push(format!("{} {}", content_type, body));
    Json(json!({ "thread_id": "t-1", "agent_id": "a-1", "name": "Helper" })).into_response()
}

#[tokio::test]
async fn test_bodies_carry_matching_content_type() {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/threads", post(record_content_type))
        .route("/api/agents", post(record_content_type))
        .with_state(seen.clone());
    let sdk = A2ABase::new(config(&serve(app).await)).unwrap();

    let thread = sdk.threads().create(Some("named")).await.unwrap();
    assert_eq!(thread.id(), "t-1");
    sdk.agents()
        .create(&AgentSpec::new("Helper", "prompt"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], "application/x-www-form-urlencoded name=named");
    assert!(seen[1].starts_with("application/json {"));
}

#[tokio::test]
async fn test_run_start_is_not_repeated_after_server_error() {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/api/threads/t-1/messages/add",
            post(|| async { Json(json!({ "message_id": "m-1", "thread_id": "t-1", "type": "user" })) }),
        )
        .route(
            "/api/thread/t-1/agent/start",
            post(|state: State<Hits>| always(state, StatusCode::INTERNAL_SERVER_ERROR)),
        )
        .with_state(hits.clone());
    let sdk = A2ABase::new(config(&serve(app).await)).unwrap();

    let err = sdk
        .runs()
        .start("a-1", "t-1", "once only", &Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
