//! Scripted transport shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;

use a2abase_client::transport::{ApiRequest, ApiResponse, ByteStream, Transport};
use a2abase_client::{A2ABase, ClientConfig, Error, Result, RetryPolicy};

pub const TEST_KEY: &str = "pk_test:sk_secret123";

pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_KEY)
        .unwrap()
        .with_retry(RetryPolicy::none())
        .with_stream_idle_timeout(Duration::from_secs(5))
}

/// What the fake returns when a run's stream is opened
pub enum StreamScript {
    /// Yield these items, then end
    Chunks(Vec<Result<Bytes>>),
    /// Yield these chunks, then hang forever
    Hang(Vec<Bytes>),
    /// Fail to open
    Refuse(Error),
}

impl StreamScript {
    pub fn text(chunks: &[&str]) -> Self {
        Self::Chunks(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect(),
        )
    }
}

#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, VecDeque<Result<ApiResponse>>>>,
    streams: Mutex<HashMap<String, StreamScript>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply for `"METHOD path"`. Non-2xx statuses become remote errors.
    pub fn reply(&self, route: &str, status: u16, body: Value) {
        let reply = if (200..300).contains(&status) {
            Ok(ApiResponse::new(status, body.to_string()))
        } else {
            Err(Error::remote(status, body.to_string()))
        };
        self.replies
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn fail(&self, route: &str, err: Error) {
        self.replies
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(Err(err));
    }

    pub fn stream(&self, run_id: &str, script: StreamScript) {
        self.streams
            .lock()
            .unwrap()
            .insert(format!("agent-run/{}/stream", run_id), script);
    }

    /// Script the two calls a run start makes.
    pub fn start_run(&self, thread_id: &str, run_id: &str) {
        self.reply(
            &format!("POST threads/{}/messages/add", thread_id),
            200,
            serde_json::json!({
                "message_id": "m-1",
                "thread_id": thread_id,
                "type": "user",
                "content": "hello"
            }),
        );
        self.reply(
            &format!("POST thread/{}/agent/start", thread_id),
            200,
            serde_json::json!({ "agent_run_id": run_id, "status": "running" }),
        );
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    pub fn count(&self, route: &str) -> usize {
        self.routes().iter().filter(|r| r.as_str() == route).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let route = format!("{} {}", request.method, request.path);
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(Error::remote(404, format!("no route for {}", route))))
    }

    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream> {
        let script = self.streams.lock().unwrap().remove(&request.path);
        self.requests.lock().unwrap().push(request);
        match script {
            Some(StreamScript::Chunks(items)) => Ok(ByteStream::new(futures::stream::iter(items))),
            Some(StreamScript::Hang(chunks)) => Ok(ByteStream::new(
                futures::stream::iter(chunks.into_iter().map(Ok)).chain(futures::stream::pending()),
            )),
            Some(StreamScript::Refuse(err)) => Err(err),
            None => Err(Error::remote(404, "no stream scripted")),
        }
    }
}

pub fn client(fake: &Arc<FakeTransport>) -> A2ABase {
    client_with(fake, &test_config())
}

pub fn client_with(fake: &Arc<FakeTransport>, config: &ClientConfig) -> A2ABase {
    let transport: Arc<dyn Transport> = fake.clone();
    A2ABase::with_transport(transport, config)
}

pub fn agent_json(id: &str, name: &str, created_at: Option<&str>) -> Value {
    serde_json::json!({
        "agent_id": id,
        "name": name,
        "system_prompt": "You are helpful",
        "agentpress_tools": {
            "sb_files_tool": { "enabled": true, "description": "files" }
        },
        "created_at": created_at
    })
}

pub fn thread_json(id: &str) -> Value {
    serde_json::json!({ "thread_id": id, "project_id": "p-1" })
}
