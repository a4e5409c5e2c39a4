//! High-level entry point

use std::sync::Arc;

use tracing::info;

use a2abase_core::agent::{AgentRecord, AgentSpec, AgentUpdate, AgentsResponse, ListAgentsParams};
use a2abase_core::run::RunOptions;
use a2abase_core::thread::{Message, MessageCreateRequest, MessageOrder, ThreadRecord, ThreadsResponse};
use a2abase_core::{ClientConfig, Result};

use crate::controller::{Run, RunController};
use crate::resources::{AgentsClient, ThreadsClient};
use crate::transport::{HttpTransport, Transport};

/// Client for the A2ABase platform.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct A2ABase {
    agents: AgentsClient,
    threads: ThreadsClient,
    runs: RunController,
}

impl A2ABase {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        info!(
            "A2ABase client for {} (key {})",
            config.base_url,
            config.api_key.public_id()
        );
        Ok(Self::with_transport(Arc::new(transport), &config))
    }

    /// Build from `A2ABASE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Use a custom transport, e.g. a scripted one in tests.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            agents: AgentsClient::new(Arc::clone(&transport)),
            threads: ThreadsClient::new(Arc::clone(&transport)),
            runs: RunController::new(transport, config),
        }
    }

    pub fn agents(&self) -> AgentsApi {
        AgentsApi {
            client: self.agents.clone(),
            threads: self.threads.clone(),
            runs: self.runs.clone(),
        }
    }

    pub fn threads(&self) -> ThreadsApi {
        ThreadsApi {
            client: self.threads.clone(),
            runs: self.runs.clone(),
        }
    }

    pub fn runs(&self) -> &RunController {
        &self.runs
    }
}

#[derive(Clone)]
pub struct AgentsApi {
    client: AgentsClient,
    threads: ThreadsClient,
    runs: RunController,
}

impl AgentsApi {
    pub async fn create(&self, spec: &AgentSpec) -> Result<Agent> {
        let record = self.client.create(spec).await?;
        Ok(self.handle(record))
    }

    pub async fn get(&self, agent_id: &str) -> Result<Agent> {
        let record = self.client.get(agent_id).await?;
        Ok(self.handle(record))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Agent>> {
        Ok(self.client.find_by_name(name).await?.map(|record| self.handle(record)))
    }

    /// Reuse the agent named `spec.name` if it exists, else create it.
    pub async fn find_or_create(&self, spec: &AgentSpec) -> Result<Agent> {
        spec.validate()?;
        match self.find_by_name(&spec.name).await? {
            Some(agent) => Ok(agent),
            None => self.create(spec).await,
        }
    }

    pub async fn list(&self, params: &ListAgentsParams) -> Result<AgentsResponse> {
        self.client.list(params).await
    }

    fn handle(&self, record: AgentRecord) -> Agent {
        Agent {
            record: Arc::new(record),
            client: self.client.clone(),
            runs: self.runs.clone(),
            threads: self.threads.clone(),
        }
    }
}

/// An agent on the platform, as last fetched
#[derive(Clone)]
pub struct Agent {
    record: Arc<AgentRecord>,
    client: AgentsClient,
    threads: ThreadsClient,
    runs: RunController,
}

impl Agent {
    pub fn id(&self) -> &str {
        &self.record.agent_id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &AgentRecord {
        &self.record
    }

    /// Start a run of this agent on `thread` with the default model.
    pub async fn run(&self, prompt: &str, thread: &Thread) -> Result<Run> {
        self.run_with(prompt, thread, &RunOptions::default()).await
    }

    pub async fn run_with(&self, prompt: &str, thread: &Thread, options: &RunOptions) -> Result<Run> {
        self.runs.start(self.id(), thread.id(), prompt, options).await
    }

    /// Start a run on a fresh, unnamed thread.
    pub async fn run_in_new_thread(&self, prompt: &str) -> Result<(Thread, Run)> {
        let created = self.threads.create(None).await?;
        let thread = Thread {
            id: Arc::from(created.thread_id.as_str()),
            client: self.threads.clone(),
            runs: self.runs.clone(),
        };
        let run = self.run(prompt, &thread).await?;
        Ok((thread, run))
    }

    /// Fetch the current record from the platform.
    pub async fn details(&self) -> Result<AgentRecord> {
        self.client.get(self.id()).await
    }

    /// Apply `update`, returning a handle on the updated agent.
    pub async fn update(&self, update: &AgentUpdate) -> Result<Agent> {
        let record = self.client.update(self.id(), update).await?;
        Ok(Agent {
            record: Arc::new(record),
            client: self.client.clone(),
            threads: self.threads.clone(),
            runs: self.runs.clone(),
        })
    }

    pub async fn delete(&self) -> Result<()> {
        self.client.delete(self.id()).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.record.agent_id)
            .field("name", &self.record.name)
            .finish()
    }
}

#[derive(Clone)]
pub struct ThreadsApi {
    client: ThreadsClient,
    runs: RunController,
}

impl ThreadsApi {
    pub async fn create(&self, name: Option<&str>) -> Result<Thread> {
        let created = self.client.create(name).await?;
        Ok(self.handle(&created.thread_id))
    }

    /// Fetch a thread; fails with `NotFound` if it does not exist.
    pub async fn get(&self, thread_id: &str) -> Result<Thread> {
        let record = self.client.get(thread_id).await?;
        Ok(self.handle(&record.thread_id))
    }

    pub async fn delete(&self, thread_id: &str) -> Result<()> {
        self.client.delete(thread_id).await
    }

    pub async fn list(&self, page: Option<u32>, limit: Option<u32>) -> Result<ThreadsResponse> {
        self.client.list(page, limit).await
    }

    fn handle(&self, thread_id: &str) -> Thread {
        Thread {
            id: Arc::from(thread_id),
            client: self.client.clone(),
            runs: self.runs.clone(),
        }
    }
}

/// A conversation runs read from and append to
#[derive(Clone)]
pub struct Thread {
    id: Arc<str>,
    client: ThreadsClient,
    runs: RunController,
}

impl Thread {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn add_message(&self, message: &str) -> Result<Message> {
        self.client.add_message(&self.id, message).await
    }

    pub async fn create_message(&self, request: &MessageCreateRequest) -> Result<Message> {
        self.client.create_message(&self.id, request).await
    }

    pub async fn messages(&self, order: MessageOrder) -> Result<Vec<Message>> {
        self.client.messages(&self.id, order).await
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.client.delete_message(&self.id, message_id).await
    }

    pub async fn details(&self) -> Result<ThreadRecord> {
        self.client.get(&self.id).await
    }

    /// Handles on the runs the platform lists for this thread, newest first.
    /// Their state is `Queued` until refreshed.
    pub async fn runs(&self) -> Result<Vec<Run>> {
        let record = self.client.get(&self.id).await?;
        Ok(record
            .recent_run_ids()
            .into_iter()
            .map(|run_id| self.runs.attach(run_id, self.id.to_string()))
            .collect())
    }

    pub async fn delete(&self) -> Result<()> {
        self.client.delete(&self.id).await
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread").field("id", &self.id).finish()
    }
}
