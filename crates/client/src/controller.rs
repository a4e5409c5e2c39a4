//! Run controller - starts runs and owns their lifecycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{debug, info, warn};

use a2abase_core::run::{
    AgentRunResponse, AgentStartRequest, AgentStartResponse, RunOptions, RunState, StreamEvent,
};
use a2abase_core::{ClientConfig, Error, Result};

use crate::decoder::DEFAULT_MAX_RECORD_LEN;
use crate::stream::RunStream;
use crate::transport::{ApiRequest, Transport};

/// Stream limits applied to every run
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub idle_timeout: Duration,
    pub total_timeout: Option<Duration>,
    pub max_record_len: usize,
}

impl StreamSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            idle_timeout: config.stream_idle_timeout,
            total_timeout: config.stream_total_timeout,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

/// Starts runs and drives their streams
#[derive(Clone)]
pub struct RunController {
    transport: Arc<dyn Transport>,
    settings: Arc<StreamSettings>,
    stream_slots: Option<Arc<Semaphore>>,
    default_model: Arc<str>,
}

impl RunController {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            settings: Arc::new(StreamSettings::from_config(config)),
            stream_slots: config
                .max_concurrent_streams
                .map(|max| Arc::new(Semaphore::new(max.max(1)))),
            default_model: Arc::from(config.default_model.as_str()),
        }
    }

    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start a run of `agent_id` on `thread_id`.
    ///
    /// The prompt is appended to the thread, then the run is started. Returns
    /// as soon as the platform assigns a run id; the run is `Queued`.
    pub async fn start(
        &self,
        agent_id: &str,
        thread_id: &str,
        prompt: &str,
        options: &RunOptions,
    ) -> Result<Run> {
        if prompt.trim().is_empty() {
            return Err(Error::validation("Run prompt must not be empty"));
        }
        let thread_path = urlencoding::encode(thread_id);

        self.transport
            .request(
                ApiRequest::post(format!("threads/{}/messages/add", thread_path))
                    .query("message", prompt)
                    .without_status_retry(),
            )
            .await?;

        let body = AgentStartRequest::new(agent_id, &self.default_model, options);
        let response: AgentStartResponse = self
            .transport
            .request(
                ApiRequest::post(format!("thread/{}/agent/start", thread_path))
                    .json(&body)?
                    .without_status_retry(),
            )
            .await?
            .json()?;

        if response.agent_run_id.is_empty() {
            return Err(Error::remote(200, "Run start response carried an empty run id"));
        }
        info!(
            "Started run {} of agent {} on thread {}",
            response.agent_run_id, agent_id, thread_id
        );

        Ok(Run::new(
            self.clone(),
            response.agent_run_id,
            thread_id.to_string(),
            Some(agent_id.to_string()),
            Some(prompt.to_string()),
        ))
    }

    /// Handle on an existing run, e.g. one listed on a thread. Its state is
    /// unknown until refreshed or streamed, so it starts as `Queued`.
    pub fn attach(&self, run_id: impl Into<String>, thread_id: impl Into<String>) -> Run {
        Run::new(self.clone(), run_id.into(), thread_id.into(), None, None)
    }

    /// Open the run's output stream. One stream per run.
    ///
    /// Fails with `AlreadyConsumed` on a second call and with `Cancelled` for
    /// a cancelled run. A run already known to be completed or failed is not
    /// reconnected: the stream yields only its terminal status. Failing to
    /// connect is not an error here: the returned stream yields a single error
    /// event and the run becomes `Failed`.
    pub async fn get_stream(&self, run: &Run) -> Result<RunStream> {
        let inner = &run.inner;
        let consumed = || Error::AlreadyConsumed {
            run_id: inner.id.clone(),
        };
        if inner.consumed.load(Ordering::SeqCst) {
            return Err(consumed());
        }

        // Waiting for a slot must not use up the run's one stream.
        let permit = match &self.stream_slots {
            Some(slots) => Some(
                Arc::clone(slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Cancelled)?,
            ),
            None => None,
        };

        if inner.consumed.swap(true, Ordering::SeqCst) {
            return Err(consumed());
        }
        let current = *inner.state.read().await;
        match current {
            RunState::Cancelled => return Err(Error::Cancelled),
            RunState::Completed | RunState::Failed => {
                debug!("Run {} already {}; not connecting", inner.id, current);
                return Ok(RunStream::settled(run.clone(), current, &self.settings));
            }
            RunState::Queued | RunState::Active => {}
        }

        inner.streaming.store(true, Ordering::SeqCst);
        let request = ApiRequest::get(format!("agent-run/{}/stream", urlencoding::encode(&inner.id)));
        let stream = match self.transport.open_stream(request).await {
            Ok(bytes) => {
                let mut state = inner.state.write().await;
                if state.advance(RunState::Active) {
                    debug!("Run {} is active", inner.id);
                }
                RunStream::open(run.clone(), bytes, &self.settings, permit)
            }
            Err(err) => {
                warn!("Failed to open stream for run {}: {}", inner.id, err);
                let event = match err {
                    Error::Timeout { kind, after } => StreamEvent::timeout_error(
                        kind,
                        format!("no response headers within {}ms", after.as_millis()),
                    ),
                    other => StreamEvent::transport_error(format!("failed to open stream: {}", other)),
                };
                RunStream::failed(run.clone(), event, &self.settings)
            }
        };
        Ok(stream)
    }

    /// Cancel a run.
    ///
    /// Sends a best-effort stop request, then marks the run `Cancelled` and
    /// closes its stream whether or not the platform acknowledged. A stop
    /// failure is logged, not returned.
    pub async fn cancel(&self, run: &Run) -> Result<()> {
        let inner = &run.inner;
        if inner.state.read().await.is_terminal() {
            debug!("Run {} already finished; nothing to cancel", inner.id);
            return Ok(());
        }

        let request = ApiRequest::post(format!("agent-run/{}/stop", urlencoding::encode(&inner.id)));
        if let Err(err) = self.transport.request(request).await {
            warn!("Stop request for run {} failed: {}", inner.id, err);
        }

        let changed = inner.state.write().await.advance(RunState::Cancelled);
        inner.cancel_tx.send_replace(true);
        if changed {
            info!("Run {} cancelled", inner.id);
        }
        Ok(())
    }

    /// Read the run's status from the platform and apply it.
    ///
    /// Terminal states stay absorbing, and while a stream is open the stream
    /// alone decides the terminal state.
    pub async fn refresh_status(&self, run: &Run) -> Result<RunState> {
        let inner = &run.inner;
        let response: AgentRunResponse = self
            .transport
            .request(ApiRequest::get(format!("agent-run/{}", urlencoding::encode(&inner.id))))
            .await?
            .json()?;

        let mut state = inner.state.write().await;
        match RunState::from_remote(&response.status) {
            Some(remote) if remote.is_terminal() && inner.streaming.load(Ordering::SeqCst) => {
                debug!(
                    "Run {} reported {} while streaming; leaving it to the stream",
                    inner.id, remote
                );
            }
            Some(remote) => {
                if state.advance(remote) {
                    debug!("Run {} is now {}", inner.id, remote);
                }
            }
            None => warn!("Run {} has unknown remote status {:?}", inner.id, response.status),
        }
        Ok(*state)
    }
}

pub(crate) struct RunInner {
    pub(crate) id: String,
    pub(crate) thread_id: String,
    pub(crate) agent_id: Option<String>,
    pub(crate) prompt: Option<String>,
    pub(crate) state: RwLock<RunState>,
    consumed: AtomicBool,
    pub(crate) streaming: AtomicBool,
    pub(crate) cancel_tx: watch::Sender<bool>,
    controller: RunController,
}

/// Handle on one run; clones share the same state.
#[derive(Clone)]
pub struct Run {
    pub(crate) inner: Arc<RunInner>,
}

impl Run {
    fn new(
        controller: RunController,
        id: String,
        thread_id: String,
        agent_id: Option<String>,
        prompt: Option<String>,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(RunInner {
                id,
                thread_id,
                agent_id,
                prompt,
                state: RwLock::new(RunState::Queued),
                consumed: AtomicBool::new(false),
                streaming: AtomicBool::new(false),
                cancel_tx,
                controller,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn thread_id(&self) -> &str {
        &self.inner.thread_id
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.inner.agent_id.as_deref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.inner.prompt.as_deref()
    }

    pub async fn state(&self) -> RunState {
        *self.inner.state.read().await
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.inner.cancel_tx.borrow()
    }

    /// See [`RunController::get_stream`].
    pub async fn stream(&self) -> Result<RunStream> {
        self.inner.controller.get_stream(self).await
    }

    /// See [`RunController::cancel`].
    pub async fn cancel(&self) -> Result<()> {
        self.inner.controller.cancel(self).await
    }

    /// See [`RunController::refresh_status`].
    pub async fn refresh_status(&self) -> Result<RunState> {
        self.inner.controller.refresh_status(self).await
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("id", &self.inner.id)
            .field("thread_id", &self.inner.thread_id)
            .field("agent_id", &self.inner.agent_id)
            .finish()
    }
}
