//! Event stream of a single run

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::Stream;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use a2abase_core::run::{RunState, RunStatusUpdate, StreamEvent};
use a2abase_core::TimeoutKind;

use crate::controller::{Run, StreamSettings};
use crate::decoder::StreamDecoder;
use crate::transport::ByteStream;

enum Step {
    Cancelled,
    Deadline,
    Idle,
    Chunk(a2abase_core::Result<Option<bytes::Bytes>>),
}

/// Ordered events of one run.
///
/// Every event is applied to the run's state before it is handed out, so
/// `run.state()` never lags behind what the consumer has seen. After the
/// first terminal event, or once the run is cancelled, no more events are
/// yielded.
pub struct RunStream {
    run: Run,
    bytes: Option<ByteStream>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    cancel_rx: watch::Receiver<bool>,
    idle_timeout: Duration,
    deadline: Option<Instant>,
    total_timeout: Option<Duration>,
    finished: bool,
    /// Replays a terminal state recorded before the stream was requested
    settled: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl RunStream {
    pub(crate) fn open(
        run: Run,
        bytes: ByteStream,
        settings: &StreamSettings,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        debug!("Streaming run {}", run.id());
        let mut stream = Self::with_parts(run, Some(bytes), settings);
        stream._permit = permit;
        stream
    }

    /// A stream that only yields `event`, for runs whose stream never opened.
    pub(crate) fn failed(run: Run, event: StreamEvent, settings: &StreamSettings) -> Self {
        let mut stream = Self::with_parts(run, None, settings);
        stream.pending.push_back(event);
        stream
    }

    /// A stream for a run that already ended: only its terminal status.
    pub(crate) fn settled(run: Run, state: RunState, settings: &StreamSettings) -> Self {
        let status = match state {
            RunState::Failed => RunStatusUpdate::Failed,
            RunState::Cancelled => RunStatusUpdate::Cancelled,
            _ => RunStatusUpdate::Completed,
        };
        let mut stream = Self::with_parts(run, None, settings);
        stream.pending.push_back(StreamEvent::Status {
            status,
            message: Some("run already finished".to_string()),
        });
        stream.settled = true;
        stream
    }

    fn with_parts(run: Run, bytes: Option<ByteStream>, settings: &StreamSettings) -> Self {
        let cancel_rx = run.inner.cancel_tx.subscribe();
        Self {
            run,
            bytes,
            decoder: StreamDecoder::with_max_record_len(settings.max_record_len),
            pending: VecDeque::new(),
            cancel_rx,
            idle_timeout: settings.idle_timeout,
            deadline: settings.total_timeout.map(|total| Instant::now() + total),
            total_timeout: settings.total_timeout,
            finished: false,
            settled: false,
            _permit: None,
        }
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if self.finished {
                return None;
            }
            if *self.cancel_rx.borrow() {
                debug!("Run {} cancelled; closing stream", self.run.id());
                self.finish();
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                if self.apply(&event).await {
                    return Some(event);
                }
                continue;
            }
            if self.bytes.is_none() {
                // Source already released without a terminal event.
                self.finish();
                return None;
            }

            match self.read().await {
                Step::Cancelled => continue,
                Step::Deadline => {
                    let after = self.total_timeout.unwrap_or_default();
                    warn!("Run {} exceeded total stream time of {:?}", self.run.id(), after);
                    self.abort(StreamEvent::timeout_error(
                        TimeoutKind::Total,
                        format!("run still streaming after {}ms", after.as_millis()),
                    ));
                }
                Step::Idle => {
                    warn!(
                        "Run {} sent nothing for {:?}; giving up",
                        self.run.id(),
                        self.idle_timeout
                    );
                    self.abort(StreamEvent::timeout_error(
                        TimeoutKind::Idle,
                        format!("no data for {}ms", self.idle_timeout.as_millis()),
                    ));
                }
                Step::Chunk(Ok(Some(chunk))) => {
                    trace!("Run {} received {} bytes", self.run.id(), chunk.len());
                    let mut events = Vec::new();
                    let decoded = self.decoder.feed(&chunk, &mut events);
                    self.pending.extend(events);
                    if let Err(err) = decoded {
                        warn!("Run {} stream is undecodable: {}", self.run.id(), err);
                        self.abort(StreamEvent::transport_error(format!(
                            "stream undecodable: {}",
                            err
                        )));
                    }
                }
                Step::Chunk(Ok(None)) => {
                    let mut events = Vec::new();
                    let flushed = self.decoder.finish(&mut events);
                    self.pending.extend(events);
                    let message = match flushed {
                        Ok(()) => "stream closed before the run finished".to_string(),
                        Err(err) => format!("stream undecodable: {}", err),
                    };
                    debug!("Run {} stream reached end of input", self.run.id());
                    self.abort(StreamEvent::transport_error(message));
                }
                Step::Chunk(Err(err)) if err.is_cancelled() => {
                    self.finish();
                    return None;
                }
                Step::Chunk(Err(err)) => {
                    warn!("Run {} stream dropped: {}", self.run.id(), err);
                    self.abort(StreamEvent::transport_error(format!(
                        "stream disconnected: {}",
                        err
                    )));
                }
            }
        }
    }

    async fn read(&mut self) -> Step {
        let Some(bytes) = self.bytes.as_mut() else {
            return Step::Chunk(Ok(None));
        };
        let cancel_rx = &mut self.cancel_rx;
        let deadline = self.deadline;
        let idle = self.idle_timeout;

        tokio::select! {
            _ = cancel_rx.changed() => Step::Cancelled,
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => Step::Deadline,
            read = tokio::time::timeout(idle, bytes.next_chunk()) => match read {
                Ok(chunk) => Step::Chunk(chunk),
                Err(_) => Step::Idle,
            },
        }
    }

    /// Drop the connection and queue `event` as the stream's last word.
    /// Events decoded before the failure still come first.
    fn abort(&mut self, event: StreamEvent) {
        if let Some(mut bytes) = self.bytes.take() {
            bytes.close();
        }
        self.pending.push_back(event);
    }

    /// Apply `event` to the run state. Returns false if it must not be
    /// delivered because the run already ended.
    async fn apply(&mut self, event: &StreamEvent) -> bool {
        let inner = &self.run.inner;
        let mut state = inner.state.write().await;
        if state.is_terminal() {
            if self.settled && event.terminal_state() == Some(*state) {
                drop(state);
                self.finish();
                return true;
            }
            debug!(
                "Run {} already {}; dropping {} event",
                inner.id,
                *state,
                event.kind()
            );
            drop(state);
            self.finish();
            return false;
        }

        match event.terminal_state() {
            Some(terminal) => {
                state.advance(terminal);
                info!("Run {} finished: {}", inner.id, terminal);
                drop(state);
                self.finish();
            }
            None => {
                if state.advance(RunState::Active) {
                    debug!("Run {} is active", inner.id);
                }
            }
        }
        true
    }

    fn finish(&mut self) {
        self.finished = true;
        self.pending.clear();
        if let Some(mut bytes) = self.bytes.take() {
            bytes.close();
        }
        self._permit = None;
        self.run.inner.streaming.store(false, Ordering::SeqCst);
    }

    /// Stop reading. Leaves the run state alone; use
    /// [`Run::refresh_status`] to learn how the run ended.
    pub fn close(&mut self) {
        if !self.finished {
            debug!("Closing stream of run {}", self.run.id());
            self.finish();
        }
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|event| (event, stream))
        })
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        self.run.inner.streaming.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for RunStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStream")
            .field("run_id", &self.run.id())
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish()
    }
}
