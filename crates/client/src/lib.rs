//! Client for the A2ABase AI worker platform
//!
//! Define agents, open threads, start runs and consume their output as an
//! ordered stream of events:
//! - [`transport`]: HTTP calls and byte streams, with retries
//! - [`decoder`]: turns stream bytes into [`StreamEvent`]s
//! - [`RunController`]: run lifecycle, streaming, cancellation
//! - [`A2ABase`]: the entry point tying it together

pub mod client;
pub mod controller;
pub mod decoder;
pub mod resources;
pub mod stream;
pub mod transport;

pub use client::{A2ABase, Agent, AgentsApi, Thread, ThreadsApi};
pub use controller::{Run, RunController, StreamSettings};
pub use decoder::StreamDecoder;
pub use stream::RunStream;

pub use a2abase_core::agent::{AgentRecord, AgentSpec, AgentUpdate, McpServer};
pub use a2abase_core::run::{RunOptions, RunState, RunStatusUpdate, StreamEvent};
pub use a2abase_core::thread::MessageOrder;
pub use a2abase_core::tool::{Tool, ToolSet};
pub use a2abase_core::{ClientConfig, Error, Result, RetryPolicy, TimeoutKind};
