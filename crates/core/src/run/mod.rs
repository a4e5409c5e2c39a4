pub mod event;
mod model;
mod state;

pub use event::{ErrorOrigin, EventKind, RunStatusUpdate, StreamEvent};
pub use model::{AgentRunResponse, AgentStartRequest, AgentStartResponse, RunOptions};
pub use state::RunState;
