use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-run knobs sent when a run starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Overrides the client's default model
    pub model: Option<String>,
    pub enable_thinking: Option<bool>,
    pub reasoning_effort: Option<String>,
    pub enable_context_manager: Option<bool>,
}

impl RunOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_thinking(mut self, effort: impl Into<String>) -> Self {
        self.enable_thinking = Some(true);
        self.reasoning_effort = Some(effort.into());
        self
    }
}

/// Body of `POST /thread/{id}/agent/start`
#[derive(Debug, Clone, Serialize)]
pub struct AgentStartRequest {
    pub agent_id: String,
    pub model_name: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_context_manager: Option<bool>,
}

impl AgentStartRequest {
    pub fn new(agent_id: impl Into<String>, default_model: &str, options: &RunOptions) -> Self {
        Self {
            agent_id: agent_id.into(),
            model_name: options
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            stream: true,
            enable_thinking: options.enable_thinking,
            reasoning_effort: options.reasoning_effort.clone(),
            enable_context_manager: options.enable_context_manager,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStartResponse {
    pub agent_run_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `GET /agent-run/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResponse {
    #[serde(alias = "agent_run_id")]
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}
