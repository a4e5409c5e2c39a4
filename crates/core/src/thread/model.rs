//! Thread model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Pagination;

/// Reference to a run recorded on a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRef {
    #[serde(default, alias = "agent_run_id")]
    pub id: Option<String>,
}

/// A thread as the platform returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub is_public: bool,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub recent_agent_runs: Vec<RunRef>,
}

impl ThreadRecord {
    /// Ids of the runs the platform lists for this thread, newest first
    pub fn recent_run_ids(&self) -> Vec<String> {
        self.recent_agent_runs
            .iter()
            .filter_map(|run| run.id.clone())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// Body of `POST /threads`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThreadResponse {
    pub thread_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Body of `GET /threads`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsResponse {
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub threads: Vec<ThreadRecord>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub pagination: Pagination,
}

/// Kind of a stored thread message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Assistant,
    Tool,
    Status,
    AssistantResponseEnd,
    #[serde(untagged)]
    Other(String),
}

/// A message stored on a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub thread_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub is_llm_message: bool,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `GET /threads/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub messages: Vec<Message>,
}

/// Body of `POST /threads/{id}/messages`
#[derive(Debug, Clone, Serialize)]
pub struct MessageCreateRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub is_llm_message: bool,
}

impl MessageCreateRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: "user".to_string(),
            is_llm_message: false,
        }
    }
}

/// Listing order of thread messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageOrder {
    Asc,
    #[default]
    Desc,
}

impl MessageOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}
