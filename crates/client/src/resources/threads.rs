use std::sync::Arc;

use tracing::{debug, info};

use a2abase_core::thread::{
    CreateThreadResponse, Message, MessageCreateRequest, MessageOrder, MessagesResponse,
    ThreadRecord, ThreadsResponse,
};
use a2abase_core::{Error, Result};

use super::{map_remote, segment};
use crate::transport::{ApiRequest, Transport};

/// CRUD over `/threads` and their messages
#[derive(Clone)]
pub struct ThreadsClient {
    transport: Arc<dyn Transport>,
}

impl ThreadsClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a thread. The name goes out as a form field.
    pub async fn create(&self, name: Option<&str>) -> Result<CreateThreadResponse> {
        let mut request = ApiRequest::post("threads");
        if let Some(name) = name {
            request = request.form(vec![("name".to_string(), name.to_string())]);
        }
        let response: CreateThreadResponse = self
            .transport
            .request(request)
            .await
            .map_err(|e| map_remote(e, "thread"))?
            .json()?;
        info!("Created thread {}", response.thread_id);
        Ok(response)
    }

    pub async fn get(&self, thread_id: &str) -> Result<ThreadRecord> {
        self.transport
            .request(ApiRequest::get(format!("threads/{}", segment(thread_id))))
            .await
            .map_err(|e| map_remote(e, &format!("thread {}", thread_id)))?
            .json()
    }

    pub async fn list(&self, page: Option<u32>, limit: Option<u32>) -> Result<ThreadsResponse> {
        let mut request = ApiRequest::get("threads");
        if let Some(page) = page {
            request = request.query("page", page);
        }
        if let Some(limit) = limit {
            request = request.query("limit", limit);
        }
        self.transport
            .request(request)
            .await
            .map_err(|e| map_remote(e, "threads"))?
            .json()
    }

    pub async fn delete(&self, thread_id: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::delete(format!("threads/{}", segment(thread_id))))
            .await
            .map_err(|e| map_remote(e, &format!("thread {}", thread_id)))?;
        info!("Deleted thread {}", thread_id);
        Ok(())
    }

    /// Append a user message without starting a run.
    pub async fn add_message(&self, thread_id: &str, message: &str) -> Result<Message> {
        if message.trim().is_empty() {
            return Err(Error::validation("Message must not be empty"));
        }
        let response = self
            .transport
            .request(
                ApiRequest::post(format!("threads/{}/messages/add", segment(thread_id)))
                    .query("message", message),
            )
            .await
            .map_err(|e| map_remote(e, &format!("thread {}", thread_id)))?;
        debug!("Added message to thread {}", thread_id);
        response.json()
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        request: &MessageCreateRequest,
    ) -> Result<Message> {
        self.transport
            .request(
                ApiRequest::post(format!("threads/{}/messages", segment(thread_id))).json(request)?,
            )
            .await
            .map_err(|e| map_remote(e, &format!("thread {}", thread_id)))?
            .json()
    }

    pub async fn messages(&self, thread_id: &str, order: MessageOrder) -> Result<Vec<Message>> {
        let response: MessagesResponse = self
            .transport
            .request(
                ApiRequest::get(format!("threads/{}/messages", segment(thread_id)))
                    .query("order", order.as_str()),
            )
            .await
            .map_err(|e| map_remote(e, &format!("thread {}", thread_id)))?
            .json()?;
        Ok(response.messages)
    }

    pub async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::delete(format!(
                "threads/{}/messages/{}",
                segment(thread_id),
                segment(message_id)
            )))
            .await
            .map_err(|e| map_remote(e, &format!("message {}", message_id)))?;
        Ok(())
    }
}
