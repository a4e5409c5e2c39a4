use std::sync::Arc;

use tracing::{debug, info};

use a2abase_core::agent::{
    AgentRecord, AgentResponse, AgentSpec, AgentUpdate, AgentsResponse, ListAgentsParams,
};
use a2abase_core::{Error, Result};

use super::{map_remote, segment};
use crate::transport::{ApiRequest, Transport};

const SEARCH_PAGE_SIZE: u32 = 100;
const SEARCH_MAX_PAGES: u32 = 10;

/// CRUD over `/agents`
#[derive(Clone)]
pub struct AgentsClient {
    transport: Arc<dyn Transport>,
}

impl AgentsClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn create(&self, spec: &AgentSpec) -> Result<AgentRecord> {
        let body = spec.to_request()?;
        let response: AgentResponse = self
            .transport
            .request(ApiRequest::post("agents").json(&body)?)
            .await
            .map_err(|e| map_remote(e, &format!("agent {}", spec.name)))?
            .json()?;
        info!("Created agent {} ({})", response.name, response.agent_id);
        Ok(response.into())
    }

    pub async fn get(&self, agent_id: &str) -> Result<AgentRecord> {
        let response: AgentResponse = self
            .transport
            .request(ApiRequest::get(format!("agents/{}", segment(agent_id))))
            .await
            .map_err(|e| map_remote(e, &format!("agent {}", agent_id)))?
            .json()?;
        Ok(response.into())
    }

    /// One page of agents; pagination fields missing from the response read as 0.
    pub async fn list(&self, params: &ListAgentsParams) -> Result<AgentsResponse> {
        self.transport
            .request(ApiRequest::get("agents").queries(params.to_query()))
            .await
            .map_err(|e| map_remote(e, "agents"))?
            .json()
    }

    /// Exact, case-sensitive lookup by name.
    ///
    /// Searches up to 10 pages of 100. With several matches the most recently
    /// created agent wins, then the lowest id. Errors are returned, never
    /// reported as "absent".
    pub async fn find_by_name(&self, name: &str) -> Result<Option<AgentRecord>> {
        let mut matches: Vec<AgentResponse> = Vec::new();

        for page in 1..=SEARCH_MAX_PAGES {
            let params = ListAgentsParams::search(name).page(page, SEARCH_PAGE_SIZE);
            let response = self.list(&params).await?;
            let received = response.agents.len();
            matches.extend(response.agents.into_iter().filter(|agent| agent.name == name));

            let last_page = response.pagination.pages == 0 || page >= response.pagination.pages;
            if received < SEARCH_PAGE_SIZE as usize || last_page {
                break;
            }
        }

        if matches.len() > 1 {
            debug!("{} agents named {:?}; picking the newest", matches.len(), name);
        }
        let best = matches.into_iter().min_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        Ok(best.map(AgentRecord::from))
    }

    pub async fn update(&self, agent_id: &str, update: &AgentUpdate) -> Result<AgentRecord> {
        if update.is_empty() {
            return Err(Error::validation("Agent update has no fields set"));
        }
        let body = update.to_request()?;
        let response: AgentResponse = self
            .transport
            .request(ApiRequest::put(format!("agents/{}", segment(agent_id))).json(&body)?)
            .await
            .map_err(|e| map_remote(e, &format!("agent {}", agent_id)))?
            .json()?;
        info!("Updated agent {}", agent_id);
        Ok(response.into())
    }

    pub async fn delete(&self, agent_id: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::delete(format!("agents/{}", segment(agent_id))))
            .await
            .map_err(|e| map_remote(e, &format!("agent {}", agent_id)))?;
        info!("Deleted agent {}", agent_id);
        Ok(())
    }
}
