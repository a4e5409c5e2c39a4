//! Agent model definitions

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{Tool, ToolSet};
use crate::{Error, Result};

/// Per-tool switch as the platform stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub enabled: bool,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub description: String,
}

/// Connection settings of a custom MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    pub url: String,
}

/// A custom MCP tool server attached to an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    #[serde(rename = "type", default = "default_mcp_type")]
    pub server_type: String,
    pub config: McpConfig,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub enabled_tools: Vec<String>,
}

fn default_mcp_type() -> String {
    "http".to_string()
}

impl McpServer {
    /// An HTTP MCP server exposing `enabled_tools`
    pub fn http(
        name: impl Into<String>,
        url: impl Into<String>,
        enabled_tools: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            server_type: default_mcp_type(),
            config: McpConfig { url: url.into() },
            enabled_tools: enabled_tools.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the caller wants created
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub system_prompt: String,
    pub description: Option<String>,
    pub tools: ToolSet,
    pub mcp_servers: Vec<McpServer>,
    /// When set, only these tool / MCP server names are enabled
    pub allowed_tools: Option<Vec<String>>,
    pub is_default: bool,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            description: None,
            tools: ToolSet::new(),
            mcp_servers: Vec::new(),
            allowed_tools: None,
            is_default: false,
        }
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        for tool in tools {
            self.tools.insert(tool);
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mcp_server(mut self, server: McpServer) -> Self {
        self.mcp_servers.push(server);
        self
    }

    pub fn with_allowed_tools(mut self, allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Agent name must not be empty"));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(Error::validation("Agent system prompt must not be empty"));
        }
        for server in &self.mcp_servers {
            if server.name.trim().is_empty() || server.config.url.trim().is_empty() {
                return Err(Error::validation(format!(
                    "MCP server {:?} needs a name and a url",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Validate and build the request body.
    pub fn to_request(&self) -> Result<AgentCreateRequest> {
        self.validate()?;
        let (tools, mcps) = tool_payload(&self.tools, &self.mcp_servers, self.allowed_tools.as_deref());

        Ok(AgentCreateRequest {
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            description: self.description.clone(),
            custom_mcps: (!mcps.is_empty()).then_some(mcps),
            agentpress_tools: (!tools.is_empty()).then_some(tools),
            is_default: self.is_default.then_some(true),
        })
    }
}

fn is_allowed(allowed: Option<&[String]>, names: &[&str]) -> bool {
    match allowed {
        Some(list) => list.iter().any(|a| names.contains(&a.as_str())),
        None => true,
    }
}

fn tool_payload(
    tools: &ToolSet,
    servers: &[McpServer],
    allowed: Option<&[String]>,
) -> (BTreeMap<String, ToolConfig>, Vec<McpServer>) {
    let tools = tools
        .iter()
        .map(|tool| {
            let config = ToolConfig {
                enabled: is_allowed(allowed, &[tool.as_str(), tool.constant_name()]),
                description: tool.description().to_string(),
            };
            (tool.as_str().to_string(), config)
        })
        .collect();

    let servers = servers
        .iter()
        .map(|server| {
            let mut server = server.clone();
            if !is_allowed(allowed, &[server.name.as_str()]) {
                server.enabled_tools.clear();
            }
            server
        })
        .collect();

    (tools, servers)
}

/// Body of `POST /agents`
#[derive(Debug, Clone, Serialize)]
pub struct AgentCreateRequest {
    pub name: String,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_mcps: Option<Vec<McpServer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentpress_tools: Option<BTreeMap<String, ToolConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

/// Partial update of an agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub description: Option<String>,
    pub tools: Option<ToolSet>,
    pub mcp_servers: Option<Vec<McpServer>>,
    pub allowed_tools: Option<Vec<String>>,
}

impl AgentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.system_prompt.is_none()
            && self.description.is_none()
            && self.tools.is_none()
            && self.mcp_servers.is_none()
    }

    pub fn to_request(&self) -> Result<AgentUpdateRequest> {
        if self.is_empty() {
            return Err(Error::validation("Agent update has no fields set"));
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::validation("Agent name must not be empty"));
        }

        let allowed = self.allowed_tools.as_deref();
        let agentpress_tools = self
            .tools
            .as_ref()
            .map(|tools| tool_payload(tools, &[], allowed).0);
        let custom_mcps = self
            .mcp_servers
            .as_ref()
            .map(|servers| tool_payload(&ToolSet::new(), servers, allowed).1);

        Ok(AgentUpdateRequest {
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            description: self.description.clone(),
            custom_mcps,
            agentpress_tools,
        })
    }
}

/// Body of `PUT /agents/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct AgentUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_mcps: Option<Vec<McpServer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentpress_tools: Option<BTreeMap<String, ToolConfig>>,
}

/// An agent as the platform returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub system_prompt: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub custom_mcps: Vec<McpServer>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub agentpress_tools: BTreeMap<String, ToolConfig>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub is_default: bool,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Typed view of an agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub agent_id: String,
    pub name: String,
    pub system_prompt: String,
    pub description: Option<String>,
    /// Enabled built-in tools
    pub tools: ToolSet,
    /// Tool keys this client version does not know, kept verbatim
    pub unrecognized_tools: Vec<String>,
    pub mcp_servers: Vec<McpServer>,
    pub is_default: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AgentResponse> for AgentRecord {
    fn from(resp: AgentResponse) -> Self {
        let mut tools = ToolSet::new();
        let mut unrecognized_tools = Vec::new();
        for (name, config) in resp.agentpress_tools {
            match name.parse::<Tool>() {
                Ok(tool) if config.enabled => {
                    tools.insert(tool);
                }
                Ok(_) => {}
                Err(_) => unrecognized_tools.push(name),
            }
        }

        Self {
            agent_id: resp.agent_id,
            name: resp.name,
            system_prompt: resp.system_prompt,
            description: resp.description,
            tools,
            unrecognized_tools,
            mcp_servers: resp.custom_mcps,
            is_default: resp.is_default,
            created_at: resp.created_at,
            updated_at: resp.updated_at,
        }
    }
}

/// Paging info attached to list responses; missing fields read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub page: u32,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub limit: u32,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub total: u32,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub pages: u32,
}

/// Body of `GET /agents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsResponse {
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub agents: Vec<AgentResponse>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub pagination: Pagination,
}

/// Query for `GET /agents`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAgentsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListAgentsParams {
    pub fn search(name: impl Into<String>) -> Self {
        Self {
            search: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by".to_string(), sort_by.clone()));
        }
        if let Some(sort_order) = &self.sort_order {
            query.push(("sort_order".to_string(), sort_order.clone()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_rejects_empty_name() {
        let err = AgentSpec::new("  ", "prompt").to_request().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = AgentSpec::new("Files", "").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_create_request_lists_tools_with_descriptions() {
        let req = AgentSpec::new("Files", "You manage files")
            .with_tools([Tool::Files, Tool::Files])
            .to_request()
            .unwrap();
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "Files",
                "system_prompt": "You manage files",
                "agentpress_tools": {
                    "sb_files_tool": { "enabled": true, "description": "Read, write, and edit files" }
                }
            })
        );
    }

    #[test]
    fn test_allowed_tools_disable_the_rest() {
        let req = AgentSpec::new("Research", "Research things")
            .with_tools([Tool::WebSearch, Tool::Browser])
            .with_mcp_server(McpServer::http("crm", "https://mcp.example.com", ["lookup"]))
            .with_allowed_tools(["WEB_SEARCH_TOOL"])
            .to_request()
            .unwrap();

        let tools = req.agentpress_tools.unwrap();
        assert!(tools["web_search_tool"].enabled);
        assert!(!tools["browser_tool"].enabled);
        assert!(req.custom_mcps.unwrap()[0].enabled_tools.is_empty());
    }

    #[test]
    fn test_record_keeps_unrecognized_tools() {
        let resp: AgentResponse = serde_json::from_value(json!({
            "agent_id": "a-1",
            "name": "Files",
            "system_prompt": "p",
            "agentpress_tools": {
                "sb_files_tool": { "enabled": true, "description": "" },
                "sb_shell_tool": { "enabled": false, "description": "" },
                "sb_future_tool": { "enabled": true, "description": "" }
            },
            "created_at": "2025-03-01T10:00:00Z"
        }))
        .unwrap();

        let record = AgentRecord::from(resp);
        assert_eq!(record.tools, ToolSet::from([Tool::Files]));
        assert_eq!(record.unrecognized_tools, vec!["sb_future_tool".to_string()]);
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(AgentUpdate::default().to_request().is_err());
        let update = AgentUpdate {
            system_prompt: Some("new".to_string()),
            ..AgentUpdate::default()
        };
        let value = serde_json::to_value(update.to_request().unwrap()).unwrap();
        assert_eq!(value, json!({ "system_prompt": "new" }));
    }

    #[test]
    fn test_pagination_defaults_missing_fields() {
        let resp: AgentsResponse = serde_json::from_value(json!({
            "agents": [],
            "pagination": { "page": 2 }
        }))
        .unwrap();
        assert_eq!(resp.pagination, Pagination { page: 2, ..Pagination::default() });
    }

    #[test]
    fn test_response_accepts_naive_timestamps() {
        let resp: AgentResponse = serde_json::from_value(json!({
            "agent_id": "a-1",
            "name": "Helper",
            "created_at": "2025-01-01T10:00:00.123456",
            "updated_at": "not a date"
        }))
        .unwrap();
        let created = resp.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2025-01-01T10:00:00.123456+00:00");
        assert!(resp.updated_at.is_none());
    }

    #[test]
    fn test_response_treats_null_collections_as_empty() {
        let resp: AgentResponse = serde_json::from_value(json!({
            "agent_id": "a-1",
            "name": "Helper",
            "system_prompt": null,
            "custom_mcps": null,
            "agentpress_tools": null,
            "is_default": null,
            "created_at": null
        }))
        .unwrap();
        let record = AgentRecord::from(resp);
        assert!(record.tools.is_empty());
        assert!(record.mcp_servers.is_empty());
        assert_eq!(record.system_prompt, "");
        assert!(record.created_at.is_none());

        let page: AgentsResponse =
            serde_json::from_value(json!({ "agents": null, "pagination": null })).unwrap();
        assert!(page.agents.is_empty());
    }
}
