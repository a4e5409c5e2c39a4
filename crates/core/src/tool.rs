//! Tool identifiers
//!
//! Tools are pure configuration attached to an agent; the platform interprets
//! them. The set is closed and versioned with the service, so unknown names
//! are rejected when parsed from caller input.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Built-in platform tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Files,
    Shell,
    WebDev,
    Deploy,
    Expose,
    Vision,
    Browser,
    WebSearch,
    ImageSearch,
    ImageEdit,
    Kb,
    Design,
    PresentationOutline,
    Presentation,
    Sheets,
    UploadFile,
    Docs,
    DataProviders,
}

impl Tool {
    pub const ALL: [Tool; 18] = [
        Self::Files,
        Self::Shell,
        Self::WebDev,
        Self::Deploy,
        Self::Expose,
        Self::Vision,
        Self::Browser,
        Self::WebSearch,
        Self::ImageSearch,
        Self::ImageEdit,
        Self::Kb,
        Self::Design,
        Self::PresentationOutline,
        Self::Presentation,
        Self::Sheets,
        Self::UploadFile,
        Self::Docs,
        Self::DataProviders,
    ];

    /// Identifier sent to the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "sb_files_tool",
            Self::Shell => "sb_shell_tool",
            Self::WebDev => "sb_web_dev_tool",
            Self::Deploy => "sb_deploy_tool",
            Self::Expose => "sb_expose_tool",
            Self::Vision => "sb_vision_tool",
            Self::Browser => "browser_tool",
            Self::WebSearch => "web_search_tool",
            Self::ImageSearch => "image_search_tool",
            Self::ImageEdit => "sb_image_edit_tool",
            Self::Kb => "sb_kb_tool",
            Self::Design => "sb_design_tool",
            Self::PresentationOutline => "sb_presentation_outline_tool",
            Self::Presentation => "sb_presentation_tool",
            Self::Sheets => "sb_sheets_tool",
            Self::UploadFile => "sb_upload_file_tool",
            Self::Docs => "sb_docs_tool",
            Self::DataProviders => "data_providers_tool",
        }
    }

    /// Constant-style name, e.g. `FILES_TOOL`
    pub fn constant_name(&self) -> &'static str {
        match self {
            Self::Files => "FILES_TOOL",
            Self::Shell => "SHELL_TOOL",
            Self::WebDev => "WEB_DEV_TOOL",
            Self::Deploy => "DEPLOY_TOOL",
            Self::Expose => "EXPOSE_TOOL",
            Self::Vision => "VISION_TOOL",
            Self::Browser => "BROWSER_TOOL",
            Self::WebSearch => "WEB_SEARCH_TOOL",
            Self::ImageSearch => "IMAGE_SEARCH_TOOL",
            Self::ImageEdit => "IMAGE_EDIT_TOOL",
            Self::Kb => "KB_TOOL",
            Self::Design => "DESIGN_TOOL",
            Self::PresentationOutline => "PRESENTATION_OUTLINE_TOOL",
            Self::Presentation => "PRESENTATION_TOOL",
            Self::Sheets => "SHEETS_TOOL",
            Self::UploadFile => "UPLOAD_FILE_TOOL",
            Self::Docs => "DOCS_TOOL",
            Self::DataProviders => "DATA_PROVIDERS_TOOL",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Files => "Read, write, and edit files",
            Self::Shell => "Execute shell commands",
            Self::WebDev => "Create and manage modern web applications with Next.js and shadcn/ui",
            Self::Deploy => "Deploy web applications",
            Self::Expose => "Expose local services to the internet",
            Self::Vision => "Analyze and understand images",
            Self::Browser => "Browse websites and interact with web pages",
            Self::WebSearch => "Search the web for information",
            Self::ImageSearch => "Search for images on the web",
            Self::ImageEdit => "Edit and manipulate images",
            Self::Kb => "Access and manage knowledge base",
            Self::Design => "Design and create visual content",
            Self::PresentationOutline => "Create presentation outlines",
            Self::Presentation => "Create and manage presentations",
            Self::Sheets => "Create and manage spreadsheets",
            Self::UploadFile => "Upload files to the sandbox",
            Self::Docs => "Create and manage documents",
            Self::DataProviders => "Access structured data from various providers",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = Error;

    /// Accepts the wire identifier or the constant-style name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s || tool.constant_name() == s)
            .ok_or_else(|| Error::validation(format!("Unknown tool identifier: {}", s)))
    }
}

impl Serialize for Tool {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An unordered set of tools; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSet(BTreeSet<Tool>);

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse caller-supplied names, rejecting the first unknown one.
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Tool>())
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    pub fn insert(&mut self, tool: Tool) -> bool {
        self.0.insert(tool)
    }

    pub fn contains(&self, tool: Tool) -> bool {
        self.0.contains(&tool)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tool> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Tool> for ToolSet {
    fn from_iter<I: IntoIterator<Item = Tool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Tool; N]> for ToolSet {
    fn from(tools: [Tool; N]) -> Self {
        tools.into_iter().collect()
    }
}
