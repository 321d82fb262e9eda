//! Tool categories

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad category of a tool, used for indexing, mode filtering and
/// permission signature projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Reads file contents
    FileRead,
    /// Creates or modifies files
    FileEdit,
    /// Searches file names or contents
    Search,
    /// Runs shell commands
    Shell,
    /// Talks to the network
    Network,
    /// Spawns or manages agents
    Agent,
    /// Spec-driven workflow tools
    Spec,
    /// Provided by an external tool source
    External,
    #[default]
    Other,
}

impl ToolCategory {
    /// Stable name used as the category index key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file_read",
            Self::FileEdit => "file_edit",
            Self::Search => "search",
            Self::Shell => "shell",
            Self::Network => "network",
            Self::Agent => "agent",
            Self::Spec => "spec",
            Self::External => "external",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
