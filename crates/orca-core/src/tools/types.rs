//! Tool-related type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool call from the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool
    pub arguments: HashMap<String, serde_json::Value>,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call from a JSON object; non-object values yield no arguments
    pub fn from_json(id: impl Into<String>, name: impl Into<String>, value: serde_json::Value) -> Self {
        let arguments = match value {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self::new(id, name, arguments)
    }

    /// Get a typed argument value
    pub fn get_argument<T>(&self, key: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.arguments
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a string argument
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_argument::<String>(key)
    }
}

/// Result of a tool's own execution
///
/// Tools should build this through `ToolResult::success()` and `ToolResult::error()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool call ID this result corresponds to
    pub call_id: String,
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Whether the tool execution was successful
    pub success: bool,
    /// Output from the tool (if successful)
    pub output: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a failed tool result
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata
    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Parameter definition for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Parameter description
    pub description: String,
    /// Parameter type (string, number, integer, boolean, object, array)
    pub param_type: String,
    /// Whether this parameter is required
    pub required: bool,
    /// Default value (if any)
    pub default: Option<serde_json::Value>,
    /// Enum values (if applicable)
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ToolParameter {
    fn typed(name: impl Into<String>, description: impl Into<String>, param_type: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type: param_type.to_string(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Create a required string parameter
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::typed(name, description, "string")
    }

    /// Create a required boolean parameter
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::typed(name, description, "boolean")
    }

    /// Create a required number parameter
    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::typed(name, description, "number")
    }

    /// Create a required integer parameter
    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::typed(name, description, "integer")
    }

    /// Create a required array parameter
    pub fn array(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::typed(name, description, "array")
    }

    /// Make parameter optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set default value; a parameter with a default is never required
    pub fn with_default<V: Into<serde_json::Value>>(mut self, default: V) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    /// Restrict to a set of values
    pub fn with_enum<V: Into<serde_json::Value>>(mut self, values: Vec<V>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// JSON schema for a tool, as declared to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Input parameters schema
    pub parameters: serde_json::Value,
}

/// What the model is shown for each tool
pub type ToolDeclaration = ToolSchema;

impl ToolSchema {
    /// Create a new tool schema
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in parameters {
            if param.required {
                required.push(param.name.clone());
            }

            let mut param_schema = serde_json::Map::new();
            param_schema.insert("type".to_string(), param.param_type.into());
            param_schema.insert("description".to_string(), param.description.into());

            if let Some(default) = param.default {
                param_schema.insert("default".to_string(), default);
            }

            if let Some(enum_values) = param.enum_values {
                param_schema.insert("enum".to_string(), enum_values.into());
            }

            properties.insert(param.name, param_schema.into());
        }

        let parameters_schema = serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        });

        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters_schema,
        }
    }

    /// Same schema under a different name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_required_and_defaults() {
        let schema = ToolSchema::new(
            "Read",
            "Read a file",
            vec![
                ToolParameter::string("file_path", "Path"),
                ToolParameter::integer("limit", "Max lines").with_default(2000),
            ],
        );
        assert_eq!(schema.parameters["required"], json!(["file_path"]));
        assert_eq!(schema.parameters["properties"]["limit"]["default"], json!(2000));
    }

    #[test]
    fn test_tool_call_from_json() {
        let call = ToolCall::from_json("1", "Read", json!({"file_path": "a.rs"}));
        assert_eq!(call.get_string("file_path").as_deref(), Some("a.rs"));

        let call = ToolCall::from_json("2", "Read", json!("not an object"));
        assert!(call.arguments.is_empty());
    }
}
