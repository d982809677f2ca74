//! MCP (Model Context Protocol) payload types
//!
//! Only the subset a tool-calling client needs: the handshake and the
//! `tools/*` methods.

use serde::{Deserialize, Serialize};

/// MCP protocol revision requested during the handshake
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_PING: &str = "ping";

/// Client information sent during initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "toolbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Initialize request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: serde_json::Value,
    pub client_info: ClientInfo,
}

/// Server information returned by the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Initialize response
///
/// Every field is optional; some workers answer with an empty object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub capabilities: Option<serde_json::Value>,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// `tools/call` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One entry of a `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Failure text of a `tools/call` result flagged with `isError`.
///
/// Returns `None` for successful results.
pub fn tool_error_message(result: &serde_json::Value) -> Option<String> {
    if !result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }

    let texts: Vec<&str> = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        Some(result.to_string())
    } else {
        Some(texts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_params_shape() {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo::default(),
        };
        let value = serde_json::to_value(params).unwrap();

        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["clientInfo"]["name"], "toolbridge");
        assert!(value["capabilities"].is_object());
    }

    #[test]
    fn test_initialize_result_tolerates_empty_object() {
        let result: InitializeResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.server_info.is_none());
        assert!(result.protocol_version.is_none());
    }

    #[test]
    fn test_tools_list_decoding() {
        let result: ToolsListResult = serde_json::from_value(json!({
            "tools": [
                {"name": "read_file", "description": "Read a file", "inputSchema": {"type": "object"}},
                {"name": "noop"}
            ]
        }))
        .unwrap();

        assert_eq!(result.tools.len(), 2);
        assert_eq!(result.tools[0].input_schema["type"], "object");
        assert_eq!(result.tools[1].description, None);
    }

    #[test]
    fn test_tool_error_message() {
        let ok = json!({"content": [{"type": "text", "text": "fine"}]});
        let failed = json!({"isError": true, "content": [{"type": "text", "text": "no such file"}]});
        let bare = json!({"isError": true});

        assert_eq!(tool_error_message(&ok), None);
        assert_eq!(tool_error_message(&failed).as_deref(), Some("no such file"));
        assert_eq!(tool_error_message(&bare).as_deref(), Some(r#"{"isError":true}"#));
    }
}
