//! MCP protocol message handling

use crate::config::TransportConfig;
use crate::error::{Error, Result, TransportError};
use crate::types::{
    ClientInfo, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ToolCallParams, ToolsListResult, METHOD_PING,
};
use tracing::{debug, warn};

/// Builds outgoing frames and classifies incoming ones
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    client_info: ClientInfo,
    protocol_version: String,
}

impl ProtocolHandler {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            client_info: config.client_info.clone(),
            protocol_version: config.protocol_version.clone(),
        }
    }

    /// `initialize` params declaring protocol version and client identity
    pub fn initialize_params(&self) -> Result<serde_json::Value> {
        let params = InitializeParams {
            protocol_version: self.protocol_version.clone(),
            capabilities: serde_json::json!({}),
            client_info: self.client_info.clone(),
        };
        Ok(serde_json::to_value(params)?)
    }

    pub fn tool_call_params(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        Ok(serde_json::to_value(params)?)
    }

    pub fn tools_list_params(&self, cursor: Option<&str>) -> serde_json::Value {
        match cursor {
            Some(cursor) => serde_json::json!({ "cursor": cursor }),
            None => serde_json::json!({}),
        }
    }

    /// Parse initialize result
    pub fn parse_initialize_result(&self, result: serde_json::Value) -> Result<InitializeResult> {
        if !result.is_object() {
            return Err(Error::Transport(TransportError::Handshake(format!(
                "initialize returned a non-object result: {}",
                result
            ))));
        }

        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::Transport(TransportError::Handshake(e.to_string())))?;

        match init.protocol_version.as_deref() {
            Some(version) if version != self.protocol_version => {
                warn!(
                    "Protocol version mismatch: requested {}, worker answered {}",
                    self.protocol_version, version
                );
            }
            _ => {}
        }

        if let Some(ref info) = init.server_info {
            debug!("Worker initialized: {} v{}", info.name, info.version);
        } else {
            debug!("Worker initialized (no server info provided)");
        }

        Ok(init)
    }

    /// Parse tools/list result
    pub fn parse_tools_list_result(&self, result: serde_json::Value) -> Result<ToolsListResult> {
        serde_json::from_value(result).map_err(|e| {
            Error::Transport(TransportError::InvalidMessage(format!(
                "Malformed tools/list result: {}",
                e
            )))
        })
    }

    /// Decode one frame; malformed frames are logged and dropped
    pub fn parse_frame(&self, frame: &str) -> Option<McpMessage> {
        let value = match serde_json::from_str::<serde_json::Value>(frame) {
            Ok(value) => value,
            Err(e) => {
                let snippet = frame.chars().take(300).collect::<String>();
                warn!("Dropping non-JSON worker output ({}): {}", e, snippet);
                return None;
            }
        };

        match self.parse_message(&value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Dropping unrecognized frame: {}", e);
                None
            }
        }
    }

    /// Classify a decoded frame (response, notification, or worker request)
    pub fn parse_message(&self, value: &serde_json::Value) -> Result<McpMessage> {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").and_then(|m| m.as_str()).is_some();

        if has_id && (value.get("result").is_some() || value.get("error").is_some()) {
            let response: JsonRpcResponse = serde_json::from_value(value.clone())?;
            return Ok(McpMessage::Response(response));
        }

        if has_method && has_id {
            let request: JsonRpcRequest = serde_json::from_value(value.clone())?;
            return Ok(McpMessage::WorkerRequest(request));
        }

        if has_method {
            let notification: JsonRpcRequest = serde_json::from_value(value.clone())?;
            return Ok(McpMessage::Notification(notification));
        }

        Err(Error::Transport(TransportError::InvalidMessage(format!(
            "Unknown message type: {}",
            value
        ))))
    }

    /// Reply to a request the worker sent us
    pub fn create_worker_reply(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(serde_json::Value::Null);
        match request.method.as_str() {
            METHOD_PING => JsonRpcResponse::success(id, serde_json::json!({})),
            other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
        }
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

/// Parsed inbound message types
#[derive(Debug, Clone)]
pub enum McpMessage {
    /// Response to one of our requests
    Response(JsonRpcResponse),
    /// Notification from the worker (no id)
    Notification(JsonRpcRequest),
    /// Request from the worker expecting a reply
    WorkerRequest(JsonRpcRequest),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_params() {
        let handler = ProtocolHandler::default();
        let params = handler.initialize_params().unwrap();

        assert_eq!(params["protocolVersion"], "2024-11-05");
        assert_eq!(params["clientInfo"]["name"], "toolbridge");
        assert_eq!(params["capabilities"], json!({}));
    }

    #[test]
    fn test_initialize_params_follow_config() {
        let config = TransportConfig::default()
            .with_protocol_version("2025-03-26")
            .with_client_info("stubgen", "2.0.0");
        let params = ProtocolHandler::new(&config).initialize_params().unwrap();

        assert_eq!(params["protocolVersion"], "2025-03-26");
        assert_eq!(params["clientInfo"]["version"], "2.0.0");
    }

    #[test]
    fn test_tool_call_params() {
        let handler = ProtocolHandler::default();
        let params = handler
            .tool_call_params("read_file", json!({"path": "/tmp/a"}))
            .unwrap();

        assert_eq!(params["name"], "read_file");
        assert_eq!(params["arguments"]["path"], "/tmp/a");
    }

    #[test]
    fn test_tools_list_params() {
        let handler = ProtocolHandler::default();
        assert_eq!(handler.tools_list_params(None), json!({}));
        assert_eq!(handler.tools_list_params(Some("p2")), json!({"cursor": "p2"}));
    }

    #[test]
    fn test_parse_frame_response() {
        let handler = ProtocolHandler::default();
        let msg = handler
            .parse_frame(r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#)
            .unwrap();

        assert!(matches!(msg, McpMessage::Response(ref r) if r.correlation_id() == Some(1)));
    }

    #[test]
    fn test_parse_frame_error_response() {
        let handler = ProtocolHandler::default();
        let msg = handler
            .parse_frame(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-1,"message":"nope"}}"#)
            .unwrap();

        assert!(matches!(msg, McpMessage::Response(ref r) if r.error.is_some()));
    }

    #[test]
    fn test_parse_frame_drops_garbage() {
        let handler = ProtocolHandler::default();
        assert!(handler.parse_frame("npm WARN deprecated something").is_none());
        assert!(handler.parse_frame(r#"{"jsonrpc":"2.0"}"#).is_none());
    }

    #[test]
    fn test_parse_message_notification() {
        let handler = ProtocolHandler::default();
        let msg = handler
            .parse_message(&json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": {"level": "info", "data": "hello"}
            }))
            .unwrap();

        assert!(matches!(msg, McpMessage::Notification(_)));
    }

    #[test]
    fn test_parse_message_worker_request() {
        let handler = ProtocolHandler::default();
        let msg = handler
            .parse_message(&json!({"jsonrpc": "2.0", "id": 5, "method": "ping"}))
            .unwrap();

        assert!(matches!(msg, McpMessage::WorkerRequest(_)));
    }

    #[test]
    fn test_worker_reply_to_ping_and_unknown() {
        let handler = ProtocolHandler::default();

        let ping = JsonRpcRequest::new(5, "ping", None);
        let reply = handler.create_worker_reply(&ping);
        assert_eq!(reply.result, Some(json!({})));

        let sampling = JsonRpcRequest::new(6, "sampling/createMessage", None);
        let reply = handler.create_worker_reply(&sampling);
        assert_eq!(reply.error.unwrap()["code"], -32601);
    }

    #[test]
    fn test_parse_initialize_result_rejects_non_object() {
        let handler = ProtocolHandler::default();
        let err = handler.parse_initialize_result(json!("hi")).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Handshake(_))));
    }

    #[test]
    fn test_parse_initialize_result() {
        let handler = ProtocolHandler::default();
        let init = handler
            .parse_initialize_result(json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": {"name": "files", "version": "1.2.0"},
                "capabilities": {"tools": {}}
            }))
            .unwrap();

        assert_eq!(init.server_info.unwrap().name, "files");
    }
}
