//! Invocation seam between the transport and generated tool wrappers
//!
//! Generated per-tool functions take a [`ToolHandle`] (or any
//! [`ToolInvoker`]) explicitly; there is no process-wide session.

use crate::error::{Error, Result, TransportError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Anything that can run a named tool with JSON arguments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `name` and return its normalized result
    async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value>;
}

/// One tool bound to an invoker
#[derive(Clone)]
pub struct ToolHandle {
    invoker: Arc<dyn ToolInvoker>,
    name: String,
}

impl ToolHandle {
    pub fn new(invoker: Arc<dyn ToolInvoker>, name: impl Into<String>) -> Self {
        Self {
            invoker,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        self.invoker.invoke(&self.name, args).await
    }

    /// Call and decode the normalized result into `T`
    pub async fn call_as<T: DeserializeOwned>(&self, args: serde_json::Value) -> Result<T> {
        let value = self.call(args).await?;
        serde_json::from_value(value).map_err(|e| {
            Error::Transport(TransportError::InvalidMessage(format!(
                "Unexpected result shape from '{}': {}",
                self.name, e
            )))
        })
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test]
    async fn test_handle_delegates_with_its_name() {
        let mut invoker = MockToolInvoker::new();
        invoker
            .expect_invoke()
            .with(eq("read_file"), eq(json!({"path": "a.txt"})))
            .times(1)
            .returning(|_, _| Ok(json!("contents")));

        let handle = ToolHandle::new(Arc::new(invoker), "read_file");
        let result = handle.call(json!({"path": "a.txt"})).await.unwrap();

        assert_eq!(result, json!("contents"));
        assert_eq!(handle.name(), "read_file");
    }

    #[tokio::test]
    async fn test_call_as_decodes_typed_result() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Listing {
            entries: Vec<String>,
        }

        let mut invoker = MockToolInvoker::new();
        invoker
            .expect_invoke()
            .returning(|_, _| Ok(json!({"entries": ["a", "b"]})));

        let handle = ToolHandle::new(Arc::new(invoker), "list_dir");
        let listing: Listing = handle.call_as(json!({})).await.unwrap();

        assert_eq!(listing.entries, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_call_as_reports_shape_mismatch() {
        let mut invoker = MockToolInvoker::new();
        invoker.expect_invoke().returning(|_, _| Ok(json!("plain text")));

        let handle = ToolHandle::new(Arc::new(invoker), "count");
        let err = handle.call_as::<u64>(json!({})).await.unwrap_err();

        assert!(matches!(err, Error::Transport(TransportError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let mut invoker = MockToolInvoker::new();
        invoker.expect_invoke().returning(|_, _| {
            Err(Error::Transport(TransportError::ProcessExited("gone".to_string())))
        });

        let handle = ToolHandle::new(Arc::new(invoker), "anything");
        assert!(handle.call(json!({})).await.unwrap_err().is_process_exited());
    }
}
