//! Transport tuning and worker launch configuration

use crate::error::{ConfigError, Error, Result};
use crate::types::{ClientInfo, MCP_PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait between the graceful and the forceful termination signal
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tuning knobs for a session
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    pub client_info: ClientInfo,
    pub protocol_version: String,
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            client_info: ClientInfo::default(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            channel_capacity: 100,
        }
    }
}

impl TransportConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// How to launch one worker: the resolved `(command, args, env)` triple
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides merged over the ambient environment
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServerCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Named worker definitions, in the conventional `mcpServers` document shape:
///
/// ```json
/// { "mcpServers": { "files": { "command": "npx", "args": ["-y", "server-files"] } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigs {
    #[serde(default)]
    pub mcp_servers: HashMap<String, ServerCommand>,
}

impl ServerConfigs {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let configs: Self = serde_json::from_str(json)?;
        configs.validate()?;
        Ok(configs)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading server configs from {:?}", path);
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// `<config dir>/toolbridge/servers.json`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("toolbridge").join("servers.json"))
            .ok_or(Error::Config(ConfigError::NoConfigDir))
    }

    pub fn get(&self, name: &str) -> Result<&ServerCommand> {
        self.mcp_servers
            .get(name)
            .ok_or_else(|| Error::Config(ConfigError::ServerNotFound(name.to_string())))
    }

    /// Server names in stable order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mcp_servers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn validate(&self) -> Result<()> {
        for (name, server) in &self.mcp_servers {
            if server.command.trim().is_empty() {
                return Err(Error::Config(ConfigError::Invalid(format!(
                    "server '{}' has an empty command",
                    name
                ))));
            }
        }
        Ok(())
    }
}
