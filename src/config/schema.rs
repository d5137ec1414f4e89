//! Configuration schema for deepspec.toml.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model used when `GCP_MODEL_NAME` / `model_name` is unset.
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.5-flash-lite";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepspecConfig {
    /// Google Cloud project hosting the Vertex AI endpoint.
    pub gcp_project_id: String,

    /// Vertex AI location (e.g. us-central1, or "global").
    pub gcp_location: String,

    /// Gemini model name.
    pub model_name: String,

    /// OAuth access token sent as a bearer token to Vertex AI.
    pub access_token: String,

    /// MCP endpoint the chat console keeps a connection to.
    pub mcp_server_url: String,

    /// Bind address for `deepspec server`.
    pub server_addr: String,

    /// Seconds a server-side MCP session may sit idle before it is dropped.
    pub session_idle_timeout_secs: u64,

    /// Seconds between health checks.
    pub health_check_interval_secs: u64,

    /// Deadline for every outbound HTTP call.
    pub request_timeout_secs: u64,

    /// Follow-up turns allowed per message before giving up.
    pub max_tool_rounds: usize,

    /// Append-only log file used by the chat console.
    pub log_file: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for DeepspecConfig {
    fn default() -> Self {
        Self {
            gcp_project_id: String::new(),
            gcp_location: String::new(),
            model_name: DEFAULT_MODEL_NAME.into(),
            access_token: String::new(),
            mcp_server_url: "http://localhost:8080/mcp".into(),
            server_addr: "0.0.0.0:8080".into(),
            session_idle_timeout_secs: 300,
            health_check_interval_secs: 3,
            request_timeout_secs: 30,
            max_tool_rounds: 8,
            log_file: "out.log".into(),
            log_level: "info".into(),
        }
    }
}

impl DeepspecConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    /// Resolved log file path.
    pub fn resolved_log_file(&self) -> String {
        self.resolve_path(&self.log_file)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Whether the Vertex AI project and location are known.
    pub fn has_backend(&self) -> bool {
        !self.gcp_project_id.is_empty() && !self.gcp_location.is_empty()
    }

    /// Copy with the access token masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.access_token.is_empty() {
            copy.access_token = "********".into();
        }
        copy
    }
}
