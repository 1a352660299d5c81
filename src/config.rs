use std::path::PathBuf;
use std::time::Duration;

/// Where the background-removal service lives and how to talk to it
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Origin or prefix of the service; empty means same-origin relative paths
    pub base_url: String,
    /// Upper bound on one request. `None` leaves the transport default.
    pub timeout: Option<Duration>,
    /// Directory that holds materialized results and previews
    pub work_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: None,
            work_dir: std::env::temp_dir().join("bgremove"),
        }
    }
}

impl ClientConfig {
    pub fn endpoint(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }
}

/// Join a base URL and an endpoint path without doubling the slash
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
