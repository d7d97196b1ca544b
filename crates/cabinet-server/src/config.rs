use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use cabinet_core::CabinetConfig;
use cabinet_loader::NamedDatasetDefinition;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 8815;

/// Server configuration, usually read from a TOML file.
///
/// ```toml
/// bind_addr = "127.0.0.1:8815"
/// request_timeout_ms = 60000
///
/// [cabinet]
/// name = "titanic"
/// location = "/var/lib/cabinet"
///
/// [[datasets]]
/// name = "titanic"
/// loader = "http_csv"
/// arguments = { url = "https://example.org/titanic.csv", retries = 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Requests running longer than this are cut off at the boundary.
    pub request_timeout_ms: u64,
    /// Open the cabinet before accepting requests.
    pub auto_open: bool,
    /// Rows per batch on the streaming endpoint.
    pub stream_batch_rows: usize,
    pub cabinet: CabinetConfig,
    /// Installed into the cabinet at startup.
    pub datasets: Vec<NamedDatasetDefinition>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            request_timeout_ms: 60_000,
            auto_open: true,
            stream_batch_rows: 1024,
            cabinet: CabinetConfig::default(),
            datasets: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
