use std::path::PathBuf;
use std::time::Duration;

use cabinet_types::Persistence;
use serde::{Deserialize, Serialize};

/// Configuration for one cabinet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CabinetConfig {
    /// Cabinet name. A named cabinet derives its id from the name.
    pub name: Option<String>,
    /// Backing directory, created on first open.
    pub location: PathBuf,
    /// Persistence of records put without an explicit class.
    pub default_persistence: Persistence,
    /// Maximum wall-clock time for one loader invocation.
    pub loader_timeout_ms: u64,
    /// zstd level for payloads written on close.
    pub compression_level: i32,
}

impl Default for CabinetConfig {
    fn default() -> Self {
        Self {
            name: None,
            location: PathBuf::from("cabinet"),
            default_persistence: Persistence::Persistent,
            loader_timeout_ms: 30_000,
            compression_level: 3,
        }
    }
}

impl CabinetConfig {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn loader_timeout(&self) -> Duration {
        Duration::from_millis(self.loader_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let config: CabinetConfig = toml::from_str(
            r#"
            name = "titanic"
            location = "/var/lib/cabinet"
            "#,
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("titanic"));
        assert_eq!(config.default_persistence, Persistence::Persistent);
        assert_eq!(config.loader_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn ephemeral_default_from_toml() {
        let config: CabinetConfig =
            toml::from_str(r#"default_persistence = "ephemeral""#).unwrap();
        assert_eq!(config.default_persistence, Persistence::Ephemeral);
    }
}
