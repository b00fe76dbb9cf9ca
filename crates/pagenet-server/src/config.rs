//! Server configuration.
//!
//! Resolution order: built-in defaults → TOML file → environment
//! variables → CLI flags. Only the file layer lives here; env and CLI
//! are handled by clap in `main`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pagenet_persistence::SavePolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// This node's cluster identity. 3 to 20 characters.
    pub node_name: String,

    /// Group name to join; all nodes of one network share it.
    pub cluster_name: String,

    /// Geographic position of this node.
    pub latitude: f64,
    pub longitude: f64,

    /// Path of the persisted state document.
    pub state_file: String,

    /// `immediate` writes the state file after every mutation,
    /// `deferred` leaves saving to membership events and shutdown.
    pub save_policy: SavePolicy,

    /// How long a broadcast waits for every member's response.
    pub response_timeout_ms: u64,

    /// Shared cluster secret; stored on the node record only as a
    /// salted hash. May instead come from a file via the CLI.
    pub cluster_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            cluster_name: "pagenet".into(),
            latitude: 0.0,
            longitude: 0.0,
            state_file: "pagenet-state.json".into(),
            save_policy: SavePolicy::Immediate,
            response_timeout_ms: 10_000,
            cluster_secret: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Checks the fields the cluster layer cannot default its way
    /// around. Runs after all override layers are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_len = self.node_name.trim().len();
        if !(3..=20).contains(&name_len) {
            return Err(ConfigError::Invalid(format!(
                "node_name must be 3 to 20 characters, got {name_len}"
            )));
        }
        if self.cluster_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "cluster_secret must be set (inline or via --cluster-secret-file)".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Invalid("latitude out of range".into()));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Invalid("longitude out of range".into()));
        }
        Ok(())
    }
}
