//! Root configuration struct.

use serde::{Deserialize, Serialize};

use super::defaults::{default_cors_origins, default_port};
use super::logging::LoggingConfig;
use super::server::{PublisherSection, ServerSection};

/// Root configuration, as loaded from `config.json` and environment
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP port the HTTP/WebSocket listener binds
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated allowed CORS origins, or "*"
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub publisher: PublisherSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
            server: ServerSection::default(),
            publisher: PublisherSection::default(),
            logging: LoggingConfig::default(),
        }
    }
}
