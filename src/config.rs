//! Configuration management for Breakwater.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the Breakwater service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakwaterConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

impl Default for BreakwaterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limiting: RateLimitingConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the route rules file
    pub rules_path: Option<String>,

    /// Cleanup sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Trust proxy-supplied client IP headers
    #[serde(default = "default_trust_proxy")]
    pub trust_proxy: bool,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            sweep_interval_secs: default_sweep_interval(),
            trust_proxy: default_trust_proxy(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_trust_proxy() -> bool {
    true
}

impl BreakwaterConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BreakwaterConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::BreakwaterError::Config(e.to_string()))?;
        Ok(config)
    }
}
