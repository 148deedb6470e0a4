//! Rate limit rules configuration and matching.
//!
//! This module handles loading and matching route rules from configuration.
//! Rules bind path prefixes to named presets; the longest matching prefix
//! wins, and unmatched paths fall back to a configurable default preset.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::limiter::LimiterConfig;
use crate::error::{BreakwaterError, Result};

/// Named limit presets applied to classes of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    General,
    Auth,
    Sensitive,
    Upload,
    Admin,
    Public,
}

impl Preset {
    /// Every preset, in registry construction order.
    pub const ALL: [Preset; 6] = [
        Preset::General,
        Preset::Auth,
        Preset::Sensitive,
        Preset::Upload,
        Preset::Admin,
        Preset::Public,
    ];

    /// Stable lowercase name for logs, config keys, and the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::General => "general",
            Preset::Auth => "auth",
            Preset::Sensitive => "sensitive",
            Preset::Upload => "upload",
            Preset::Admin => "admin",
            Preset::Public => "public",
        }
    }

    /// Built-in window and request cap for this preset.
    fn default_limit(&self) -> (Duration, u64) {
        match self {
            Preset::General => (Duration::from_secs(15 * 60), 100),
            Preset::Auth => (Duration::from_secs(15 * 60), 10),
            Preset::Sensitive => (Duration::from_secs(60 * 60), 5),
            Preset::Upload => (Duration::from_secs(60 * 60), 20),
            Preset::Admin => (Duration::from_secs(60), 30),
            Preset::Public => (Duration::from_secs(60), 60),
        }
    }

    /// Limiter configuration with the built-in defaults.
    pub fn config(&self) -> LimiterConfig {
        let (window, max_requests) = self.default_limit();
        LimiterConfig::new(self.as_str(), window, max_requests)
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule binding a path prefix to a preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    /// Path prefix to match, e.g. `/api/auth`.
    pub prefix: String,
    /// Preset applied to matching requests.
    pub preset: Preset,
}

/// Override of a preset's built-in window and cap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitOverride {
    /// Window duration in seconds.
    pub window_secs: u64,
    /// Maximum countable requests inside the window.
    pub max_requests: u64,
    /// Exclude successful requests from the count.
    #[serde(default)]
    pub skip_successful: bool,
    /// Exclude failed requests from the count.
    #[serde(default)]
    pub skip_failed: bool,
}

/// The full routing table from path prefixes to presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRules {
    /// Prefix rules; the longest matching prefix wins.
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    /// Preset applied when no prefix matches.
    #[serde(default = "default_fallback")]
    pub fallback: Preset,
    /// Per-preset overrides of window, cap, and outcome skips.
    #[serde(default)]
    pub overrides: HashMap<Preset, LimitOverride>,
}

fn default_fallback() -> Preset {
    Preset::General
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            rules: vec![
                RouteRule {
                    prefix: "/api/auth".to_string(),
                    preset: Preset::Auth,
                },
                RouteRule {
                    prefix: "/api/admin".to_string(),
                    preset: Preset::Admin,
                },
                RouteRule {
                    prefix: "/api/upload".to_string(),
                    preset: Preset::Upload,
                },
                RouteRule {
                    prefix: "/api/public".to_string(),
                    preset: Preset::Public,
                },
                RouteRule {
                    prefix: "/api/auth/password-reset".to_string(),
                    preset: Preset::Sensitive,
                },
            ],
            fallback: default_fallback(),
            overrides: HashMap::new(),
        }
    }
}

impl RouteRules {
    /// Load route rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading route rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load route rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BreakwaterError::Config(format!("Failed to parse route rules: {}", e)))
    }

    /// Find the preset for a request path.
    ///
    /// The longest matching prefix wins, so a specific rule under a
    /// broader one takes precedence.
    pub fn preset_for(&self, path: &str) -> Preset {
        self.rules
            .iter()
            .filter(|rule| path.starts_with(rule.prefix.as_str()))
            .max_by_key(|rule| rule.prefix.len())
            .map(|rule| rule.preset)
            .unwrap_or(self.fallback)
    }

    /// Limiter configuration for a preset with any override applied.
    pub fn limiter_config(&self, preset: Preset) -> LimiterConfig {
        let mut config = preset.config();
        if let Some(o) = self.overrides.get(&preset) {
            config.window = Duration::from_secs(o.window_secs);
            config.max_requests = o.max_requests;
            config.skip_successful = o.skip_successful;
            config.skip_failed = o.skip_failed;
        }
        config
    }
}
