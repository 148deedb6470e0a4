//! Limiter registry: one limiter per preset, selected by route rules.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::clock::Clock;
use super::limiter::RateLimiter;
use super::rules::{Preset, RouteRules};
use crate::error::Result;

/// Explicitly constructed set of per-preset limiters.
///
/// Built once at startup and passed down to the middleware and the
/// sweeper, so there is no module-level singleton state and tests can
/// run isolated registries side by side.
pub struct LimiterRegistry {
    rules: RouteRules,
    limiters: HashMap<Preset, Arc<RateLimiter>>,
}

impl LimiterRegistry {
    /// Build a registry with one limiter per preset.
    ///
    /// Every preset's configuration is validated here, so a bad window
    /// or cap fails at startup rather than at request time.
    pub fn new(rules: RouteRules, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut limiters = HashMap::new();
        for preset in Preset::ALL {
            let config = rules.limiter_config(preset);
            debug!(
                preset = %preset,
                window_secs = config.window.as_secs(),
                max_requests = config.max_requests,
                "Creating rate limiter"
            );
            limiters.insert(preset, Arc::new(RateLimiter::new(config, Arc::clone(&clock))?));
        }
        Ok(Self { rules, limiters })
    }

    /// Limiter responsible for the given request path.
    pub fn limiter_for_path(&self, path: &str) -> (Preset, &Arc<RateLimiter>) {
        let preset = self.rules.preset_for(path);
        (preset, self.limiter(preset))
    }

    /// Limiter for a specific preset.
    pub fn limiter(&self, preset: Preset) -> &Arc<RateLimiter> {
        // `new` populates every preset.
        &self.limiters[&preset]
    }

    /// Prune every limiter's stores and drop the empty ones.
    pub fn sweep(&self) {
        for limiter in self.limiters.values() {
            limiter.sweep();
        }
    }

    /// Tracked key counts per preset, for the status endpoint.
    pub fn store_counts(&self) -> HashMap<Preset, usize> {
        self.limiters
            .iter()
            .map(|(preset, limiter)| (*preset, limiter.store_count()))
            .collect()
    }
}
