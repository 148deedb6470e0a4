//! Alert hook for rate limit denials.

use async_trait::async_trait;
use tracing::warn;

/// Hook invoked when a request is denied.
///
/// This trait abstracts the denial side-channel so the middleware can
/// notify an audit logger, a metrics pipeline, or anything else
/// without knowing about it.
#[async_trait]
pub trait LimitAlert: Send + Sync {
    /// Called after a request is denied, before the 429 is returned.
    async fn limit_reached(&self, preset: &str, key: &str, path: &str);
}

/// Default alert that emits a structured warning log.
pub struct LogAlert;

#[async_trait]
impl LimitAlert for LogAlert {
    async fn limit_reached(&self, preset: &str, key: &str, path: &str) {
        warn!(
            preset = %preset,
            key = %key,
            path = %path,
            "Rate limit reached"
        );
    }
}
