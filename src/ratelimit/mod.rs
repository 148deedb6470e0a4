//! Rate limiting logic and state management.

mod alert;
mod clock;
mod key;
mod limiter;
mod registry;
mod rules;
mod store;
mod sweeper;

pub use alert::{LimitAlert, LogAlert};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{generate_key, ClientKey, KeyGenerator, UNKNOWN_CLIENT};
pub use limiter::{LimiterConfig, RateLimitDecision, RateLimiter};
pub use registry::LimiterRegistry;
pub use rules::{LimitOverride, Preset, RouteRule, RouteRules};
pub use store::{RequestLog, RequestRecord};
pub use sweeper::CleanupSweeper;
