//! HTTP surface: the middleware adapter and the reference server.

mod middleware;
mod server;

pub use middleware::{DeniedResponseBuilder, MiddlewareConfig, RateLimitLayer, RateLimitService};
pub use server::HttpServer;
