//! Breakwater - Sliding Window Rate Limiting Middleware
//!
//! This crate implements an in-process sliding-window rate limiter for
//! HTTP APIs. Requests are partitioned by client key, counted against
//! per-route presets, and denied with a structured 429 once a window
//! fills. A background sweeper evicts idle keys to bound memory.
//!
//! State is strictly local to one process; a horizontally scaled
//! deployment under-counts because each instance keeps its own stores.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
