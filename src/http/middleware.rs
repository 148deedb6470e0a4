//! Rate limiting middleware for axum applications.
//!
//! Wraps the limiter registry as a tower layer: requests are keyed,
//! dispatched to their route's preset, and either forwarded with quota
//! headers attached or short-circuited with a structured 429.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use tower::{Layer, Service};

use crate::ratelimit::{
    generate_key, KeyGenerator, LimitAlert, LimiterRegistry, Preset, RateLimitDecision,
};

/// JSON body returned with a 429.
#[derive(Debug, Serialize)]
struct RateLimitErrorBody {
    error: String,
    message: String,
    #[serde(rename = "retryAfter")]
    retry_after: u64,
}

/// Builds the response returned for denied requests, replacing the
/// standard 429.
pub type DeniedResponseBuilder = Arc<dyn Fn(Preset, &RateLimitDecision) -> Response + Send + Sync>;

/// Configuration for the rate limiting middleware.
#[derive(Clone)]
pub struct MiddlewareConfig {
    /// Trust proxy-supplied client IP headers (`x-forwarded-for`,
    /// `x-real-ip`, `cf-connecting-ip`).
    ///
    /// Only meaningful behind a proxy that overwrites these headers;
    /// otherwise clients can spoof their IP to dodge per-IP limits.
    pub trust_proxy: bool,
    /// Custom key generator overriding the IP/user-agent/path default.
    pub key_generator: Option<KeyGenerator>,
    /// Alert hook invoked on denial.
    pub alert: Option<Arc<dyn LimitAlert>>,
    /// Custom builder for denied responses.
    pub denied_response: Option<DeniedResponseBuilder>,
    /// Path prefixes exempt from limiting.
    pub exempt_prefixes: Vec<String>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            trust_proxy: true,
            key_generator: None,
            alert: None,
            denied_response: None,
            exempt_prefixes: vec!["/health".to_string()],
        }
    }
}

/// Tower layer applying sliding-window rate limits per route preset.
#[derive(Clone)]
pub struct RateLimitLayer {
    registry: Arc<LimiterRegistry>,
    config: MiddlewareConfig,
}

impl RateLimitLayer {
    /// Create a layer with the default middleware configuration.
    pub fn new(registry: Arc<LimiterRegistry>) -> Self {
        Self {
            registry,
            config: MiddlewareConfig::default(),
        }
    }

    /// Create a layer with an explicit middleware configuration.
    pub fn with_config(registry: Arc<LimiterRegistry>, config: MiddlewareConfig) -> Self {
        Self { registry, config }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

/// Tower service produced by [`RateLimitLayer`].
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    registry: Arc<LimiterRegistry>,
    config: MiddlewareConfig,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let path = req.uri().path().to_string();

        if self
            .config
            .exempt_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            let mut svc = self.inner.clone();
            return Box::pin(async move { Ok(svc.call(req).await?.into_response()) });
        }

        let key = generate_key(&req, self.config.key_generator.as_ref(), self.config.trust_proxy);
        let (preset, limiter) = self.registry.limiter_for_path(&path);
        let limiter = Arc::clone(limiter);
        let decision = limiter.check(&key);

        if decision.limited {
            let alert = self.config.alert.clone();
            let denied = self.config.denied_response.clone();
            return Box::pin(async move {
                if let Some(alert) = alert {
                    alert.limit_reached(preset.as_str(), &key, &path).await;
                }
                let response = match denied {
                    Some(build) => build(preset, &decision),
                    None => too_many_requests(&decision),
                };
                Ok(response)
            });
        }

        let track_outcome = {
            let config = limiter.config();
            config.skip_successful || config.skip_failed
        };
        let mut svc = self.inner.clone();
        Box::pin(async move {
            let mut response = svc.call(req).await?.into_response();
            if track_outcome {
                limiter.record_outcome(&key, response.status().is_success());
            }
            attach_quota_headers(response.headers_mut(), &decision);
            Ok(response)
        })
    }
}

/// Standard 429 with quota headers, `Retry-After`, and a JSON body.
fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let retry_after = retry_after_secs(decision);
    let body = RateLimitErrorBody {
        error: "Too Many Requests".to_string(),
        message: "Rate limit exceeded".to_string(),
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    attach_quota_headers(response.headers_mut(), decision);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, header_value(retry_after.to_string()));
    response
}

fn attach_quota_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        header_value(decision.limit.to_string()),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        header_value(decision.remaining.to_string()),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        header_value(reset_timestamp(decision)),
    );
}

/// RFC 3339 instant at which the current window frees a slot.
fn reset_timestamp(decision: &RateLimitDecision) -> String {
    let reset_at =
        Utc::now() + chrono::Duration::milliseconds(decision.reset_after.as_millis() as i64);
    reset_at.to_rfc3339()
}

/// Seconds a denied client should wait, rounded up and never zero.
fn retry_after_secs(decision: &RateLimitDecision) -> u64 {
    (decision.reset_after.as_secs_f64().ceil() as u64).max(1)
}

fn header_value(value: String) -> HeaderValue {
    // Quota values are digits and RFC 3339 timestamps, both valid
    // header text.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("0"))
}
