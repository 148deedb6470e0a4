//! Client key derivation for rate limit partitioning.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use tracing::warn;

/// Shared bucket for requests with no derivable client identity.
///
/// Unknown clients stay rate limited together instead of colliding
/// under an empty key or escaping limits entirely.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Pluggable key generator overriding the default composite key.
///
/// Must be a pure function of the request. Returning `None` or an
/// empty string lands the request in the [`UNKNOWN_CLIENT`] bucket.
pub type KeyGenerator = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// The identity a request is rate limited under.
///
/// The default partition combines client IP, user agent, and path,
/// keeping distinct clients and routes isolated from each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Resolved client IP, or [`UNKNOWN_CLIENT`].
    pub ip: String,
    /// Value of the `User-Agent` header, possibly empty.
    pub user_agent: String,
    /// Request path.
    pub path: String,
}

impl ClientKey {
    /// Derive the default key for a request.
    ///
    /// When `trust_proxy` is false, proxy-supplied headers are ignored
    /// and only the connection's own address identifies the client.
    pub fn from_request(request: &Request, trust_proxy: bool) -> Self {
        let ip = client_ip(request, trust_proxy).unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let path = request.uri().path().to_string();

        Self {
            ip,
            user_agent,
            path,
        }
    }

    /// Convert the key to its string representation.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}:{}", self.ip, self.user_agent, self.path)
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

/// Produce the partition key for a request.
///
/// A custom generator fully overrides the default composite key. A
/// generator that yields nothing is coerced to the unknown bucket so
/// a key-derivation defect degrades limiting instead of breaking it.
pub fn generate_key(
    request: &Request,
    generator: Option<&KeyGenerator>,
    trust_proxy: bool,
) -> String {
    if let Some(generator) = generator {
        return match generator(request) {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                warn!(
                    path = %request.uri().path(),
                    "Custom key generator produced no key, using the unknown-client bucket"
                );
                UNKNOWN_CLIENT.to_string()
            }
        };
    }

    ClientKey::from_request(request, trust_proxy).to_string_key()
}

/// Resolve the client IP.
///
/// Proxy headers are consulted in order: `x-forwarded-for` (leftmost
/// entry), `x-real-ip`, `cf-connecting-ip`. The connection address is
/// the last resort either way.
fn client_ip(request: &Request, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        if let Some(forwarded) = header_str(request, "x-forwarded-for") {
            // May contain "client, proxy1, proxy2"; the leftmost entry
            // is the original client.
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
        if let Some(real_ip) = header_str(request, "x-real-ip") {
            return Some(real_ip.to_string());
        }
        if let Some(connecting_ip) = header_str(request, "cf-connecting-ip") {
            return Some(connecting_ip.to_string());
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

fn header_str<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
}
