//! API middleware.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;

/// Per-IP rate limiter using governor.
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Maximum number of IPs to track in rate limiter cache.
const MAX_RATE_LIMITER_ENTRIES: usize = 10_000;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// IP-based rate limiter cache with automatic cleanup.
#[derive(Clone)]
pub struct RateLimiterCache {
    limiters: Arc<RwLock<HashMap<IpAddr, (Arc<IpRateLimiter>, Instant)>>>,
    quota: Quota,
    /// Time-to-live for cached rate limiters
    ttl: Duration,
    /// Key on `X-Forwarded-For`/`X-Real-IP` instead of the peer address
    trust_proxy_headers: bool,
}

impl RateLimiterCache {
    /// Create a new rate limiter cache.
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst.max(requests_per_second)).unwrap_or(rate);
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota: Quota::per_second(rate).allow_burst(burst),
            ttl: Duration::from_secs(3600),
            trust_proxy_headers: false,
        }
    }

    /// Key clients on forwarding headers.
    ///
    /// Only safe behind a proxy that overwrites them; otherwise any client
    /// gets a fresh quota by sending a new `X-Forwarded-For`.
    pub fn with_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Clean up expired rate limiters to prevent memory leaks.
    async fn cleanup_expired(&self) {
        let mut limiters = self.limiters.write().await;
        let now = Instant::now();

        limiters.retain(|_, (_, created_at)| now.duration_since(*created_at) < self.ttl);

        // Still over capacity: drop the oldest entries
        if limiters.len() > MAX_RATE_LIMITER_ENTRIES {
            let mut entries: Vec<_> = limiters.iter().map(|(ip, (_, t))| (*ip, *t)).collect();
            entries.sort_by_key(|(_, t)| *t);

            let to_remove = limiters.len() - MAX_RATE_LIMITER_ENTRIES;
            for (ip, _) in entries.into_iter().take(to_remove) {
                limiters.remove(&ip);
            }
            warn!("Rate limiter cache exceeded capacity, removed {} entries", to_remove);
        }
    }

    /// Get or create a rate limiter for an IP.
    pub async fn get_limiter(&self, ip: IpAddr) -> Arc<IpRateLimiter> {
        {
            let limiters = self.limiters.read().await;
            if let Some((limiter, _)) = limiters.get(&ip) {
                return Arc::clone(limiter);
            }
        }

        let mut limiters = self.limiters.write().await;
        // Double-check after acquiring write lock
        if let Some((limiter, _)) = limiters.get(&ip) {
            return Arc::clone(limiter);
        }

        if limiters.len() >= MAX_RATE_LIMITER_ENTRIES {
            drop(limiters);
            self.cleanup_expired().await;
            limiters = self.limiters.write().await;
        }

        let limiter = Arc::new(RateLimiter::direct(self.quota));
        limiters.insert(ip, (Arc::clone(&limiter), Instant::now()));
        limiter
    }

    /// Check rate limit for an IP.
    pub async fn check(&self, ip: IpAddr) -> bool {
        self.get_limiter(ip).await.check().is_ok()
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
            .allow_origin(Any)
            .max_age(Duration::from_secs(600))
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
            .expose_headers([
                header::CONTENT_LENGTH,
                header::CONTENT_TYPE,
                header::CONTENT_DISPOSITION,
            ])
            .allow_origin(origins)
            .max_age(Duration::from_secs(600))
    }
}

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("x-permitted-cross-domain-policies"),
        HeaderValue::from_static("none"),
    );

    response
}

/// Request ID middleware.
///
/// Reuses a client-supplied `X-Request-ID` or generates one, and echoes it
/// on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Request id stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    // Skip probe and scrape logging
    if !matches!(uri.path(), "/health" | "/ready" | "/metrics") {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            request_id = %request_id,
            "Request completed"
        );
    }

    response
}

/// Rate limiting middleware using IP-based rate limiter.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = extract_client_ip(&request, rate_limiter.trust_proxy_headers) {
        if !rate_limiter.check(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            let mut response = ApiError::RateLimited.into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            return response;
        }
    }

    next.run(request).await
}

/// Extract client IP from connection info, or from forwarding headers when
/// the deployment sits behind a trusted proxy.
fn extract_client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        // Leftmost X-Forwarded-For entry is the client
        if let Some(forwarded) = request.headers().get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    if let Ok(ip) = first_ip.trim().parse() {
                        return Some(ip);
                    }
                }
            }
        }

        if let Some(real_ip) = request.headers().get("x-real-ip") {
            if let Ok(ip) = real_ip.to_str().unwrap_or_default().parse() {
                return Some(ip);
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_per_ip() {
        let cache = RateLimiterCache::new(1, 1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(cache.check(a).await);
        assert!(!cache.check(a).await);
        assert!(cache.check(b).await);
    }

    #[test]
    fn test_extract_client_ip_behind_trusted_proxy() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&request, true),
            Some("203.0.113.7".parse().unwrap())
        );

        let request = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&request, true),
            Some("198.51.100.2".parse().unwrap())
        );

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request, true), None);
    }

    #[test]
    fn test_extract_client_ip_ignores_headers_by_default() {
        let peer: std::net::SocketAddr = "192.0.2.10:40000".parse().unwrap();
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7")
            .header("X-Real-IP", "198.51.100.2")
            .extension(ConnectInfo(peer))
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request, false), Some(peer.ip()));

        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request, false), None);
    }
}
