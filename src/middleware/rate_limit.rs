// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-client rate limiting.
//!
//! Each client IP gets its own token bucket refilled at `rps` tokens per
//! second and holding at most `burst` tokens. Requests arriving with an
//! empty bucket are rejected with 429.

use crate::config::LimiterConfig;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Token buckets keyed by client IP.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClientRateLimiter {
    /// Build a limiter, or `None` if the configuration admits no requests.
    pub fn new(config: &LimiterConfig) -> Option<Self> {
        if !config.rps.is_finite() || config.rps <= 0.0 {
            return None;
        }
        let burst = NonZeroU32::new(config.burst)?;
        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / config.rps))?
            .allow_burst(burst);

        Some(Self {
            limiter: RateLimiter::keyed(quota),
        })
    }

    /// Take a token for `client`. Returns false when its bucket is empty.
    pub fn check(&self, client: IpAddr) -> bool {
        self.limiter.check_key(&client).is_ok()
    }

    /// Drop buckets of clients that have been idle long enough to be full.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

/// Client address: the first `X-Forwarded-For` hop if present, otherwise
/// the peer address of the connection.
fn client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Reject requests from clients that have exhausted their bucket.
pub async fn rate_limit(
    State(limiter): State<Arc<ClientRateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if !limiter.check(client) {
        tracing::warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded");
        return AppError::RateLimitExceeded.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::{routing::get, Router};
    use tower::ServiceExt; // for oneshot

    fn limiter(rps: f64, burst: u32) -> Option<ClientRateLimiter> {
        ClientRateLimiter::new(&LimiterConfig {
            rps,
            burst,
            enabled: true,
        })
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_rejects_unusable_config() {
        assert!(limiter(0.0, 4).is_none());
        assert!(limiter(-1.0, 4).is_none());
        assert!(limiter(2.0, 0).is_none());
        assert!(limiter(2.0, 4).is_some());
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter(0.001, 3).unwrap();
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check(client));
        }
        assert!(!limiter.check(client));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = limiter(0.001, 1).unwrap();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let req = Request::builder()
            .uri("/")
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7".parse::<IpAddr>().unwrap());

        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&req), "192.0.2.1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_middleware_returns_429() {
        let limiter = Arc::new(limiter(0.001, 1).unwrap());
        let app = Router::new()
            .route("/", get(|| async { "Hello" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        let first = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request_from("10.0.0.1")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
