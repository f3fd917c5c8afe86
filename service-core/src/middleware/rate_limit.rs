use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    collections::VecDeque,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Idle keys are swept once every this many checks.
const PURGE_EVERY: u64 = 256;

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<SlidingWindowLimiter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Per-IP sliding window of request timestamps.
///
/// Each key holds the instants of the requests it made during the last
/// `window`. Timestamps that fall out of the window are popped from the front
/// whenever the key is checked, and keys left with no timestamps are dropped by
/// [`SlidingWindowLimiter::purge_idle`].
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    hits: DashMap<IpAddr, VecDeque<Instant>>,
    max_requests: u32,
    window: Duration,
    checks: AtomicU64,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            hits: DashMap::new(),
            max_requests: max_requests.max(1),
            window,
            checks: AtomicU64::new(0),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `ip` unless it is over the limit.
    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        let now = Instant::now();
        let decision = self.check_at(ip, now);

        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_idle_at(now);
        }

        decision
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitDecision {
        let mut entry = self.hits.entry(ip).or_default();
        let timestamps = entry.value_mut();

        evict_stale(timestamps, now, self.window);

        if timestamps.len() >= self.max_requests as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateLimitDecision::Limited { retry_after };
        }

        timestamps.push_back(now);
        RateLimitDecision::Allowed {
            remaining: self.max_requests - timestamps.len() as u32,
        }
    }

    /// Drop every key whose window no longer holds any request.
    ///
    /// Returns the number of keys removed.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    fn purge_idle_at(&self, now: Instant) -> usize {
        let before = self.hits.len();
        self.hits.retain(|_, timestamps| {
            evict_stale(timestamps, now, self.window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.hits.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

fn evict_stale(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

/// Create a keyed rate limiter (by IP)
pub fn create_ip_rate_limiter(max_requests: u32, window_seconds: u64) -> IpRateLimiter {
    Arc::new(SlidingWindowLimiter::new(
        max_requests,
        Duration::from_secs(window_seconds),
    ))
}

/// Resolve the client IP, preferring the first `X-Forwarded-For` hop set by
/// the fronting proxy over the socket peer address.
pub fn client_ip(request: &Request) -> Option<IpAddr> {
    forwarded_ip(request.headers()).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    let limit = HeaderValue::from(limiter.max_requests());

    match limiter.check(ip) {
        RateLimitDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, limit);
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            Ok(response)
        }
        RateLimitDecision::Limited { retry_after } => {
            // Round up so clients never retry inside the window.
            let retry_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            tracing::warn!(
                client_ip = %ip,
                retry_after_secs = retry_secs,
                "Rate limit exceeded"
            );
            metrics::counter!("rate_limit_rejections_total").increment(1);

            let mut response = AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(retry_secs),
            )
            .into_response();
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, limit);
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn allows_up_to_max_then_limits() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(
            limiter.check_at(ip(1), start),
            RateLimitDecision::Allowed { remaining: 2 }
        );
        assert_eq!(
            limiter.check_at(ip(1), start),
            RateLimitDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at(ip(1), start),
            RateLimitDecision::Allowed { remaining: 0 }
        );

        let later = start + Duration::from_secs(15);
        assert_eq!(
            limiter.check_at(ip(1), later),
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[test]
    fn window_slides_as_old_requests_expire() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at(ip(1), start);
        limiter.check_at(ip(1), start + Duration::from_secs(30));
        assert!(matches!(
            limiter.check_at(ip(1), start + Duration::from_secs(59)),
            RateLimitDecision::Limited { .. }
        ));

        // The first request has aged out, the second has not.
        assert_eq!(
            limiter.check_at(ip(1), start + Duration::from_secs(60)),
            RateLimitDecision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(
            limiter.check_at(ip(1), now),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at(ip(1), now),
            RateLimitDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at(ip(2), now),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let limiter = SlidingWindowLimiter::new(0, Duration::from_secs(60));
        assert_eq!(limiter.max_requests(), 1);
        assert!(matches!(
            limiter.check_at(ip(1), Instant::now()),
            RateLimitDecision::Allowed { remaining: 0 }
        ));
    }

    #[test]
    fn purge_drops_idle_keys_only() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at(ip(1), start);
        limiter.check_at(ip(2), start + Duration::from_secs(50));
        assert_eq!(limiter.tracked_keys(), 2);

        let removed = limiter.purge_idle_at(start + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(
            forwarded_ip(&headers),
            Some("203.0.113.7".parse().unwrap())
        );

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(forwarded_ip(&headers), None);
    }

    #[tokio::test]
    async fn middleware_rejects_with_headers() {
        let limiter = create_ip_rate_limiter(1, 60);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, ip_rate_limit_middleware));

        let request = || {
            axum::http::Request::builder()
                .uri("/")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[RATE_LIMIT_LIMIT_HEADER], "1");
        assert_eq!(first.headers()[RATE_LIMIT_REMAINING_HEADER], "0");

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
        assert_eq!(second.headers()[RATE_LIMIT_REMAINING_HEADER], "0");
    }
}
