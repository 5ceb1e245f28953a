use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use smsdesk_core::config::RateLimitConfig;
use tracing::warn;

/// Above this many tracked clients, finished windows are dropped on the
/// next request.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_forwarded_for: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, trust_forwarded_for: false, windows: Mutex::new(HashMap::new()) }
    }

    /// `None` when limiting is switched off.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            trust_forwarded_for: config.trust_forwarded_for,
            ..Self::new(config.max_requests, Duration::from_secs(config.window_secs))
        })
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        match self.windows.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let window = self.window;
        let mut table = self.table();

        if table.len() >= PRUNE_THRESHOLD {
            table.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
        }

        let entry = table
            .entry(client.to_string())
            .or_insert_with(|| Window { started: now, count: 0 });
        if now.saturating_duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.saturating_duration_since(entry.started);
            return RateDecision::Limited { retry_after: window.saturating_sub(elapsed) };
        }

        entry.count += 1;
        RateDecision::Allowed { remaining: self.max_requests - entry.count }
    }

    /// The socket peer, or the first `X-Forwarded-For` hop when the proxy
    /// is trusted.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = self
            .trust_forwarded_for
            .then(|| headers.get("x-forwarded-for").and_then(|value| value.to_str().ok()))
            .flatten()
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        match (forwarded, peer) {
            (Some(hop), _) => hop.to_string(),
            (None, Some(peer)) => peer.ip().to_string(),
            (None, None) => "unknown".to_string(),
        }
    }
}

pub async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let client = limiter.client_key(request.headers(), peer);

    match limiter.check(&client) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after } => {
            let retry_secs = retry_after.as_secs().max(1);
            warn!(
                event_name = "http.rate_limited",
                correlation_id = "rate_limit",
                client = %client,
                path = %request.uri().path(),
                retry_after_secs = retry_secs,
                "request rejected by rate limit"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                "Too Many Requests",
            )
                .into_response()
        }
    }
}
