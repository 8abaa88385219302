use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DashMapStateStore;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use http::StatusCode;
use palaver_config::{RateLimitConfig, RequestRateLimit};

type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;
type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Request rate limiter applied ahead of quota accounting
///
/// Protects the gateway itself; credit accounting for generation
/// happens later in the pipeline.
pub(crate) struct RequestLimiter {
    global: Option<GlobalLimiter>,
    per_ip: Option<KeyedLimiter>,
}

impl RequestLimiter {
    /// Build limiters from configuration
    pub(crate) fn new(config: &RateLimitConfig) -> anyhow::Result<Self> {
        let global = config
            .global
            .as_ref()
            .map(|limit| Ok::<_, anyhow::Error>(RateLimiter::direct(quota(limit)?)))
            .transpose()?;

        let per_ip = config
            .per_ip
            .as_ref()
            .map(|limit| Ok::<_, anyhow::Error>(RateLimiter::dashmap(quota(limit)?)))
            .transpose()?;

        Ok(Self { global, per_ip })
    }

    /// Check one request; `Err` carries the retry-after seconds
    pub(crate) fn check(&self, client_ip: Option<&str>) -> Result<(), u64> {
        if let Some(ref limiter) = self.global
            && limiter.check().is_err()
        {
            return Err(1);
        }

        if let Some(ref limiter) = self.per_ip
            && let Some(ip) = client_ip
            && limiter.check_key(&ip.to_owned()).is_err()
        {
            return Err(1);
        }

        Ok(())
    }
}

/// Convert a (requests, window) pair to governor's quota format
fn quota(limit: &RequestRateLimit) -> anyhow::Result<Quota> {
    let window = duration_str::parse(&limit.window)
        .map_err(|e| anyhow::anyhow!("invalid rate limit window '{}': {e}", limit.window))?;

    if window.is_zero() {
        anyhow::bail!("rate limit window must be > 0");
    }

    let per_second = f64::from(limit.requests.max(1)) / window.as_secs_f64();
    let replenish_interval = Duration::from_secs_f64(1.0 / per_second);
    let burst = NonZeroU32::new(limit.requests.max(1))
        .ok_or_else(|| anyhow::anyhow!("rate limit requests must be > 0"))?;

    Quota::with_period(replenish_interval)
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit period"))
        .map(|quota| quota.allow_burst(burst))
}

/// Middleware rejecting requests over the configured limits
pub(crate) async fn rate_limit_middleware(limiter: Arc<RequestLimiter>, request: Request, next: Next) -> Response {
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_owned());

    if let Err(retry_after) = limiter.check(client_ip.as_deref()) {
        let body = serde_json::json!({
            "error": {
                "message": "too many requests",
                "type": "rate_limit_error",
                "code": serde_json::Value::Null,
            }
        });

        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", retry_after.to_string())],
            Json(body),
        )
            .into_response();
    }

    next.run(request).await
}
