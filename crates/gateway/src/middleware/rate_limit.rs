//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tutorly_common::errors::AppError;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter shared by every route of a throttled router
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<GlobalRateLimiter>,
    per_second: u32,
}

impl RateLimit {
    /// Zero values are raised to one
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            per_second: per_second.get(),
        }
    }

    pub fn check(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|_| AppError::RateLimited {
            limit: self.per_second,
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(err) = limit.check() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err(err);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let limit = RateLimit::new(1, 2);
        assert!(limit.check().is_ok());
        assert!(limit.check().is_ok());
        assert!(matches!(
            limit.check().unwrap_err(),
            AppError::RateLimited { limit: 1 }
        ));
    }

    #[test]
    fn test_zero_quota_is_raised() {
        let limit = RateLimit::new(0, 0);
        assert!(limit.check().is_ok());
    }
}
