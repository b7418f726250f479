use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::warn;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use thiserror::Error;

use crate::config::Config;

/// Counts vote attempts per caller over a sliding window.
pub struct AttemptLimiter {
    limit: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl AttemptLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vote_attempt_limit(), config.vote_attempt_window())
    }

    /// Register an attempt by `key`, returning false if it exceeds the limit.
    /// Refused attempts are not counted.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        // Forget callers whose attempts have all expired.
        let window = self.window;
        attempts.retain(|_, times| {
            while times
                .front()
                .map_or(false, |t| now.saturating_duration_since(*t) >= window)
            {
                times.pop_front();
            }
            !times.is_empty()
        });

        let times = attempts.entry(key.to_string()).or_default();
        if times.len() >= self.limit as usize {
            return false;
        }
        times.push_back(now);
        true
    }
}

/// Proof that the caller is within its attempt allowance.
#[derive(Debug)]
pub struct AttemptPermit;

#[derive(Debug, Error)]
#[error("Too many vote attempts from {0}")]
pub struct TooManyAttempts(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AttemptPermit {
    type Error = TooManyAttempts;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let limiter = match req.guard::<&State<AttemptLimiter>>().await {
            Outcome::Success(limiter) => limiter,
            // No limiter configured, so nothing to enforce.
            _ => return Outcome::Success(AttemptPermit),
        };
        let key = req
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if limiter.try_acquire(&key) {
            Outcome::Success(AttemptPermit)
        } else {
            warn!("Vote attempt limit reached for {key}");
            Outcome::Error((Status::TooManyRequests, TooManyAttempts(key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_over_limit() {
        let limiter = AttemptLimiter::new(3, Duration::from_secs(600));
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.try_acquire_at("10.0.0.1", now));
        }
        assert!(!limiter.try_acquire_at("10.0.0.1", now));
        // Other callers have their own allowance.
        assert!(limiter.try_acquire_at("10.0.0.2", now));
    }

    #[test]
    fn window_slides() {
        let limiter = AttemptLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.try_acquire_at("a", start));
        assert!(limiter.try_acquire_at("a", start + Duration::from_secs(30)));
        assert!(!limiter.try_acquire_at("a", start + Duration::from_secs(59)));

        // The first attempt has expired, the second has not.
        assert!(limiter.try_acquire_at("a", start + Duration::from_secs(60)));
        assert!(!limiter.try_acquire_at("a", start + Duration::from_secs(61)));
    }

    #[test]
    fn zero_limit_refuses_everything() {
        let limiter = AttemptLimiter::new(0, Duration::from_secs(60));
        assert!(!limiter.try_acquire("a"));
    }
}
