//! Sliding-window rate limiting for pipeline invocations.
//!
//! Tracks request timestamps per identifier and refuses admission once the
//! window is full. Each identifier owns its own lock: callers throttled
//! under different identifiers never contend, and the shared map lock is
//! held only long enough to look up an identifier's window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::QaError;

/// Default cap on requests per window.
const DEFAULT_MAX_REQUESTS: usize = 20;

/// Default window length.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

type Window = Arc<Mutex<VecDeque<Instant>>>;

/// Thread-safe sliding-window rate limiter.
///
/// Construct one per deployment surface and share it via `Arc`; the
/// process-wide instance from [`default_limiter`] backs chains built
/// without an explicit limiter.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_requests` per `window` for each
    /// identifier.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admits or refuses a request for `identifier`.
    ///
    /// Prunes timestamps older than the window, then appends the current
    /// instant if the identifier is under its limit. The read-prune-append
    /// sequence is atomic with respect to other callers using the same
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns `QaError::RateLimited` with a retry-after hint (time until
    /// the oldest retained request leaves the window) when the identifier
    /// is at its limit.
    pub fn try_acquire(&self, identifier: &str) -> Result<(), QaError> {
        let window = self.window_for(identifier);
        let mut timestamps = window.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            debug!(identifier, in_window = timestamps.len(), "request admitted");
            Ok(())
        } else {
            let retry_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            warn!(
                identifier,
                retry_after_s = retry_after.as_secs_f64(),
                "rate limit exceeded"
            );
            Err(QaError::RateLimited { retry_after })
        }
    }

    /// Reconfigures the limits, clearing all tracked windows.
    ///
    /// Takes `&mut self`: reconfiguration is a deployment-time operation,
    /// not something done while requests are in flight.
    pub fn configure(&mut self, max_requests: usize, window: Duration) {
        self.max_requests = max_requests;
        self.window = window;
        self.reset(None);
    }

    /// Clears tracking for one identifier, or for all when `None`.
    pub fn reset(&self, identifier: Option<&str>) {
        let mut map = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match identifier {
            Some(id) => {
                map.remove(id);
            }
            None => map.clear(),
        }
    }

    fn window_for(&self, identifier: &str) -> Window {
        let mut map = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(identifier.to_string()).or_default())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Process-wide limiter backing chains built without an explicit one.
///
/// Tests and multi-tenant deployments should construct their own
/// [`RateLimiter`] instead of relying on this shared instance.
pub fn default_limiter() -> Arc<RateLimiter> {
    static DEFAULT_LIMITER: OnceLock<Arc<RateLimiter>> = OnceLock::new();
    Arc::clone(DEFAULT_LIMITER.get_or_init(|| Arc::new(RateLimiter::default())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn admits_under_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.try_acquire("a").is_ok());
        }
    }

    #[test]
    fn refuses_over_limit_with_retry_hint() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("a").is_ok());

        match limiter.try_acquire("a") {
            Err(QaError::RateLimited { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(59));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_ok());
        assert!(limiter.try_acquire("a").is_err());
        assert!(limiter.try_acquire("b").is_err());
    }

    #[test]
    fn window_expiry_resets_admission() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("a").is_err());

        thread::sleep(Duration::from_millis(80));
        assert!(limiter.try_acquire("a").is_ok());
    }

    #[test]
    fn burst_admits_exactly_max_requests() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));

        let handles: Vec<_> = (0..15)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.try_acquire("shared").is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|&admitted| admitted)
            .count();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn reset_clears_one_identifier() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_ok());

        limiter.reset(Some("a"));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_err());
    }

    #[test]
    fn reset_all_clears_every_identifier() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_ok());

        limiter.reset(None);
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_ok());
    }

    #[test]
    fn configure_replaces_limits_and_clears_state() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("a").is_err());

        limiter.configure(2, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("a").is_err());
    }

    #[test]
    fn default_limiter_is_shared() {
        let first = default_limiter();
        let second = default_limiter();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
