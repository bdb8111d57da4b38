//! Client-side request pacing using a sliding one-minute window

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Advisory requests-per-minute ceiling.
///
/// `acquire` sleeps until the window has room; it never rejects a request.
pub struct RateLimiter {
    requests_per_minute: u32,
    window: Duration,
    last_requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` calls per minute; 0 disables it
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Create a limiter with a custom window length
    pub fn with_window(requests_per_minute: u32, window: Duration) -> Self {
        Self {
            requests_per_minute,
            window,
            last_requests: Mutex::new(VecDeque::new()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn is_unlimited(&self) -> bool {
        self.requests_per_minute == 0
    }

    /// Wait until a request may be sent, then record it
    pub async fn acquire(&self) -> RateLimitGuard {
        if self.is_unlimited() {
            return RateLimitGuard { waited: Duration::ZERO };
        }

        let started = Instant::now();
        loop {
            if let Some(wait) = self.check_request_limit().await {
                tracing::debug!("Rate limit reached, sleeping {}ms", wait.as_millis());
                tokio::time::sleep(wait).await;
                continue;
            }

            return RateLimitGuard {
                waited: started.elapsed(),
            };
        }
    }

    /// Record the request if there is room, otherwise return how long to wait
    async fn check_request_limit(&self) -> Option<Duration> {
        let mut last = self.last_requests.lock().await;
        let now = Instant::now();

        while let Some(&front) = last.front() {
            if now.duration_since(front) >= self.window {
                last.pop_front();
            } else {
                break;
            }
        }

        if last.len() >= self.requests_per_minute as usize {
            if let Some(&oldest) = last.front() {
                let elapsed = now.duration_since(oldest);
                return Some(self.window.saturating_sub(elapsed) + Duration::from_millis(1));
            }
        }

        last.push_back(now);
        None
    }

    /// Requests recorded in the current window
    pub async fn in_flight_window(&self) -> usize {
        let last = self.last_requests.lock().await;
        let now = Instant::now();
        last.iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

/// Returned when rate limit permission is acquired
#[derive(Debug, Clone, Copy)]
pub struct RateLimitGuard {
    waited: Duration,
}

impl RateLimitGuard {
    /// Time spent sleeping before permission was granted
    pub fn waited(&self) -> Duration {
        self.waited
    }
}
