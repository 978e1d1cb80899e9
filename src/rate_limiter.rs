//! Request cadence limiting per operation class
//!
//! The remote job API throttles create, poll, and fetch requests
//! independently, so the limiter keeps one window per class. Each window
//! is stop-and-wait: at most `burst_capacity` requests with `min_spacing`
//! between them, then a mandatory full `cooldown` before the counter
//! resets. This is deliberately not a refilling token bucket: a class
//! that exhausts its burst always pays the whole cooldown, matching the
//! request pattern the vendor limits were measured against.

use crate::config::{RateLimitConfig, RateWindowConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The three classes of remote request, each throttled independently
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// CREATE-job requests
    Create,
    /// POLL-job requests
    Poll,
    /// FETCH-artifact requests
    Fetch,
}

impl OperationClass {
    /// Lowercase name, used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Create => "create",
            OperationClass::Poll => "poll",
            OperationClass::Fetch => "fetch",
        }
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one class's window
#[derive(Debug)]
struct RateWindow {
    burst_capacity: u32,
    remaining_in_burst: u32,
    min_spacing: Duration,
    cooldown: Duration,
    last_request: Option<Instant>,
}

impl RateWindow {
    fn new(config: RateWindowConfig) -> Self {
        // A zero-capacity window would deadlock the class entirely
        let capacity = config.burst_capacity.max(1);
        Self {
            burst_capacity: capacity,
            remaining_in_burst: capacity,
            min_spacing: config.min_spacing,
            cooldown: config.cooldown,
            last_request: None,
        }
    }
}

struct Inner {
    enabled: AtomicBool,
    create: Mutex<RateWindow>,
    poll: Mutex<RateWindow>,
    fetch: Mutex<RateWindow>,
}

/// Rate limiter shared by all coordinators talking to one remote account
///
/// Cloning yields a handle over the same windows, so several coordinators
/// can share a single account-wide limit. Access to each class's counters
/// is mutually exclusive: concurrent callers of the same class queue on
/// the class lock and are admitted one at a time.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Create a limiter from configuration
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                enabled: AtomicBool::new(config.enabled),
                create: Mutex::new(RateWindow::new(config.create)),
                poll: Mutex::new(RateWindow::new(config.poll)),
                fetch: Mutex::new(RateWindow::new(config.fetch)),
            }),
        }
    }

    /// Create a limiter that admits every request immediately
    ///
    /// Used for low-volume or manual operation where vendor limits are
    /// not a concern.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(&RateLimitConfig::disabled())
    }

    /// Switch rate limiting on or off
    ///
    /// Takes effect for subsequent `admit` calls; a caller already
    /// sleeping inside a window finishes its wait.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether rate limiting is currently applied
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Wait until a request of the given class is permitted
    ///
    /// Blocks the calling task, not the runtime. Per request:
    /// 1. if the class has been used before and `min_spacing` has not
    ///    elapsed since, sleep the remainder;
    /// 2. stamp the request and decrement the burst counter;
    /// 3. if the burst is now exhausted, sleep the full `cooldown` and
    ///    reset the counter.
    pub async fn admit(&self, class: OperationClass) {
        if !self.is_enabled() {
            return;
        }

        let mut window = match class {
            OperationClass::Create => self.inner.create.lock().await,
            OperationClass::Poll => self.inner.poll.lock().await,
            OperationClass::Fetch => self.inner.fetch.lock().await,
        };

        if let Some(last) = window.last_request {
            let elapsed = last.elapsed();
            if elapsed < window.min_spacing {
                let wait = window.min_spacing - elapsed;
                tracing::debug!(
                    class = class.as_str(),
                    wait_ms = wait.as_millis() as u64,
                    "Waiting out minimum request spacing"
                );
                tokio::time::sleep(wait).await;
            }
        }

        window.last_request = Some(Instant::now());
        window.remaining_in_burst -= 1;

        if window.remaining_in_burst == 0 {
            // Full cooldown even if part of the burst window has already
            // recovered; the counter only resets after the whole pause.
            tracing::debug!(
                class = class.as_str(),
                cooldown_ms = window.cooldown.as_millis() as u64,
                "Burst exhausted, paying cooldown"
            );
            tokio::time::sleep(window.cooldown).await;
            window.remaining_in_burst = window.burst_capacity;
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn config(
        capacity: u32,
        spacing_ms: u64,
        cooldown_ms: u64,
    ) -> RateLimitConfig {
        let window = RateWindowConfig::new(
            capacity,
            Duration::from_millis(spacing_ms),
            Duration::from_millis(cooldown_ms),
        );
        RateLimitConfig {
            enabled: true,
            create: window,
            poll: window,
            fetch: window,
        }
    }

    #[tokio::test]
    async fn disabled_limiter_admits_immediately() {
        let limiter = RateLimiter::disabled();

        let start = Instant::now();
        for _ in 0..50 {
            limiter.admit(OperationClass::Create).await;
        }
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "disabled limiter should not wait, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let limiter = RateLimiter::new(&config(10, 500, 500));

        let start = Instant::now();
        limiter.admit(OperationClass::Poll).await;
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "first request of a class should be admitted immediately"
        );
    }

    #[tokio::test]
    async fn min_spacing_is_enforced_between_requests() {
        let limiter = RateLimiter::new(&config(10, 200, 5_000));

        let start = Instant::now();
        limiter.admit(OperationClass::Poll).await;
        limiter.admit(OperationClass::Poll).await;
        let elapsed = start.elapsed();

        // Second admit must wait out the 200ms spacing; allow scheduling slop.
        assert!(
            elapsed >= Duration::from_millis(150),
            "expected >=150ms between admissions, got {:?}",
            elapsed
        );
        assert!(
            elapsed < Duration::from_millis(1_000),
            "spacing wait took far too long: {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn burst_exhaustion_pays_full_cooldown() {
        // Capacity 2: the second admission exhausts the burst and sleeps
        // the whole cooldown before returning.
        let limiter = RateLimiter::new(&config(2, 10, 300));

        let start = Instant::now();
        limiter.admit(OperationClass::Create).await;
        limiter.admit(OperationClass::Create).await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(250),
            "burst exhaustion should pay the ~300ms cooldown, got {:?}",
            elapsed
        );

        // Counter reset: a third admission only waits spacing, not cooldown.
        let start = Instant::now();
        limiter.admit(OperationClass::Create).await;
        assert!(
            start.elapsed() < Duration::from_millis(200),
            "after cooldown the burst counter should be full again"
        );
    }

    #[tokio::test]
    async fn classes_are_independent() {
        // Exhaust the create window; poll must still be admitted instantly.
        let limiter = RateLimiter::new(&config(1, 10, 400));

        let start = Instant::now();
        limiter.admit(OperationClass::Create).await; // pays cooldown (capacity 1)
        let after_create = start.elapsed();
        assert!(after_create >= Duration::from_millis(300));

        let start = Instant::now();
        limiter.admit(OperationClass::Poll).await;
        limiter.admit(OperationClass::Fetch).await;
        assert!(
            start.elapsed() < Duration::from_millis(300),
            "poll/fetch windows must not be affected by the create window"
        );
    }

    #[tokio::test]
    async fn rate_ceiling_holds_for_a_burst() {
        // Capacity 3, spacing 50ms: four admissions cannot complete before
        // 3 spacings + the cooldown paid on the third admission.
        let limiter = RateLimiter::new(&config(3, 50, 200));

        let start = Instant::now();
        for _ in 0..4 {
            limiter.admit(OperationClass::Fetch).await;
        }
        let elapsed = start.elapsed();

        // 2 spacings (50ms each) before admissions 2-3, cooldown (200ms)
        // after admission 3, spacing before admission 4.
        assert!(
            elapsed >= Duration::from_millis(250),
            "4 admissions through a 3-burst window finished too fast: {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn set_enabled_toggles_limiting() {
        let limiter = RateLimiter::new(&config(10, 300, 5_000));
        assert!(limiter.is_enabled());

        limiter.set_enabled(false);
        let start = Instant::now();
        limiter.admit(OperationClass::Poll).await;
        limiter.admit(OperationClass::Poll).await;
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "disabled limiter should skip spacing waits"
        );

        limiter.set_enabled(true);
        assert!(limiter.is_enabled());
    }

    #[tokio::test]
    async fn clone_shares_windows() {
        let original = RateLimiter::new(&config(10, 200, 5_000));
        let clone = original.clone();

        // A request through the clone stamps the shared window, so the
        // next request through the original pays the spacing wait.
        clone.admit(OperationClass::Create).await;

        let start = Instant::now();
        original.admit(OperationClass::Create).await;
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "clone and original must share per-class state"
        );

        // Toggling through the clone is visible to the original.
        clone.set_enabled(false);
        assert!(!original.is_enabled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_callers_are_serialized_per_class() {
        let limiter = RateLimiter::new(&config(10, 100, 5_000));

        let start = Instant::now();
        let mut handles = vec![];
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.admit(OperationClass::Poll).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let elapsed = start.elapsed();

        // 3 admissions with 100ms spacing: at least 2 spacings elapse.
        assert!(
            elapsed >= Duration::from_millis(150),
            "concurrent admissions must queue on the class lock, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped_to_one() {
        // A zero burst would underflow and deadlock; new() clamps it.
        let limiter = RateLimiter::new(&config(0, 10, 100));
        limiter.admit(OperationClass::Create).await;
        let window = limiter.inner.create.lock().await;
        assert_eq!(window.burst_capacity, 1);
        assert_eq!(window.remaining_in_burst, 1);
    }
}
