// Fixed-interval pacing for calls against rate-limited collaborators.
//
// The clock is injected so tests can observe every wait without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock: time only moves when something sleeps or calls `advance`.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Guarantees at least `min_interval` between consecutive permits.
pub struct Pacer {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(clock: Arc<dyn Clock>, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last_permit: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call may go out. The first permit is immediate;
    /// later ones sleep only for whatever remains of the interval.
    pub async fn wait(&self) {
        let last = *self.last_permit.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = last {
            let since = self.clock.now().saturating_duration_since(last);
            if since < self.min_interval {
                self.clock.sleep(self.min_interval - since).await;
            }
        }
        *self.last_permit.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer(ms: u64) -> (Arc<ManualClock>, Pacer) {
        let clock = Arc::new(ManualClock::new());
        let pacer = Pacer::new(clock.clone(), Duration::from_millis(ms));
        (clock, pacer)
    }

    #[tokio::test]
    async fn first_permit_is_immediate() {
        let (clock, pacer) = pacer(500);
        pacer.wait().await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_permits_wait_the_full_interval() {
        let (clock, pacer) = pacer(500);
        for _ in 0..4 {
            pacer.wait().await;
        }
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500); 3]);
    }

    #[tokio::test]
    async fn work_between_permits_counts_toward_the_interval() {
        let (clock, pacer) = pacer(4_000);
        pacer.wait().await;
        clock.advance(Duration::from_millis(3_000));
        pacer.wait().await;
        clock.advance(Duration::from_millis(5_000));
        pacer.wait().await;
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(1_000)]);
    }

    #[tokio::test]
    async fn zero_interval_never_sleeps() {
        let (clock, pacer) = pacer(0);
        pacer.wait().await;
        pacer.wait().await;
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }
}
