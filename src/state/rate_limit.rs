use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Spaces request starts by a minimum interval
///
/// The limiter keeps a single "next free start" instant. A caller reserves the
/// next slot under the lock and sleeps outside it, so the spacing throttles the
/// launch rate without serialising the requests themselves: one request's
/// network wait overlaps the next request's spacing delay.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two request starts
    spacing: Duration,

    /// Earliest instant the next request may start
    next_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter that spaces request starts by `spacing`
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_start: Mutex::new(None),
        }
    }

    /// Reserves the next start slot without waiting for it
    ///
    /// Consecutive reservations are at least `spacing` apart.
    pub fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next_start = self
            .next_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let slot = match *next_start {
            Some(at) if at > now => at,
            _ => now,
        };
        *next_start = Some(slot + self.spacing);
        slot
    }

    /// Waits until the caller may start a request and returns its start slot
    pub async fn acquire(&self) -> Instant {
        let slot = self.reserve();
        if slot > Instant::now() {
            tracing::trace!("Rate limiter holding request for {:?}", slot - Instant::now());
            tokio::time::sleep_until(slot).await;
        }
        slot
    }
}
