//! Response pacing for the event endpoints.

use std::time::Duration;

/// Fixed delays applied after a response is ready and before it is written.
///
/// The delay does not bound the storage work that precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Delay for `GET /api/events`.
    pub feed_delay: Duration,
    /// Delay for `GET /api/events/{id}`.
    pub event_delay: Duration,
}

impl Pacing {
    /// No delays at all.
    pub fn none() -> Self {
        Self {
            feed_delay: Duration::ZERO,
            event_delay: Duration::ZERO,
        }
    }

    pub async fn before_feed_response(&self) {
        pause(self.feed_delay).await;
    }

    pub async fn before_event_response(&self) {
        pause(self.event_delay).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            feed_delay: Duration::from_millis(200),
            event_delay: Duration::from_millis(300),
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
