use tracing::{debug, info};

use crate::Reading;

/// How a reading was classified by the warm-up policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    /// Too early in the session; the geofence must not be queried.
    WarmingUp,
    /// The first reading that counts.
    First,
    /// Any later reading.
    Subsequent,
}

impl Fix {
    pub fn is_usable(self) -> bool {
        !matches!(self, Fix::WarmingUp)
    }
}

/// Counts readings of the current session and suppresses the noisy first
/// fixes until `threshold` readings have arrived.
#[derive(Debug, Clone)]
pub struct LocationTracker {
    threshold: u32,
    received: u32,
    last: Option<Reading>,
}

impl LocationTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            received: 0,
            last: None,
        }
    }

    /// Records a reading and classifies it.
    pub fn record(&mut self, reading: Reading) -> Fix {
        debug!(
            latitude = reading.latitude,
            longitude = reading.longitude,
            accuracy = reading.accuracy,
            "location reading"
        );
        self.last = Some(reading);
        self.received = self.received.saturating_add(1);

        if self.received < self.threshold {
            debug!(received = self.received, "warming up: ignored reading");
            Fix::WarmingUp
        } else if self.received == self.threshold {
            info!("first location acquired");
            Fix::First
        } else {
            Fix::Subsequent
        }
    }

    /// Most recent reading, including warm-up readings.
    pub fn last(&self) -> Option<Reading> {
        self.last
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    /// Starts warming up again.
    pub fn reset(&mut self) {
        self.received = 0;
        self.last = None;
    }
}
