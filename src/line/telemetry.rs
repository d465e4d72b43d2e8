// Time-sliced telemetry gate, independent of the control loop rate

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TelemetryTimer {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl TelemetryTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// New period, measured from the previous emission
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// True (and re-armed) once a full interval has passed since the last frame
    pub fn due(&mut self, now: Instant) -> bool {
        let ready = match self.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if ready {
            self.last_emit = Some(now);
        }
        ready
    }
}
