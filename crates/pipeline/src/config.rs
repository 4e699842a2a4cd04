//! Polling parameters for the job controller.

use std::time::Duration;

/// Interval between operation status probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How long [`shutdown`](crate::controller::GenerationJobController::shutdown)
/// waits for the job task to exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tunable parameters for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status probe.
    pub interval: Duration,
    /// Upper bound on the total time spent polling. `None` waits until the
    /// service reports the operation as done.
    pub max_wait: Option<Duration>,
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_polls_every_ten_seconds_without_ceiling() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert!(config.max_wait.is_none());
    }

    #[test]
    fn builders_override_fields() {
        let config = PollConfig::default()
            .with_interval(Duration::from_millis(5))
            .with_max_wait(Some(Duration::from_secs(60)));
        assert_eq!(config.interval, Duration::from_millis(5));
        assert_eq!(config.max_wait, Some(Duration::from_secs(60)));
    }
}
