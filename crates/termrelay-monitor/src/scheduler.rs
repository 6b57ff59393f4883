use std::time::Duration;
use termrelay_config::ScheduleConfig;
use tokio_util::sync::CancellationToken;

/// Poll cadence for one execution: an adaptive interval while running and a
/// fixed short interval while stabilizing
#[derive(Debug, Clone)]
pub struct PollScheduler {
    config: ScheduleConfig,
}

impl PollScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// Interval to use after `elapsed` time since the execution started
    pub fn interval_for(&self, elapsed: Duration) -> Duration {
        let secs = elapsed.as_secs();
        let max = self.config.max_interval();

        self.config
            .steps
            .iter()
            .find(|step| secs < step.until_secs)
            .map(|step| Duration::from_millis(step.interval_ms))
            .unwrap_or(max)
            .min(max)
    }

    /// Interval announced when monitoring starts
    pub fn initial_interval(&self) -> Duration {
        self.interval_for(Duration::ZERO)
    }

    pub fn stabilize_interval(&self) -> Duration {
        self.config.stabilize_interval()
    }

    pub fn status_update_interval(&self) -> Duration {
        self.config.status_update_interval()
    }

    pub fn takeover_grace(&self) -> Duration {
        self.config.takeover_grace()
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on
    /// cancellation.
    pub async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termrelay_config::PollStep;

    #[test]
    fn test_default_steps() {
        let scheduler = PollScheduler::new(ScheduleConfig::default());

        assert_eq!(scheduler.interval_for(Duration::ZERO), Duration::from_secs(5));
        assert_eq!(scheduler.interval_for(Duration::from_secs(59)), Duration::from_secs(5));
        assert_eq!(scheduler.interval_for(Duration::from_secs(60)), Duration::from_secs(10));
        assert_eq!(scheduler.interval_for(Duration::from_secs(1_000)), Duration::from_secs(20));
        assert_eq!(scheduler.interval_for(Duration::from_secs(3_000)), Duration::from_secs(30));
        assert_eq!(scheduler.interval_for(Duration::from_secs(7_200)), Duration::from_secs(60));
        assert!(scheduler.stabilize_interval() < scheduler.initial_interval());
    }

    #[test]
    fn test_steps_are_capped_by_max_interval() {
        let scheduler = PollScheduler::new(ScheduleConfig {
            max_interval_ms: 8_000,
            steps: vec![
                PollStep { until_secs: 10, interval_ms: 2_000 },
                PollStep { until_secs: 100, interval_ms: 15_000 },
            ],
            ..ScheduleConfig::default()
        });

        assert_eq!(scheduler.interval_for(Duration::from_secs(5)), Duration::from_secs(2));
        assert_eq!(scheduler.interval_for(Duration::from_secs(50)), Duration::from_secs(8));
        assert_eq!(scheduler.interval_for(Duration::from_secs(500)), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses() {
        let scheduler = PollScheduler::new(ScheduleConfig::default());
        let token = CancellationToken::new();
        let started = tokio::time::Instant::now();

        assert!(scheduler.wait(Duration::from_secs(5), &token).await);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_cancel() {
        let scheduler = PollScheduler::new(ScheduleConfig::default());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        assert!(!scheduler.wait(Duration::from_secs(60), &token).await);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
