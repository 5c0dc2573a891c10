use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

use super::report::CycleReport;

/// Something the scheduler can drive, one cycle at a time.
#[async_trait]
pub trait CycleRunner: Send {
    async fn run_cycle(&mut self) -> AppResult<CycleReport>;
}

/// Inclusive range the delay between cycles is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval {
    min: Duration,
    max: Duration,
}

impl PollInterval {
    pub fn new(min: Duration, max: Duration) -> AppResult<Self> {
        if min.is_zero() || min > max {
            return Err(AppError::Config(format!(
                "invalid poll interval {}s..={}s",
                min.as_secs(),
                max.as_secs()
            )));
        }
        Ok(Self { min, max })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(45),
            max: Duration::from_secs(120),
        }
    }
}

/// Runs cycles back to back with a randomized pause, never two at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    interval: PollInterval,
}

impl Scheduler {
    pub fn new(interval: PollInterval) -> Self {
        Self { interval }
    }

    /// Loops until `shutdown` flips to true or its sender goes away.
    ///
    /// Shutdown is honored between cycles only. Returns an error solely for
    /// authorization failures, which need an operator to log in again.
    pub async fn run<R: CycleRunner + ?Sized>(
        &self,
        runner: &mut R,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let mut cycle: u64 = 0;
        loop {
            if *shutdown.borrow_and_update() {
                info!("responder stopping");
                return Ok(());
            }

            cycle += 1;
            match runner.run_cycle().await {
                Ok(report) => info!(cycle, "cycle finished: {}", report.summary()),
                Err(err) if err.is_auth() => {
                    error!(cycle, error = %err, "authorization failed; responder halted");
                    return Err(err);
                }
                Err(err) => warn!(cycle, error = %err, "cycle aborted"),
            }

            let delay = self.interval.sample(&mut rand::thread_rng());
            info!(delay_secs = delay.as_secs(), "next cycle scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("responder stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}
