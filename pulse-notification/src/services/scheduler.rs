use std::time::Duration;

use crate::services::runner::{RunOutcome, SpikeRunner};

/// Run the processor every `interval_secs`, for deployments without an
/// external cron calling the trigger route.
pub fn spawn_spike_task(runner: SpikeRunner, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match runner.run("schedule").await {
                Ok(RunOutcome::Completed(summary)) => {
                    tracing::debug!(processed = summary.processed, errors = summary.errors, "scheduled spike run completed");
                }
                Ok(RunOutcome::AlreadyRunning) => {}
                Err(e) => {
                    tracing::error!(error = %e, "scheduled spike run failed");
                }
            }
        }
    });
}
