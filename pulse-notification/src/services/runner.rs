use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use pulse_shared::clients::db::StoreError;
use pulse_shared::clients::redis::RedisClient;

use crate::services::spike_processor::{RunSummary, SpikeProcessor};

pub const RUN_LOCK_KEY: &str = "pulse:spike-run";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Lease held for the duration of one processor run.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Returns false when another holder has the lease.
    async fn acquire(&self, token: &str) -> Result<bool, LockError>;

    async fn release(&self, token: &str) -> Result<(), LockError>;
}

pub struct RedisRunLock {
    redis: RedisClient,
    ttl_secs: u64,
}

impl RedisRunLock {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }
}

#[async_trait]
impl RunLock for RedisRunLock {
    async fn acquire(&self, token: &str) -> Result<bool, LockError> {
        Ok(self.redis.set_nx(RUN_LOCK_KEY, token, self.ttl_secs).await?)
    }

    async fn release(&self, token: &str) -> Result<(), LockError> {
        self.redis.del_if_eq(RUN_LOCK_KEY, token).await?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    AlreadyRunning,
}

/// Runs the processor, under the lease when one is configured.
#[derive(Clone)]
pub struct SpikeRunner {
    processor: SpikeProcessor,
    lock: Option<Arc<dyn RunLock>>,
}

impl SpikeRunner {
    pub fn new(processor: SpikeProcessor, lock: Option<Arc<dyn RunLock>>) -> Self {
        Self { processor, lock }
    }

    /// An unreachable lease backend does not block the run; overlapping runs
    /// are tolerated, a skipped run is not.
    pub async fn run(&self, trigger: &'static str) -> Result<RunOutcome, StoreError> {
        let Some(lock) = &self.lock else {
            return self.processor.run().await.map(RunOutcome::Completed);
        };

        let token = Uuid::new_v4().to_string();
        match lock.acquire(&token).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(trigger, "spike run already in progress, skipping");
                return Ok(RunOutcome::AlreadyRunning);
            }
            Err(e) => {
                tracing::warn!(trigger, error = %e, "run lock unavailable, running without it");
                return self.processor.run().await.map(RunOutcome::Completed);
            }
        }

        let result = self.processor.run().await;

        if let Err(e) = lock.release(&token).await {
            tracing::warn!(trigger, error = %e, "failed to release run lock, it will expire");
        }

        result.map(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{profile, spike, InMemoryRunLock, InMemorySpikeStore, RecordingMailer};

    fn runner(store: Arc<InMemorySpikeStore>, lock: Option<Arc<dyn RunLock>>) -> SpikeRunner {
        let processor = SpikeProcessor::new(store, Arc::new(RecordingMailer::default()), "https://app.pulse.dev", 500);
        SpikeRunner::new(processor, lock)
    }

    #[tokio::test]
    async fn held_lease_skips_the_run() {
        let store = Arc::new(InMemorySpikeStore::default());
        let user = Uuid::new_v4();
        store.put_profile(profile(user, Some("owner@example.com"), None, None));
        store.put_event(spike(user, 75.0, 50.0));

        let lock = Arc::new(InMemoryRunLock::default());
        assert!(lock.acquire("other-run").await.unwrap());

        let outcome = runner(store.clone(), Some(lock)).run("test").await.unwrap();
        assert_eq!(outcome, RunOutcome::AlreadyRunning);
        assert_eq!(store.unsent().len(), 1);
    }

    #[tokio::test]
    async fn lease_is_released_after_the_run() {
        let store = Arc::new(InMemorySpikeStore::default());
        let lock = Arc::new(InMemoryRunLock::default());

        let r = runner(store, Some(lock.clone()));
        assert_eq!(r.run("test").await.unwrap(), RunOutcome::Completed(RunSummary::default()));
        assert!(lock.holder().is_none());
        assert_eq!(r.run("test").await.unwrap(), RunOutcome::Completed(RunSummary::default()));
    }

    #[tokio::test]
    async fn lease_is_released_when_the_run_fails() {
        let store = Arc::new(InMemorySpikeStore::default());
        store.fail_scan(true);
        let lock = Arc::new(InMemoryRunLock::default());

        assert!(runner(store, Some(lock.clone())).run("test").await.is_err());
        assert!(lock.holder().is_none());
    }

    #[tokio::test]
    async fn no_lock_configured_always_runs() {
        let store = Arc::new(InMemorySpikeStore::default());
        let outcome = runner(store, None).run("test").await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(RunSummary::default()));
    }
}
