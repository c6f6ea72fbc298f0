//! In-memory store, mailer and lease used by unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use pulse_shared::clients::db::{StoreError, StoreResult};
use pulse_shared::clients::email::{EmailDispatch, EmailError, EmailReceipt};

use crate::config::AppConfig;
use crate::models::{SpikeEvent, UserProfile, SPIKE_EVENT_TYPE};
use crate::services::runner::{LockError, RunLock, SpikeRunner};
use crate::services::spike_processor::SpikeProcessor;
use crate::store::SpikeStore;
use crate::AppState;

pub fn spike(user_id: Uuid, value: f64, previous_value: f64) -> SpikeEvent {
    SpikeEvent {
        id: Uuid::new_v4(),
        user_id,
        date: NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
        event_type: SPIKE_EVENT_TYPE.to_string(),
        metric_name: "visitors".to_string(),
        value,
        previous_value,
        email_sent: false,
        email_sent_at: None,
        created_at: Utc::now(),
    }
}

pub fn profile(
    user_id: Uuid,
    email: Option<&str>,
    email_notifications: Option<bool>,
    notification_email: Option<&str>,
) -> UserProfile {
    UserProfile {
        user_id,
        email: email.map(str::to_string),
        email_notifications,
        notification_email: notification_email.map(str::to_string),
    }
}

#[derive(Default)]
pub struct InMemorySpikeStore {
    events: Mutex<Vec<SpikeEvent>>,
    profiles: Mutex<Vec<UserProfile>>,
    fail_scan: AtomicBool,
    fail_profiles: AtomicBool,
    fail_marks: AtomicBool,
}

impl InMemorySpikeStore {
    pub fn put_event(&self, event: SpikeEvent) -> Uuid {
        let id = event.id;
        self.events.lock().unwrap().push(event);
        id
    }

    pub fn put_profile(&self, profile: UserProfile) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn event(&self, id: Uuid) -> Option<SpikeEvent> {
        self.events.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }

    pub fn unsent(&self) -> Vec<SpikeEvent> {
        self.events.lock().unwrap().iter().filter(|e| !e.email_sent).cloned().collect()
    }

    pub fn fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    pub fn fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpikeStore for InMemorySpikeStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn unprocessed_spikes(&self, limit: i64) -> StoreResult<Vec<SpikeEvent>> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("store unavailable".into()));
        }
        let mut events: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == SPIKE_EVENT_TYPE && !e.email_sent)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("store unavailable".into()));
        }
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn mark_sent(&self, event_id: Uuid, user_id: Uuid, sent_at: Option<DateTime<Utc>>) -> StoreResult<bool> {
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("store unavailable".into()));
        }
        let mut events = self.events.lock().unwrap();
        match events
            .iter_mut()
            .find(|e| e.id == event_id && e.user_id == user_id && !e.email_sent)
        {
            Some(e) => {
                e.email_sent = true;
                e.email_sent_at = sent_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Records every accepted send; rejects addresses registered with `fail_for`.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailDispatch for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, EmailError> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(EmailError::Api { status: 422, body: "invalid recipient".into() });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentEmail { to: to.into(), subject: subject.into(), html: html.into() });
        Ok(EmailReceipt { id: Some(format!("email-{}", sent.len())) })
    }
}

#[derive(Default)]
pub struct InMemoryRunLock {
    holder: Mutex<Option<String>>,
}

impl InMemoryRunLock {
    pub fn holder(&self) -> Option<String> {
        self.holder.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunLock for InMemoryRunLock {
    async fn acquire(&self, token: &str) -> Result<bool, LockError> {
        let mut holder = self.holder.lock().unwrap();
        if holder.is_some() {
            return Ok(false);
        }
        *holder = Some(token.to_string());
        Ok(true)
    }

    async fn release(&self, token: &str) -> Result<(), LockError> {
        let mut holder = self.holder.lock().unwrap();
        if holder.as_deref() == Some(token) {
            *holder = None;
        }
        Ok(())
    }
}

pub fn test_state(
    store: Arc<InMemorySpikeStore>,
    mailer: Arc<RecordingMailer>,
    cron_secret: &str,
    lock: Option<Arc<InMemoryRunLock>>,
) -> Arc<AppState> {
    let config = AppConfig { cron_secret: cron_secret.to_string(), ..AppConfig::default() };
    let processor = SpikeProcessor::new(store.clone(), mailer, config.dashboard_url.clone(), config.batch_size);
    let lock = lock.map(|l| l as Arc<dyn RunLock>);
    Arc::new(AppState {
        config,
        store,
        runner: SpikeRunner::new(processor, lock),
        metrics_handle: None,
    })
}
