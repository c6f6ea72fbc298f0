//! In-memory store and provider used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use pulse_shared::clients::db::{StoreError, StoreResult};
use pulse_shared::types::auth::Claims;

use crate::config::AppConfig;
use crate::models::{
    AnalyticsConnection, AnalyticsDay, AnalyticsReport, DailyMetrics, NewAnalyticsConnection,
    ReferrerDay, TopPageDay,
};
use crate::provider::{AnalyticsProvider, OAuthGrant, ProviderError};
use crate::range::DateRange;
use crate::store::AnalyticsStore;
use crate::AppState;

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn unavailable() -> StoreError {
    StoreError::Pool("store unavailable".into())
}

#[derive(Default)]
pub struct InMemoryStore {
    days: Mutex<Vec<AnalyticsDay>>,
    referrers: Mutex<Vec<ReferrerDay>>,
    pages: Mutex<Vec<TopPageDay>>,
    connections: Mutex<Vec<AnalyticsConnection>>,
    fail_reads: AtomicBool,
}

impl InMemoryStore {
    pub fn put_day(&self, user_id: Uuid, date: NaiveDate, visitors: i64, page_views: i64, updated_at: DateTime<Utc>) {
        let mut days = self.days.lock().unwrap();
        days.retain(|d| !(d.user_id == user_id && d.date == date));
        days.push(AnalyticsDay { id: Uuid::new_v4(), user_id, date, visitors, page_views, updated_at });
    }

    pub fn days_for(&self, user_id: Uuid) -> Vec<AnalyticsDay> {
        self.days.lock().unwrap().iter().filter(|d| d.user_id == user_id).cloned().collect()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

pub fn connect(store: &InMemoryStore, user_id: Uuid) {
    store.connections.lock().unwrap().push(AnalyticsConnection {
        user_id,
        provider: "google".into(),
        property_id: "123456".into(),
        refresh_token: "refresh-token".into(),
        connected_at: Utc::now(),
        updated_at: Utc::now(),
    });
}

#[async_trait]
impl AnalyticsStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn days_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<AnalyticsDay>> {
        self.check()?;
        let mut rows: Vec<_> = self
            .days
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == user_id && range.contains(d.date))
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.date);
        Ok(rows)
    }

    async fn referrers_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<ReferrerDay>> {
        self.check()?;
        Ok(self
            .referrers
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && range.contains(r.date))
            .cloned()
            .collect())
    }

    async fn pages_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<TopPageDay>> {
        self.check()?;
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id && range.contains(p.date))
            .cloned()
            .collect())
    }

    async fn upsert_report(
        &self,
        user_id: Uuid,
        report: AnalyticsReport,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.check()?;
        let (days, referrers, pages) = report.into_rows(user_id, fetched_at);
        let written = days.len();
        for d in days {
            self.put_day(d.user_id, d.date, d.visitors, d.page_views, d.updated_at);
        }
        {
            let mut stored = self.referrers.lock().unwrap();
            for r in referrers {
                stored.retain(|s| !(s.user_id == r.user_id && s.date == r.date && s.source == r.source));
                stored.push(r);
            }
        }
        let mut stored = self.pages.lock().unwrap();
        for p in pages {
            stored.retain(|s| !(s.user_id == p.user_id && s.date == p.date && s.path == p.path));
            stored.push(p);
        }
        Ok(written)
    }

    async fn connection(&self, user_id: Uuid) -> StoreResult<Option<AnalyticsConnection>> {
        self.check()?;
        Ok(self.connections.lock().unwrap().iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn save_connection(&self, new_conn: NewAnalyticsConnection) -> StoreResult<AnalyticsConnection> {
        self.check()?;
        let mut conns = self.connections.lock().unwrap();
        let connected_at = conns
            .iter()
            .find(|c| c.user_id == new_conn.user_id)
            .map(|c| c.connected_at)
            .unwrap_or(new_conn.updated_at);
        conns.retain(|c| c.user_id != new_conn.user_id);
        let saved = AnalyticsConnection {
            user_id: new_conn.user_id,
            provider: new_conn.provider,
            property_id: new_conn.property_id,
            refresh_token: new_conn.refresh_token,
            connected_at,
            updated_at: new_conn.updated_at,
        };
        conns.push(saved.clone());
        Ok(saved)
    }

    async fn delete_connection(&self, user_id: Uuid) -> StoreResult<bool> {
        self.check()?;
        let mut conns = self.connections.lock().unwrap();
        let before = conns.len();
        conns.retain(|c| c.user_id != user_id);
        Ok(conns.len() != before)
    }
}

pub struct FakeProvider {
    days: Vec<DailyMetrics>,
    fail: bool,
    fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn with_days(days: &[(&str, i64, i64)]) -> Self {
        Self {
            days: days
                .iter()
                .map(|&(date, visitors, page_views)| DailyMetrics { date: day(date), visitors, page_views })
                .collect(),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self { days: Vec::new(), fail: true, fetches: AtomicUsize::new(0) }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsProvider for FakeProvider {
    async fn exchange_code(&self, code: &str) -> Result<OAuthGrant, ProviderError> {
        if self.fail || code.is_empty() {
            return Err(ProviderError::OAuth("invalid_grant".into()));
        }
        Ok(OAuthGrant { refresh_token: format!("refresh-{code}") })
    }

    async fn fetch_range(
        &self,
        _connection: &AnalyticsConnection,
        _range: DateRange,
    ) -> Result<AnalyticsReport, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Api { status: 503, body: "backend error".into() });
        }
        Ok(AnalyticsReport { days: self.days.clone(), referrers: Vec::new(), pages: Vec::new() })
    }
}

pub fn test_state(store: Arc<InMemoryStore>, provider: Arc<FakeProvider>) -> Arc<AppState> {
    Arc::new(AppState::new(AppConfig::default(), store, provider, None))
}

/// Token accepted by a router built from [`test_state`].
pub fn test_token(user_id: Uuid) -> String {
    Claims::new(user_id, 300).sign(&AppConfig::default().jwt_secret).unwrap()
}
