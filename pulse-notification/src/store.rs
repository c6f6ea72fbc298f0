use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use pulse_shared::clients::db::{with_conn, with_service_scope, with_user_scope, DbPool, StoreResult};

use crate::models::{SpikeEvent, UserProfile, SPIKE_EVENT_TYPE};
use crate::schema::{spike_events, user_profiles};

/// Service name the cross-user scan policy on `spike_events` admits.
pub const SPIKE_SCAN_SERVICE: &str = "spike-notifier";

#[async_trait]
pub trait SpikeStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Unsent spike events across all users, newest first.
    async fn unprocessed_spikes(&self, limit: i64) -> StoreResult<Vec<SpikeEvent>>;

    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;

    /// Flip `email_sent` to true. `sent_at` is stamped only when an email went out.
    ///
    /// Returns false when the event was already marked.
    async fn mark_sent(&self, event_id: Uuid, user_id: Uuid, sent_at: Option<DateTime<Utc>>) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgSpikeStore {
    pool: DbPool,
}

impl PgSpikeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpikeStore for PgSpikeStore {
    async fn ping(&self) -> StoreResult<()> {
        with_conn(&self.pool, |conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn unprocessed_spikes(&self, limit: i64) -> StoreResult<Vec<SpikeEvent>> {
        with_service_scope(&self.pool, SPIKE_SCAN_SERVICE, move |conn| {
            spike_events::table
                .filter(spike_events::event_type.eq(SPIKE_EVENT_TYPE))
                .filter(spike_events::email_sent.eq(false))
                .order((spike_events::created_at.desc(), spike_events::id.asc()))
                .limit(limit)
                .select(SpikeEvent::as_select())
                .load(conn)
        })
        .await
    }

    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        with_user_scope(&self.pool, user_id, move |conn| {
            user_profiles::table
                .filter(user_profiles::user_id.eq(user_id))
                .select(UserProfile::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn mark_sent(&self, event_id: Uuid, user_id: Uuid, sent_at: Option<DateTime<Utc>>) -> StoreResult<bool> {
        with_user_scope(&self.pool, user_id, move |conn| {
            let updated = diesel::update(
                spike_events::table
                    .filter(spike_events::id.eq(event_id))
                    .filter(spike_events::user_id.eq(user_id))
                    .filter(spike_events::email_sent.eq(false)),
            )
            .set((
                spike_events::email_sent.eq(true),
                spike_events::email_sent_at.eq(sent_at),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }
}
