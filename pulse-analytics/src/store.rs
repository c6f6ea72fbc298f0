use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use uuid::Uuid;

use pulse_shared::clients::db::{with_conn, with_user_scope, DbPool, StoreResult};

use crate::models::{
    AnalyticsConnection, AnalyticsDay, AnalyticsReport, NewAnalyticsConnection, ReferrerDay,
    TopPageDay,
};
use crate::range::DateRange;
use crate::schema::{analytics_connections, analytics_days, referrer_days, top_page_days};

/// Per-user analytics persistence. Every method is scoped by `user_id`, both
/// in its filters and through the row-level security setting of its transaction.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn days_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<AnalyticsDay>>;

    async fn referrers_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<ReferrerDay>>;

    async fn pages_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<TopPageDay>>;

    /// Upsert a whole report atomically. Returns the number of day rows written.
    async fn upsert_report(
        &self,
        user_id: Uuid,
        report: AnalyticsReport,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<usize>;

    async fn connection(&self, user_id: Uuid) -> StoreResult<Option<AnalyticsConnection>>;

    async fn save_connection(&self, conn: NewAnalyticsConnection) -> StoreResult<AnalyticsConnection>;

    /// Returns whether a connection existed.
    async fn delete_connection(&self, user_id: Uuid) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgAnalyticsStore {
    pool: DbPool,
}

impl PgAnalyticsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn ping(&self) -> StoreResult<()> {
        with_conn(&self.pool, |conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn days_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<AnalyticsDay>> {
        with_user_scope(&self.pool, user_id, move |conn| {
            analytics_days::table
                .filter(analytics_days::user_id.eq(user_id))
                .filter(analytics_days::date.ge(range.start()))
                .filter(analytics_days::date.le(range.end()))
                .order(analytics_days::date.asc())
                .select(AnalyticsDay::as_select())
                .load(conn)
        })
        .await
    }

    async fn referrers_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<ReferrerDay>> {
        with_user_scope(&self.pool, user_id, move |conn| {
            referrer_days::table
                .filter(referrer_days::user_id.eq(user_id))
                .filter(referrer_days::date.ge(range.start()))
                .filter(referrer_days::date.le(range.end()))
                .select(ReferrerDay::as_select())
                .load(conn)
        })
        .await
    }

    async fn pages_in_range(&self, user_id: Uuid, range: DateRange) -> StoreResult<Vec<TopPageDay>> {
        with_user_scope(&self.pool, user_id, move |conn| {
            top_page_days::table
                .filter(top_page_days::user_id.eq(user_id))
                .filter(top_page_days::date.ge(range.start()))
                .filter(top_page_days::date.le(range.end()))
                .select(TopPageDay::as_select())
                .load(conn)
        })
        .await
    }

    async fn upsert_report(
        &self,
        user_id: Uuid,
        report: AnalyticsReport,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let (days, referrers, pages) = report.into_rows(user_id, fetched_at);

        with_user_scope(&self.pool, user_id, move |conn| {
            let mut written = 0;
            if !days.is_empty() {
                written = diesel::insert_into(analytics_days::table)
                    .values(&days)
                    .on_conflict((analytics_days::user_id, analytics_days::date))
                    .do_update()
                    .set((
                        analytics_days::visitors.eq(excluded(analytics_days::visitors)),
                        analytics_days::page_views.eq(excluded(analytics_days::page_views)),
                        analytics_days::updated_at.eq(excluded(analytics_days::updated_at)),
                    ))
                    .execute(conn)?;
            }

            if !referrers.is_empty() {
                diesel::insert_into(referrer_days::table)
                    .values(&referrers)
                    .on_conflict((referrer_days::user_id, referrer_days::date, referrer_days::source))
                    .do_update()
                    .set((
                        referrer_days::visitors.eq(excluded(referrer_days::visitors)),
                        referrer_days::updated_at.eq(excluded(referrer_days::updated_at)),
                    ))
                    .execute(conn)?;
            }

            if !pages.is_empty() {
                diesel::insert_into(top_page_days::table)
                    .values(&pages)
                    .on_conflict((top_page_days::user_id, top_page_days::date, top_page_days::path))
                    .do_update()
                    .set((
                        top_page_days::page_views.eq(excluded(top_page_days::page_views)),
                        top_page_days::updated_at.eq(excluded(top_page_days::updated_at)),
                    ))
                    .execute(conn)?;
            }

            Ok(written)
        })
        .await
    }

    async fn connection(&self, user_id: Uuid) -> StoreResult<Option<AnalyticsConnection>> {
        with_user_scope(&self.pool, user_id, move |conn| {
            analytics_connections::table
                .filter(analytics_connections::user_id.eq(user_id))
                .select(AnalyticsConnection::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn save_connection(&self, new_conn: NewAnalyticsConnection) -> StoreResult<AnalyticsConnection> {
        let user_id = new_conn.user_id;
        with_user_scope(&self.pool, user_id, move |conn| {
            diesel::insert_into(analytics_connections::table)
                .values(&new_conn)
                .on_conflict(analytics_connections::user_id)
                .do_update()
                .set((
                    analytics_connections::provider.eq(excluded(analytics_connections::provider)),
                    analytics_connections::property_id.eq(excluded(analytics_connections::property_id)),
                    analytics_connections::refresh_token.eq(excluded(analytics_connections::refresh_token)),
                    analytics_connections::updated_at.eq(excluded(analytics_connections::updated_at)),
                ))
                .returning(AnalyticsConnection::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn delete_connection(&self, user_id: Uuid) -> StoreResult<bool> {
        with_user_scope(&self.pool, user_id, move |conn| {
            let deleted = diesel::delete(
                analytics_connections::table.filter(analytics_connections::user_id.eq(user_id)),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}
