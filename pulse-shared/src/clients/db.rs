use diesel::pg::{Pg, PgConnection};
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::Text;
use diesel::{Connection, RunQueryDsl};
use uuid::Uuid;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Session setting the row-level security policies compare `user_id` against.
pub const USER_SCOPE_SETTING: &str = "app.user_id";

/// Session setting naming a trusted service that may read across users.
pub const SERVICE_SCOPE_SETTING: &str = "app.service";

/// Failure talking to the relational store.
///
/// Callers decide per call site whether this fails open (refresh, retry later)
/// or is surfaced to the client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn create_pool(database_url: &str, max_size: u32) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(2))
        .test_on_check_out(true)
        .build(manager)?;

    tracing::info!(max_size, "database connection pool created");
    Ok(pool)
}

/// Run a diesel closure on the blocking pool with a pooled connection.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
        f(&mut conn).map_err(StoreError::from)
    })
    .await?
}

/// Like [`with_conn`], but the closure runs inside a single transaction.
pub async fn with_transaction<T, F>(pool: &DbPool, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
{
    with_conn(pool, move |conn| conn.transaction(|conn| f(conn))).await
}

/// Run the closure in a transaction whose row-level security scope is
/// `user_id`. The setting is transaction-local and is gone once the pooled
/// connection is returned.
pub async fn with_user_scope<T, F>(pool: &DbPool, user_id: Uuid, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
{
    with_transaction(pool, move |conn| {
        set_local(USER_SCOPE_SETTING, user_id.to_string()).execute(conn)?;
        f(conn)
    })
    .await
}

/// Run the closure in a transaction scoped to a named service rather than a
/// user. Only policies written for that service name admit its queries.
pub async fn with_service_scope<T, F>(pool: &DbPool, service: &'static str, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
{
    with_transaction(pool, move |conn| {
        set_local(SERVICE_SCOPE_SETTING, service.to_string()).execute(conn)?;
        f(conn)
    })
    .await
}

fn set_local(name: &str, value: String) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    diesel::sql_query("SELECT set_config($1, $2, true)")
        .into_boxed()
        .bind::<Text, _>(name.to_string())
        .bind::<Text, _>(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_scope_is_transaction_local() {
        let user_id = Uuid::new_v4();
        let sql = diesel::debug_query::<Pg, _>(&set_local(USER_SCOPE_SETTING, user_id.to_string())).to_string();

        assert!(sql.starts_with("SELECT set_config($1, $2, true)"));
        assert!(sql.contains(USER_SCOPE_SETTING));
        assert!(sql.contains(&user_id.to_string()));
    }
}
