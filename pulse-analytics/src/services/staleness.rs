//! Decides whether stored analytics for a date range must be re-pulled from
//! the provider.
//!
//! Policy is fail-open: when the store cannot answer, the range is treated as
//! needing a refresh. Over-fetching from the provider is preferred to serving
//! data whose completeness is unknown.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::AnalyticsDay;
use crate::range::DateRange;
use crate::store::AnalyticsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// The store query failed.
    Unknown,
    Empty,
    CoverageGap { first_missing: NaiveDate },
    Stale { age: Duration },
}

impl Freshness {
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Unknown => "store_error",
            Freshness::Empty => "empty",
            Freshness::CoverageGap { .. } => "coverage_gap",
            Freshness::Stale { .. } => "stale",
        }
    }
}

/// Classify the rows stored for `range`.
pub fn assess(rows: &[AnalyticsDay], range: DateRange, now: DateTime<Utc>, max_age: Duration) -> Freshness {
    if rows.is_empty() {
        return Freshness::Empty;
    }

    if let Some(first_missing) = range.days().find(|day| !rows.iter().any(|r| r.date == *day)) {
        return Freshness::CoverageGap { first_missing };
    }

    // rows is non-empty here
    let newest = rows.iter().map(|r| r.updated_at).max().unwrap_or(now);
    let age = now - newest;
    if age > max_age {
        return Freshness::Stale { age };
    }

    Freshness::Fresh
}

#[derive(Clone)]
pub struct StalenessEvaluator {
    store: Arc<dyn AnalyticsStore>,
    max_age: Duration,
}

impl StalenessEvaluator {
    pub fn new(store: Arc<dyn AnalyticsStore>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub async fn evaluate_at(&self, user_id: Uuid, range: DateRange, now: DateTime<Utc>) -> Freshness {
        match self.store.days_in_range(user_id, range).await {
            Ok(rows) => assess(&rows, range, now, self.max_age),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "coverage query failed, assuming refresh needed");
                Freshness::Unknown
            }
        }
    }

    pub async fn evaluate(&self, user_id: Uuid, range: DateRange) -> Freshness {
        self.evaluate_at(user_id, range, Utc::now()).await
    }

    pub async fn needs_refresh(&self, user_id: Uuid, range: DateRange) -> bool {
        self.evaluate(user_id, range).await.needs_refresh()
    }
}
