use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use pulse_shared::errors::AppResult;

use crate::models::{AnalyticsDay, ReferrerDay, TopPageDay};
use crate::range::DateRange;
use crate::services::pipeline::FetchPipeline;
use crate::services::staleness::StalenessEvaluator;
use crate::store::AnalyticsStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub visitors: i64,
    pub page_views: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub visitors: i64,
    pub page_views: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedItem {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub range: DateRange,
    /// Whether this request pulled fresh data from the provider.
    pub refreshed: bool,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub totals: Totals,
    pub daily: Vec<DailyPoint>,
    pub top_referrers: Vec<RankedItem>,
    pub top_pages: Vec<RankedItem>,
}

/// Sum per key, largest first, ties by name.
fn rank<I>(items: I, limit: usize) -> Vec<RankedItem>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut sums: HashMap<String, i64> = HashMap::new();
    for (name, value) in items {
        *sums.entry(name).or_default() += value;
    }

    let mut ranked: Vec<RankedItem> = sums
        .into_iter()
        .map(|(name, value)| RankedItem { name, value })
        .collect();
    ranked.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

pub fn summarize(
    range: DateRange,
    refreshed: bool,
    days: &[AnalyticsDay],
    referrers: &[ReferrerDay],
    pages: &[TopPageDay],
    top_items: usize,
) -> DashboardSummary {
    let mut daily: Vec<DailyPoint> = days
        .iter()
        .map(|d| DailyPoint { date: d.date, visitors: d.visitors, page_views: d.page_views })
        .collect();
    daily.sort_by_key(|p| p.date);

    let totals = daily.iter().fold(Totals::default(), |acc, p| Totals {
        visitors: acc.visitors + p.visitors,
        page_views: acc.page_views + p.page_views,
    });

    DashboardSummary {
        range,
        refreshed,
        last_updated_at: days.iter().map(|d| d.updated_at).max(),
        totals,
        daily,
        top_referrers: rank(referrers.iter().map(|r| (r.source.clone(), r.visitors)), top_items),
        top_pages: rank(pages.iter().map(|p| (p.path.clone(), p.page_views)), top_items),
    }
}

/// Serves dashboard data, refreshing from the provider first when stale.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn AnalyticsStore>,
    evaluator: StalenessEvaluator,
    pipeline: FetchPipeline,
    top_items: usize,
}

impl DashboardService {
    pub fn new(
        store: Arc<dyn AnalyticsStore>,
        evaluator: StalenessEvaluator,
        pipeline: FetchPipeline,
        top_items: usize,
    ) -> Self {
        Self { store, evaluator, pipeline, top_items }
    }

    pub async fn load(&self, user_id: Uuid, range: DateRange) -> AppResult<DashboardSummary> {
        let freshness = self.evaluator.evaluate(user_id, range).await;
        let refreshed = freshness.needs_refresh();

        if refreshed {
            counter!("analytics_refresh_total", "reason" => freshness.reason()).increment(1);
            tracing::debug!(user_id = %user_id, reason = freshness.reason(), "refreshing analytics range");
            self.pipeline.refresh(user_id, range).await?;
        }

        let (days, referrers, pages) = tokio::try_join!(
            self.store.days_in_range(user_id, range),
            self.store.referrers_in_range(user_id, range),
            self.store.pages_in_range(user_id, range),
        )?;

        Ok(summarize(range, refreshed, &days, &referrers, &pages, self.top_items))
    }
}
