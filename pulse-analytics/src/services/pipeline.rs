use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use pulse_shared::clients::db::StoreError;
use pulse_shared::errors::{AppError, ErrorCode};

use crate::provider::{AnalyticsProvider, ProviderError};
use crate::range::DateRange;
use crate::store::AnalyticsStore;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no analytics provider connected")]
    NotConnected,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotConnected => AppError::new(
                ErrorCode::AnalyticsNotConnected,
                "connect an analytics property before loading the dashboard",
            ),
            PipelineError::Provider(e) => {
                tracing::error!(error = %e, "analytics provider fetch failed");
                AppError::new(ErrorCode::UpstreamError, "analytics provider request failed")
            }
            PipelineError::Store(e) => AppError::Store(e),
        }
    }
}

/// Pulls a range from the provider and writes it back to the store.
#[derive(Clone)]
pub struct FetchPipeline {
    store: Arc<dyn AnalyticsStore>,
    provider: Arc<dyn AnalyticsProvider>,
}

impl FetchPipeline {
    pub fn new(store: Arc<dyn AnalyticsStore>, provider: Arc<dyn AnalyticsProvider>) -> Self {
        Self { store, provider }
    }

    /// Nothing is written unless the provider call succeeds in full; the
    /// report is then upserted in one transaction.
    pub async fn refresh(&self, user_id: Uuid, range: DateRange) -> Result<usize, PipelineError> {
        let connection = self
            .store
            .connection(user_id)
            .await?
            .ok_or(PipelineError::NotConnected)?;

        let report = self.provider.fetch_range(&connection, range).await?;
        let fetched_at = Utc::now();
        let report = report.normalized(range, fetched_at.date_naive());

        let written = self.store.upsert_report(user_id, report, fetched_at).await?;

        tracing::info!(
            user_id = %user_id,
            start = %range.start(),
            end = %range.end(),
            days_written = written,
            "analytics range refreshed"
        );

        Ok(written)
    }
}
