use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;

use pulse_shared::clients::db::StoreError;
use pulse_shared::clients::email::{EmailDispatch, EmailError};

use crate::models::SpikeEvent;
use crate::services::decision::{decide, SpikeDecision};
use crate::store::SpikeStore;
use crate::templates::spike_email;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub errors: usize,
}

#[derive(Debug, thiserror::Error)]
enum EventError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] EmailError),
}

/// Emails users about unsent spike events and marks them sent.
///
/// An event is marked only after a successful send or a decision that it
/// should never be sent. Any failure leaves it for the next run.
#[derive(Clone)]
pub struct SpikeProcessor {
    store: Arc<dyn SpikeStore>,
    email: Arc<dyn EmailDispatch>,
    dashboard_url: String,
    batch_size: i64,
}

impl SpikeProcessor {
    pub fn new(
        store: Arc<dyn SpikeStore>,
        email: Arc<dyn EmailDispatch>,
        dashboard_url: impl Into<String>,
        batch_size: i64,
    ) -> Self {
        Self { store, email, dashboard_url: dashboard_url.into(), batch_size }
    }

    /// Fails only when the batch itself cannot be loaded.
    pub async fn run(&self) -> Result<RunSummary, StoreError> {
        let events = self.store.unprocessed_spikes(self.batch_size).await?;
        let mut summary = RunSummary::default();

        if events.is_empty() {
            tracing::debug!("no unsent spike events");
            return Ok(summary);
        }

        for event in &events {
            match self.process(event).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(event_id = %event.id, user_id = %event.user_id, error = %e, "spike event left for retry");
                }
            }
        }

        tracing::info!(
            batch = events.len(),
            processed = summary.processed,
            errors = summary.errors,
            "spike notification run finished"
        );
        Ok(summary)
    }

    async fn process(&self, event: &SpikeEvent) -> Result<(), EventError> {
        let profile = self.store.profile(event.user_id).await?;

        match decide(event, profile.as_ref()) {
            SpikeDecision::Suppress(reason) => {
                self.store.mark_sent(event.id, event.user_id, None).await?;
                counter!("spike_events_suppressed_total", "reason" => reason.as_str()).increment(1);
                tracing::debug!(event_id = %event.id, reason = reason.as_str(), "spike email suppressed");
            }
            SpikeDecision::Send { to, percent } => {
                let email = spike_email(&event.metric_name, percent, event.date, &self.dashboard_url);

                let receipt = match self.email.send(&to, &email.subject, &email.html).await {
                    Ok(r) => r,
                    Err(e) => {
                        counter!("spike_emails_failed_total").increment(1);
                        return Err(e.into());
                    }
                };
                counter!("spike_emails_sent_total").increment(1);

                let marked = self.store.mark_sent(event.id, event.user_id, Some(Utc::now())).await?;
                if !marked {
                    tracing::warn!(event_id = %event.id, "spike event was marked by another run");
                }
                tracing::info!(event_id = %event.id, user_id = %event.user_id, percent, email_id = ?receipt.id, "spike email sent");
            }
        }

        Ok(())
    }
}
