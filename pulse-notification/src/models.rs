use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{spike_events, user_profiles};

/// Event type the processor emails about. Other types (`drop`, ...) are ignored.
pub const SPIKE_EVENT_TYPE: &str = "spike";

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = spike_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SpikeEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub event_type: String,
    pub metric_name: String,
    pub value: f64,
    pub previous_value: f64,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Account email plus notification preferences.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserProfile {
    pub user_id: Uuid,
    /// Primary login email, synced from the identity provider.
    pub email: Option<String>,
    /// `None` means the user never chose; only `Some(false)` opts out.
    pub email_notifications: Option<bool>,
    pub notification_email: Option<String>,
}
