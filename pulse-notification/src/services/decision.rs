//! Pure per-event decision for the spike processor. No I/O happens here.

use crate::models::{SpikeEvent, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The user turned spike emails off.
    OptedOut,
    /// Neither a notification address nor an account email is on file.
    NoRecipient,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::OptedOut => "opted_out",
            SuppressReason::NoRecipient => "no_recipient",
        }
    }
}

/// What to do with one unsent spike event. Both arms end with the event
/// marked sent; only `Send` dispatches an email first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpikeDecision {
    Suppress(SuppressReason),
    Send { to: String, percent: i64 },
}

/// Whole-number percent increase from `previous` to `value`.
///
/// A non-positive baseline reports 100. Halves round toward positive infinity.
pub fn percent_change(value: f64, previous: f64) -> i64 {
    if previous > 0.0 {
        (((value - previous) / previous) * 100.0 + 0.5).floor() as i64
    } else {
        100
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Notification address if set, else the account email.
pub fn resolve_recipient(profile: &UserProfile) -> Option<String> {
    non_blank(profile.notification_email.as_deref())
        .or_else(|| non_blank(profile.email.as_deref()))
        .map(str::to_string)
}

pub fn decide(event: &SpikeEvent, profile: Option<&UserProfile>) -> SpikeDecision {
    let Some(profile) = profile else {
        return SpikeDecision::Suppress(SuppressReason::NoRecipient);
    };

    if profile.email_notifications == Some(false) {
        return SpikeDecision::Suppress(SuppressReason::OptedOut);
    }

    match resolve_recipient(profile) {
        Some(to) => SpikeDecision::Send {
            to,
            percent: percent_change(event.value, event.previous_value),
        },
        None => SpikeDecision::Suppress(SuppressReason::NoRecipient),
    }
}
