use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::range::DateRange;
use crate::schema::{analytics_connections, analytics_days, referrer_days, top_page_days};

// --- Stored rows ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = analytics_days)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AnalyticsDay {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub visitors: i64,
    pub page_views: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = analytics_days)]
pub struct NewAnalyticsDay {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub visitors: i64,
    pub page_views: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = referrer_days)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReferrerDay {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub source: String,
    pub visitors: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = top_page_days)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TopPageDay {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub path: String,
    pub page_views: i64,
    pub updated_at: DateTime<Utc>,
}

// --- Provider connection ---

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = analytics_connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AnalyticsConnection {
    pub user_id: Uuid,
    pub provider: String,
    pub property_id: String,
    pub refresh_token: String,
    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = analytics_connections)]
pub struct NewAnalyticsConnection {
    pub user_id: Uuid,
    pub provider: String,
    pub property_id: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

/// Connection status as shown to the account owner. Never carries the token.
#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl From<Option<AnalyticsConnection>> for ConnectionStatus {
    fn from(conn: Option<AnalyticsConnection>) -> Self {
        match conn {
            Some(c) => Self {
                connected: true,
                provider: Some(c.provider),
                property_id: Some(c.property_id),
                connected_at: Some(c.connected_at),
            },
            None => Self {
                connected: false,
                provider: None,
                property_id: None,
                connected_at: None,
            },
        }
    }
}

// --- Upstream report ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub visitors: i64,
    pub page_views: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerMetrics {
    pub date: NaiveDate,
    pub source: String,
    pub visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub date: NaiveDate,
    pub path: String,
    pub page_views: i64,
}

/// Everything fetched from the provider for one date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsReport {
    pub days: Vec<DailyMetrics>,
    pub referrers: Vec<ReferrerMetrics>,
    pub pages: Vec<PageMetrics>,
}

impl AnalyticsReport {
    /// Drop rows outside `range` and add zero rows for days the provider
    /// omitted (it skips days without traffic), so that a stored range has
    /// full day coverage after a refresh.
    ///
    /// Days after `today` are never zero-filled: they have not happened yet
    /// and must stay missing so the next read refetches them.
    pub fn normalized(mut self, range: DateRange, today: NaiveDate) -> Self {
        self.days.retain(|d| range.contains(d.date));
        self.referrers.retain(|r| range.contains(r.date));
        self.pages.retain(|p| range.contains(p.date));

        for date in range.days().take_while(|date| *date <= today) {
            if !self.days.iter().any(|d| d.date == date) {
                self.days.push(DailyMetrics { date, visitors: 0, page_views: 0 });
            }
        }
        self.days.sort_by_key(|d| d.date);
        self
    }

    pub fn into_rows(
        self,
        user_id: Uuid,
        fetched_at: DateTime<Utc>,
    ) -> (Vec<NewAnalyticsDay>, Vec<ReferrerDay>, Vec<TopPageDay>) {
        let days = self
            .days
            .into_iter()
            .map(|d| NewAnalyticsDay {
                user_id,
                date: d.date,
                visitors: d.visitors,
                page_views: d.page_views,
                updated_at: fetched_at,
            })
            .collect();
        let referrers = self
            .referrers
            .into_iter()
            .map(|r| ReferrerDay {
                user_id,
                date: r.date,
                source: r.source,
                visitors: r.visitors,
                updated_at: fetched_at,
            })
            .collect();
        let pages = self
            .pages
            .into_iter()
            .map(|p| TopPageDay {
                user_id,
                date: p.date,
                path: p.path,
                page_views: p.page_views,
                updated_at: fetched_at,
            })
            .collect();
        (days, referrers, pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn normalized_fills_gaps_and_clips_range() {
        let range = DateRange::new(d("2026-10-01"), d("2026-10-03")).unwrap();
        let report = AnalyticsReport {
            days: vec![
                DailyMetrics { date: d("2026-10-03"), visitors: 5, page_views: 9 },
                DailyMetrics { date: d("2026-09-30"), visitors: 1, page_views: 1 },
            ],
            referrers: vec![ReferrerMetrics { date: d("2026-10-04"), source: "google".into(), visitors: 3 }],
            pages: vec![],
        }
        .normalized(range, d("2026-10-19"));

        let dates: Vec<_> = report.days.iter().map(|x| x.date).collect();
        assert_eq!(dates, vec![d("2026-10-01"), d("2026-10-02"), d("2026-10-03")]);
        assert_eq!(report.days[0].visitors, 0);
        assert_eq!(report.days[2].visitors, 5);
        assert!(report.referrers.is_empty());
    }

    #[test]
    fn days_after_today_are_not_zero_filled() {
        let range = DateRange::new(d("2026-10-18"), d("2026-10-21")).unwrap();
        let report = AnalyticsReport {
            days: vec![DailyMetrics { date: d("2026-10-18"), visitors: 4, page_views: 6 }],
            referrers: vec![],
            pages: vec![],
        }
        .normalized(range, d("2026-10-19"));

        let dates: Vec<_> = report.days.iter().map(|x| x.date).collect();
        assert_eq!(dates, vec![d("2026-10-18"), d("2026-10-19")]);
    }

    #[test]
    fn rows_are_stamped_with_fetch_time() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let report = AnalyticsReport {
            days: vec![DailyMetrics { date: d("2026-10-01"), visitors: 2, page_views: 3 }],
            referrers: vec![],
            pages: vec![PageMetrics { date: d("2026-10-01"), path: "/".into(), page_views: 3 }],
        };
        let (days, referrers, pages) = report.into_rows(user_id, now);
        assert_eq!(days[0].user_id, user_id);
        assert_eq!(days[0].updated_at, now);
        assert!(referrers.is_empty());
        assert_eq!(pages[0].path, "/");
    }

    #[test]
    fn status_hides_token() {
        let status = ConnectionStatus::from(Some(AnalyticsConnection {
            user_id: Uuid::new_v4(),
            provider: "google".into(),
            property_id: "123".into(),
            refresh_token: "secret-token".into(),
            connected_at: Utc::now(),
            updated_at: Utc::now(),
        }));
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"connected\":true"));
        assert!(!json.contains("secret-token"));
    }
}
