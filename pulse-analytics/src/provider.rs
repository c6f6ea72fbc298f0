//! Upstream analytics provider: Google Analytics 4 via the Data API.
//!
//! The stored OAuth refresh token is exchanged for a short-lived access token
//! on every fetch; three `runReport` calls then pull daily totals, referrer
//! sources and page paths for the requested range.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::{AnalyticsConnection, AnalyticsReport, DailyMetrics, PageMetrics, ReferrerMetrics};
use crate::range::DateRange;

/// Rows requested per `runReport` page; larger reports are paged with `offset`.
const REPORT_PAGE_SIZE: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("oauth error: {0}")]
    OAuth(String),
}

/// Tokens granted by an authorization-code exchange.
#[derive(Debug, Clone)]
pub struct OAuthGrant {
    pub refresh_token: String,
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// Exchange an authorization code from the consent screen for a refresh token.
    async fn exchange_code(&self, code: &str) -> Result<OAuthGrant, ProviderError>;

    async fn fetch_range(
        &self,
        connection: &AnalyticsConnection,
        range: DateRange,
    ) -> Result<AnalyticsReport, ProviderError>;
}

#[derive(Clone)]
pub struct GoogleAnalyticsClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    data_api_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest {
    date_ranges: Vec<ReportDateRange>,
    dimensions: Vec<Named>,
    metrics: Vec<Named>,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct Named {
    name: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
    /// Total rows in the report across all pages.
    #[serde(default)]
    row_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    dimension_values: Vec<ReportValue>,
    metric_values: Vec<ReportValue>,
}

#[derive(Debug, Deserialize)]
struct ReportValue {
    value: String,
}

impl RunReportRequest {
    fn new(range: DateRange, dimensions: &[&'static str], metrics: &[&'static str]) -> Self {
        Self {
            date_ranges: vec![ReportDateRange {
                start_date: range.start().format("%Y-%m-%d").to_string(),
                end_date: range.end().format("%Y-%m-%d").to_string(),
            }],
            dimensions: dimensions.iter().map(|&name| Named { name }).collect(),
            metrics: metrics.iter().map(|&name| Named { name }).collect(),
            limit: REPORT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl RunReportResponse {
    /// Append one page. Returns the offset of the next page while the
    /// collected rows are short of `rowCount`.
    fn absorb(&mut self, page: RunReportResponse) -> Option<u32> {
        let page_len = page.rows.len();
        self.row_count = page.row_count;
        self.rows.extend(page.rows);
        if page_len == 0 || self.rows.len() >= self.row_count {
            return None;
        }
        u32::try_from(self.rows.len()).ok()
    }
}

impl ReportRow {
    fn dimension(&self, idx: usize) -> Result<&str, ProviderError> {
        self.dimension_values
            .get(idx)
            .map(|v| v.value.as_str())
            .ok_or_else(|| ProviderError::Decode(format!("missing dimension {idx}")))
    }

    fn date(&self) -> Result<NaiveDate, ProviderError> {
        let raw = self.dimension(0)?;
        NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map_err(|_| ProviderError::Decode(format!("bad date dimension '{raw}'")))
    }

    fn metric(&self, idx: usize) -> Result<i64, ProviderError> {
        let raw = self
            .metric_values
            .get(idx)
            .map(|v| v.value.as_str())
            .ok_or_else(|| ProviderError::Decode(format!("missing metric {idx}")))?;
        raw.parse::<i64>()
            .map_err(|_| ProviderError::Decode(format!("non-integer metric '{raw}'")))
    }
}

fn parse_daily(resp: RunReportResponse) -> Result<Vec<DailyMetrics>, ProviderError> {
    resp.rows
        .iter()
        .map(|row| {
            Ok(DailyMetrics {
                date: row.date()?,
                visitors: row.metric(0)?,
                page_views: row.metric(1)?,
            })
        })
        .collect()
}

fn parse_referrers(resp: RunReportResponse) -> Result<Vec<ReferrerMetrics>, ProviderError> {
    resp.rows
        .iter()
        .map(|row| {
            Ok(ReferrerMetrics {
                date: row.date()?,
                source: row.dimension(1)?.to_string(),
                visitors: row.metric(0)?,
            })
        })
        .collect()
}

fn parse_pages(resp: RunReportResponse) -> Result<Vec<PageMetrics>, ProviderError> {
    resp.rows
        .iter()
        .map(|row| {
            Ok(PageMetrics {
                date: row.date()?,
                path: row.dimension(1)?.to_string(),
                page_views: row.metric(0)?,
            })
        })
        .collect()
}

/// Accepts `123456` or `properties/123456`.
pub fn normalize_property_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    let id = id.strip_prefix("properties/").unwrap_or(id);
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

impl GoogleAnalyticsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            token_url: config.google_token_url.clone(),
            data_api_url: config.google_data_api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let response = self.http.post(&self.token_url).form(form).send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::OAuth(format!("google token error: {body}")));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::OAuth(format!("invalid token response: {e}")))
    }

    async fn access_token(&self, refresh_token: &str) -> Result<String, ProviderError> {
        let token = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        Ok(token.access_token)
    }

    /// Run a report to completion, following `offset` until every row is read.
    async fn run_report(
        &self,
        access_token: &str,
        property_id: &str,
        mut request: RunReportRequest,
    ) -> Result<RunReportResponse, ProviderError> {
        let mut report = RunReportResponse::default();
        loop {
            let page = self.run_report_page(access_token, property_id, &request).await?;
            match report.absorb(page) {
                Some(offset) => request.offset = offset,
                None => break,
            }
        }

        if report.rows.len() < report.row_count {
            return Err(ProviderError::Decode(format!(
                "report ended after {} of {} rows",
                report.rows.len(),
                report.row_count
            )));
        }
        Ok(report)
    }

    async fn run_report_page(
        &self,
        access_token: &str,
        property_id: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ProviderError> {
        let url = format!("{}/properties/{property_id}:runReport", self.data_api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status: status.as_u16(), body });
        }

        response
            .json::<RunReportResponse>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnalyticsProvider for GoogleAnalyticsClient {
    async fn exchange_code(&self, code: &str) -> Result<OAuthGrant, ProviderError> {
        let token = self
            .token_request(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let refresh_token = token.refresh_token.ok_or_else(|| {
            ProviderError::OAuth("no refresh token granted, consent must request offline access".into())
        })?;

        Ok(OAuthGrant { refresh_token })
    }

    async fn fetch_range(
        &self,
        connection: &AnalyticsConnection,
        range: DateRange,
    ) -> Result<AnalyticsReport, ProviderError> {
        let token = self.access_token(&connection.refresh_token).await?;
        let property = connection.property_id.as_str();

        let (daily, referrers, pages) = tokio::try_join!(
            self.run_report(
                &token,
                property,
                RunReportRequest::new(range, &["date"], &["activeUsers", "screenPageViews"]),
            ),
            self.run_report(
                &token,
                property,
                RunReportRequest::new(range, &["date", "sessionSource"], &["activeUsers"]),
            ),
            self.run_report(
                &token,
                property,
                RunReportRequest::new(range, &["date", "pagePath"], &["screenPageViews"]),
            ),
        )?;

        let report = AnalyticsReport {
            days: parse_daily(daily)?,
            referrers: parse_referrers(referrers)?,
            pages: parse_pages(pages)?,
        };

        tracing::debug!(
            user_id = %connection.user_id,
            property_id = %property,
            days = report.days.len(),
            referrers = report.referrers.len(),
            pages = report.pages.len(),
            "provider report fetched"
        );

        Ok(report)
    }
}
