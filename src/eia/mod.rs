pub mod metrics;
pub mod regions;

use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, TimeDelta, Utc};
use futures::future::join_all;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use metrics::MetricKind;
pub use regions::{BalancingAuthority, RegionCatalog};

use crate::series::TimeSeries;

pub const DEFAULT_BASE_URL: &str = "https://api.eia.gov/v2/electricity/rto/region-data/data/";

/// Retries are capped so a flaky upstream cannot stall a render.
pub const MAX_RETRIES: u32 = 1;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("unsupported metric: {0}")]
    UnsupportedMetric(String),
    #[error("unknown balancing authority: {0}")]
    UnknownRegion(String),
    #[error("upstream unavailable for {region} {metric}: {reason}")]
    UpstreamUnavailable {
        region: String,
        metric: MetricKind,
        reason: String,
        retryable: bool,
    },
    #[error("no data for {region} {metric}")]
    NoData { region: String, metric: MetricKind },
    #[error("malformed payload for {region} {metric}: {reason}")]
    Parse {
        region: String,
        metric: MetricKind,
        reason: String,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::UpstreamUnavailable {
                retryable: true,
                ..
            }
        )
    }

    /// Valid request, nothing to show
    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NoData { .. })
    }
}

/// Closed range of UTC instants at hour precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of length `span` ending at `end`
    pub fn rolling(end: DateTime<Utc>, span: Duration) -> Self {
        Self {
            start: end - span,
            end,
        }
    }

    /// Upstream hour-precision bounds (`YYYY-MM-DDTHH`)
    pub fn to_query_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%dT%H").to_string(),
            self.end.format("%Y-%m-%dT%H").to_string(),
        )
    }
}

/// Retry behaviour at the fetch boundary
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: MAX_RETRIES,
            backoff: std::time::Duration::from_millis(500),
        }
    }
}

// Response envelope of the v2 API
#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<ResponseBody>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    data: Option<Vec<Record>>,
}

#[derive(Debug, Deserialize)]
struct Record {
    period: String,
    value: Option<RecordValue>,
}

/// EIA reports values both as JSON numbers and as numeric strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordValue {
    Number(f64),
    Text(String),
}

impl RecordValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Number(v) => Some(*v),
            RecordValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

pub struct EiaClient {
    client: Client,
    api_key: SecretString,
    base_url: Url,
    regions: RegionCatalog,
    window_span: Duration,
    retry: RetryPolicy,
}

impl EiaClient {
    pub fn builder(api_key: impl Into<String>) -> EiaClientBuilder {
        EiaClientBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            regions: RegionCatalog::default(),
            timeout: std::time::Duration::from_secs(30),
            window_span: Duration::days(7),
            retry: RetryPolicy::default(),
        }
    }

    pub fn regions(&self) -> &RegionCatalog {
        &self.regions
    }

    /// Rolling window of the configured span ending now
    pub fn default_window(&self) -> TimeWindow {
        TimeWindow::rolling(Utc::now(), self.window_span)
    }

    /// Fetch one hourly series for a balancing authority.
    ///
    /// With no window the configured rolling span ending now is used.
    pub async fn fetch(
        &self,
        region: &str,
        metric: MetricKind,
        window: Option<TimeWindow>,
    ) -> Result<TimeSeries, FetchError> {
        let ba = self
            .regions
            .get(region)
            .ok_or_else(|| FetchError::UnknownRegion(region.to_string()))?;
        let window = window.unwrap_or_else(|| self.default_window());
        let url = self.series_url(&ba.code, metric, &window);

        self.fetch_with_retry(&ba.code, metric, url).await
    }

    /// Same as [`EiaClient::fetch`] for a metric given by name
    pub async fn fetch_named(
        &self,
        region: &str,
        metric: &str,
        window: Option<TimeWindow>,
    ) -> Result<TimeSeries, FetchError> {
        let metric: MetricKind = metric.parse()?;
        self.fetch(region, metric, window).await
    }

    /// Fetch several metrics concurrently. Each result is independent.
    pub async fn fetch_many(
        &self,
        region: &str,
        metrics: &[MetricKind],
        window: Option<TimeWindow>,
    ) -> Vec<(MetricKind, Result<TimeSeries, FetchError>)> {
        // one window for the whole plan so the series line up
        let window = window.unwrap_or_else(|| self.default_window());
        let requests = metrics.iter().map(|&metric| async move {
            (metric, self.fetch(region, metric, Some(window)).await)
        });
        join_all(requests).await
    }

    fn series_url(&self, respondent: &str, metric: MetricKind, window: &TimeWindow) -> Url {
        let (start, end) = window.to_query_bounds();
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("frequency", "hourly")
            .append_pair("data[0]", "value")
            .append_pair("facets[respondent][]", respondent)
            .append_pair("facets[type][]", "ALL")
            .append_pair("facets[metric][]", metric.facet())
            .append_pair("start", &start)
            .append_pair("end", &end)
            .append_pair("sort[0][column]", "period")
            .append_pair("sort[0][direction]", "asc")
            .append_pair("api_key", self.api_key.expose_secret());
        url
    }

    async fn fetch_with_retry(
        &self,
        region: &str,
        metric: MetricKind,
        url: Url,
    ) -> Result<TimeSeries, FetchError> {
        let retries = self.retry.retries.min(MAX_RETRIES);
        let mut attempt = 0;
        loop {
            match self.fetch_once(region, metric, url.clone()).await {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    let delay = self.retry.backoff * 2u32.pow(attempt - 1);
                    tracing::warn!(%region, %metric, error = %e, ?delay, "retrying upstream request");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(
        &self,
        region: &str,
        metric: MetricKind,
        url: Url,
    ) -> Result<TimeSeries, FetchError> {
        tracing::debug!(%region, %metric, "requesting hourly series");

        let unavailable = |reason: String, retryable: bool| FetchError::UpstreamUnavailable {
            region: region.to_string(),
            metric,
            reason,
            retryable,
        };

        let resp = self.client.get(url).send().await.map_err(|e| {
            let retryable = e.is_timeout() || e.is_connect();
            unavailable(e.without_url().to_string(), retryable)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let retryable =
                status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            return Err(unavailable(format!("HTTP {status}"), retryable));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout();
                unavailable(e.without_url().to_string(), retryable)
            })?;

        parse_series(&body, region, metric)
    }
}

pub struct EiaClientBuilder {
    api_key: String,
    base_url: String,
    regions: RegionCatalog,
    timeout: std::time::Duration,
    window_span: Duration,
    retry: RetryPolicy,
}

impl EiaClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn regions(mut self, regions: RegionCatalog) -> Self {
        self.regions = regions;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn window_span(mut self, span: Duration) -> Self {
        self.window_span = span;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> anyhow::Result<EiaClient> {
        let client = Client::builder().timeout(self.timeout).build()?;
        let base_url = Url::parse(&self.base_url)?;
        Ok(EiaClient {
            client,
            api_key: SecretString::from(self.api_key),
            base_url,
            regions: self.regions,
            window_span: self.window_span,
            retry: self.retry,
        })
    }
}

/// Turn a region-data response body into a series named after the metric.
pub fn parse_series(body: &str, region: &str, metric: MetricKind) -> Result<TimeSeries, FetchError> {
    let parse_err = |reason: String| FetchError::Parse {
        region: region.to_string(),
        metric,
        reason,
    };

    let envelope: Envelope = serde_json::from_str(body).map_err(|e| parse_err(e.to_string()))?;
    let records = envelope
        .response
        .and_then(|r| r.data)
        .unwrap_or_default();

    let mut points = Vec::with_capacity(records.len());
    for record in &records {
        let timestamp = parse_period(&record.period)
            .ok_or_else(|| parse_err(format!("invalid period: {}", record.period)))?;
        // null values are missing hours, not zeros
        let Some(raw) = &record.value else {
            continue;
        };
        let value = raw
            .as_f64()
            .ok_or_else(|| parse_err(format!("non-numeric value at {}", record.period)))?;
        points.push((timestamp, value));
    }

    if points.is_empty() {
        return Err(FetchError::NoData {
            region: region.to_string(),
            metric,
        });
    }

    Ok(TimeSeries::new(metric.canonical_name(), points))
}

/// Parse an upstream period string, truncated to the hour.
///
/// Accepts `2023-07-01T05` (UTC), `2023-07-01T05-07` (local hour with
/// offset) and RFC 3339.
pub fn parse_period(period: &str) -> Option<DateTime<Utc>> {
    let parsed = if period.len() == 13 {
        NaiveDateTime::parse_from_str(&format!("{period}:00"), "%Y-%m-%dT%H:%M")
            .ok()
            .map(|naive| naive.and_utc())
    } else if period.len() == 16 && period.is_char_boundary(13) {
        let (hour, offset) = period.split_at(13);
        DateTime::parse_from_str(&format!("{hour}:00{offset}:00"), "%Y-%m-%dT%H:%M%:z")
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        DateTime::parse_from_rfc3339(period)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }?;

    parsed.duration_trunc(TimeDelta::hours(1)).ok()
}
