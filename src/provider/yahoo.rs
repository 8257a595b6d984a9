use async_trait::async_trait;
use chrono::{Duration, NaiveTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{DataProvider, WindowSpec};
use crate::error::AnalysisError;
use crate::types::{PriceBar, PriceSeries};

const YAHOO_CHART_API: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Extra calendar days fetched beyond a trailing window so weekends and
/// holidays do not starve the requested number of sessions.
const WINDOW_PADDING_DAYS: i64 = 2;

/// Daily-bar provider backed by the Yahoo Finance v8 chart API.
#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: YAHOO_CHART_API.to_string(),
        }
    }

    fn range_params(window: &WindowSpec) -> (i64, i64) {
        match window {
            WindowSpec::TrailingDays(days) => {
                let end = Utc::now();
                let start = end - Duration::days(days + WINDOW_PADDING_DAYS);
                (start.timestamp(), end.timestamp())
            }
            WindowSpec::DateRange { start, end } => {
                let start = start.and_time(NaiveTime::MIN).and_utc();
                // Inclusive end: ask for midnight of the following day.
                let end = (*end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
                (start.timestamp(), end.timestamp())
            }
        }
    }

    fn unavailable(ticker: &str, reason: impl Into<String>) -> AnalysisError {
        AnalysisError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataProvider for YahooProvider {
    async fn fetch(
        &self,
        ticker: &str,
        window: WindowSpec,
    ) -> Result<PriceSeries, AnalysisError> {
        let (period1, period2) = Self::range_params(&window);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            self.base_url, ticker, period1, period2
        );
        debug!("Fetching {}", url);

        let resp = self
            .client
            .get(&url)
            // Yahoo rejects requests without a browser-like user agent.
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await
            .map_err(|e| Self::unavailable(ticker, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::unavailable(ticker, format!("HTTP {}", resp.status())));
        }

        let payload: ChartResponse = resp
            .json()
            .await
            .map_err(|e| Self::unavailable(ticker, e.to_string()))?;

        if let Some(err) = payload.chart.error {
            return Err(Self::unavailable(ticker, err.description));
        }

        let result = payload
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| Self::unavailable(ticker, "empty chart result"))?;

        let bars = bars_from_chart(&result);
        if bars.is_empty() {
            return Err(Self::unavailable(ticker, "no bars with a defined close"));
        }

        debug!("{}: {} bars", ticker, bars.len());
        Ok(PriceSeries::new(ticker, bars))
    }
}

/// Builds bars from one chart result, skipping entries whose close (or
/// timestamp) is undefined in the feed.
fn bars_from_chart(result: &ChartResult) -> Vec<PriceBar> {
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        let Some(close) = Decimal::from_f64(close) else {
            continue;
        };
        let Some(date) = Utc.timestamp_opt(*ts, 0).single() else {
            continue;
        };

        let field = |column: &[Option<f64>]| {
            column
                .get(i)
                .copied()
                .flatten()
                .and_then(Decimal::from_f64)
                .unwrap_or(close)
        };

        bars.push(PriceBar {
            date: date.date_naive(),
            open: field(&quote.open),
            high: field(&quote.high),
            low: field(&quote.low),
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }
    bars
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}
