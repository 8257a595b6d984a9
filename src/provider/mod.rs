pub mod yahoo;

pub use yahoo::YahooProvider;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AnalysisError;
use crate::types::PriceSeries;

/// How much history to request for one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSpec {
    /// Trailing window of calendar days at a daily interval.
    TrailingDays(i64),
    /// Explicit date range, inclusive on both ends.
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Source of dated, deduplicated daily bars.
///
/// Implementations drop bars with undefined closes before returning; an empty
/// or unreachable feed is `DataUnavailable`, recovered per ticker upstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, ticker: &str, window: WindowSpec)
        -> Result<PriceSeries, AnalysisError>;
}
