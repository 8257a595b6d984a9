use std::cmp::Ordering;

use tracing::debug;

use crate::config::TrendSettings;
use crate::error::AnalysisError;
use crate::types::{PriceSeries, TrendDirection, TrendResult};

/// Classifies a single series against the configured thresholds.
pub struct TrendAnalyzer {
    settings: TrendSettings,
}

impl TrendAnalyzer {
    pub fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    /// Percentage change over the window: `(last - first) / first * 100`.
    ///
    /// `Ok(None)` covers both an insufficient series and a move inside the
    /// noise band; neither is a failure. A zero first close is
    /// `DivisionUndefined`, recovered per ticker by the orchestrator.
    pub fn classify(&self, series: &PriceSeries) -> Result<Option<TrendResult>, AnalysisError> {
        if series.len() < 2 {
            debug!(
                "{}: {} bars, not enough for a trend",
                series.ticker(),
                series.len()
            );
            return Ok(None);
        }

        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Ok(None);
        };
        let first_close: f64 = first.close.try_into().unwrap_or(0.0);
        let last_close: f64 = last.close.try_into().unwrap_or(0.0);

        if first_close == 0.0 {
            return Err(AnalysisError::DivisionUndefined {
                ticker: series.ticker().to_string(),
            });
        }

        let percent_change = (last_close - first_close) / first_close * 100.0;

        // Strict inequality on both sides: a move exactly at a threshold is
        // not classified.
        let direction = if percent_change > self.settings.threshold_up_pct {
            TrendDirection::Up
        } else if percent_change < self.settings.threshold_down_pct {
            TrendDirection::Down
        } else {
            return Ok(None);
        };

        Ok(Some(TrendResult {
            ticker: series.ticker().to_string(),
            percent_change,
            direction,
        }))
    }
}

/// Splits classified results into ranked lists: gainers descending by move,
/// losers ascending (most negative first). Ties break by ticker so batch
/// output is deterministic.
pub fn rank(results: Vec<TrendResult>) -> (Vec<TrendResult>, Vec<TrendResult>) {
    let (mut up, mut down): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|r| r.direction == TrendDirection::Up);

    up.sort_by(|a, b| {
        b.percent_change
            .partial_cmp(&a.percent_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    down.sort_by(|a, b| {
        a.percent_change
            .partial_cmp(&b.percent_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    (up, down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    use crate::types::PriceBar;

    fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let close = Decimal::from_f64(close).unwrap();
                PriceBar {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000,
                }
            })
            .collect();
        PriceSeries::new(ticker, bars)
    }

    fn analyzer(up: f64, down: f64) -> TrendAnalyzer {
        TrendAnalyzer::new(TrendSettings {
            window_days: 5,
            threshold_up_pct: up,
            threshold_down_pct: down,
        })
    }

    #[test]
    fn test_classifies_up_move() {
        let result = analyzer(2.0, -2.0)
            .classify(&series("AAPL", &[100.0, 105.0]))
            .unwrap()
            .unwrap();

        assert_eq!(result.direction, TrendDirection::Up);
        assert!((result.percent_change - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_classifies_down_move() {
        let result = analyzer(2.0, -5.0)
            .classify(&series("TSLA", &[100.0, 94.0]))
            .unwrap()
            .unwrap();

        assert_eq!(result.direction, TrendDirection::Down);
        assert!((result.percent_change - (-6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series_is_unclassified() {
        let result = analyzer(2.0, -2.0)
            .classify(&series("MSFT", &[100.0, 100.0]))
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        let analyzer = analyzer(2.0, -2.0);

        // Exactly +2% and exactly -2% stay unclassified.
        assert_eq!(
            analyzer.classify(&series("UP", &[100.0, 102.0])).unwrap(),
            None
        );
        assert_eq!(
            analyzer.classify(&series("DN", &[100.0, 98.0])).unwrap(),
            None
        );

        assert!(analyzer
            .classify(&series("UP", &[100.0, 102.01]))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_short_series_yields_none() {
        let analyzer = analyzer(2.0, -2.0);
        assert_eq!(analyzer.classify(&series("A", &[])).unwrap(), None);
        assert_eq!(analyzer.classify(&series("A", &[100.0])).unwrap(), None);
    }

    #[test]
    fn test_zero_first_close_is_division_undefined() {
        let err = analyzer(2.0, -2.0)
            .classify(&series("BAD", &[0.0, 10.0]))
            .unwrap_err();

        assert_eq!(
            err,
            AnalysisError::DivisionUndefined {
                ticker: "BAD".to_string()
            }
        );
    }

    #[test]
    fn test_asymmetric_thresholds() {
        let analyzer = analyzer(5.0, -1.0);

        assert_eq!(
            analyzer.classify(&series("A", &[100.0, 104.0])).unwrap(),
            None
        );
        assert!(analyzer
            .classify(&series("A", &[100.0, 98.5]))
            .unwrap()
            .is_some());
    }

    fn result(ticker: &str, percent_change: f64, direction: TrendDirection) -> TrendResult {
        TrendResult {
            ticker: ticker.to_string(),
            percent_change,
            direction,
        }
    }

    #[test]
    fn test_rank_orders_both_lists() {
        let (up, down) = rank(vec![
            result("A", 3.0, TrendDirection::Up),
            result("B", 7.5, TrendDirection::Up),
            result("C", -4.0, TrendDirection::Down),
            result("D", -9.0, TrendDirection::Down),
        ]);

        let gains: Vec<f64> = up.iter().map(|r| r.percent_change).collect();
        assert_eq!(gains, vec![7.5, 3.0]);

        let losses: Vec<f64> = down.iter().map(|r| r.percent_change).collect();
        assert_eq!(losses, vec![-9.0, -4.0]);
    }

    #[test]
    fn test_rank_breaks_ties_by_ticker() {
        let (up, _) = rank(vec![
            result("NVDA", 4.0, TrendDirection::Up),
            result("AMZN", 4.0, TrendDirection::Up),
        ]);

        let tickers: Vec<&str> = up.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AMZN", "NVDA"]);
    }
}
