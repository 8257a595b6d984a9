use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::AnalysisError;
use crate::ml::DirectionPredictor;
use crate::provider::{DataProvider, WindowSpec};
use crate::trend::{self, TrendAnalyzer};
use crate::types::{PredictionResult, PriceSeries, TickerOutcome, TrendResult};

/// Ranked output of one trend batch.
#[derive(Debug, Clone, Default)]
pub struct TrendReport {
    /// Gainers, descending by percent change.
    pub up: Vec<TrendResult>,
    /// Losers, ascending by percent change (largest loss first).
    pub down: Vec<TrendResult>,
    /// Tickers that produced no result: provider failures, abstentions,
    /// deadline skips. Excluded from ranking, never fatal to the batch.
    pub skipped: Vec<String>,
}

/// Runs the per-ticker pipeline across a batch.
///
/// Tickers are independent: each one fetches, analyzes, and reports its own
/// outcome. A failure is contained to its ticker; result aggregation is the
/// only join point.
pub struct BatchOrchestrator {
    provider: Arc<dyn DataProvider>,
    config: BotConfig,
}

impl BatchOrchestrator {
    pub fn new(provider: Arc<dyn DataProvider>, config: BotConfig) -> Self {
        Self { provider, config }
    }

    /// Classifies every ticker's move over the configured window and returns
    /// ranked gainer/loser lists. Zero classifications is a normal, empty
    /// report.
    pub async fn classify_batch(&self, tickers: &[String]) -> TrendReport {
        info!(
            "Classifying {} tickers over a {}-day window",
            tickers.len(),
            self.config.trend.window_days
        );

        let analyzer = TrendAnalyzer::new(self.config.trend.clone());
        let window = WindowSpec::TrailingDays(self.config.trend.window_days);
        let outcomes = self
            .run_batch(tickers, window, move |series| analyzer.classify(series))
            .await;

        let mut classified = Vec::new();
        let mut skipped = Vec::new();
        for (ticker, outcome) in outcomes {
            match outcome {
                TickerOutcome::Ready(result) => classified.push(result),
                TickerOutcome::NoSignal => {}
                TickerOutcome::Abstained(_) | TickerOutcome::Skipped => skipped.push(ticker),
            }
        }

        let (up, down) = trend::rank(classified);
        info!(
            "Trend batch done: {} up, {} down, {} without a result",
            up.len(),
            down.len(),
            skipped.len()
        );
        TrendReport { up, down, skipped }
    }

    /// Trains and predicts next-session direction per ticker. Outcomes keep
    /// the input order; abstentions carry their reason.
    pub async fn predict_batch(
        &self,
        tickers: &[String],
    ) -> Vec<(String, TickerOutcome<PredictionResult>)> {
        info!(
            "Predicting next-session direction for {} tickers",
            tickers.len()
        );

        let predictor = DirectionPredictor::new(self.config.predictor.clone());
        let window = WindowSpec::TrailingDays(self.config.predictor.history_days);
        self.run_batch(tickers, window, move |series| {
            predictor.predict_next_direction(series).map(Some)
        })
        .await
    }

    async fn run_batch<T, F>(
        &self,
        tickers: &[String],
        window: WindowSpec,
        analyze: F,
    ) -> Vec<(String, TickerOutcome<T>)>
    where
        T: Send + 'static,
        F: Fn(&PriceSeries) -> Result<Option<T>, AnalysisError> + Send + Sync + 'static,
    {
        let deadline = Instant::now() + Duration::from_millis(self.config.batch.batch_deadline_ms);
        let fetch_timeout = Duration::from_millis(self.config.batch.fetch_timeout_ms);
        let semaphore = Arc::new(Semaphore::new(self.config.batch.max_concurrent_fetches));
        let analyze = Arc::new(analyze);

        let mut set = JoinSet::new();
        for (index, ticker) in tickers.iter().enumerate() {
            let ticker = ticker.clone();
            let window = window.clone();
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let analyze = Arc::clone(&analyze);

            set.spawn(async move {
                let pipeline = process_one(
                    provider.as_ref(),
                    &semaphore,
                    &ticker,
                    window,
                    fetch_timeout,
                    analyze.as_ref(),
                );
                let outcome = timeout_at(deadline, pipeline).await.unwrap_or_else(|_| {
                    warn!("{}: batch deadline elapsed, skipping", ticker);
                    TickerOutcome::Skipped
                });
                (index, ticker, outcome)
            });
        }

        let mut results = Vec::with_capacity(tickers.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(err) => warn!("Ticker task failed to join: {}", err),
            }
        }

        // Completion order is arbitrary; hand results back in input order.
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, ticker, outcome)| (ticker, outcome))
            .collect()
    }
}

async fn process_one<T, F>(
    provider: &dyn DataProvider,
    semaphore: &Semaphore,
    ticker: &str,
    window: WindowSpec,
    fetch_timeout: Duration,
    analyze: &F,
) -> TickerOutcome<T>
where
    F: Fn(&PriceSeries) -> Result<Option<T>, AnalysisError>,
{
    // Never closed; only bounds concurrent provider fetches.
    let _permit = semaphore.acquire().await.ok();

    let series = match timeout(fetch_timeout, provider.fetch(ticker, window)).await {
        Ok(Ok(series)) => series,
        Ok(Err(err)) => {
            debug!("{}: {}", ticker, err);
            return TickerOutcome::Abstained(err);
        }
        Err(_) => {
            warn!("{}: fetch timed out", ticker);
            return TickerOutcome::Abstained(AnalysisError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "fetch timed out".to_string(),
            });
        }
    };

    match analyze(&series) {
        Ok(Some(value)) => TickerOutcome::Ready(value),
        Ok(None) => TickerOutcome::NoSignal,
        Err(err) => {
            debug!("{}: {}", ticker, err);
            TickerOutcome::Abstained(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    use crate::config::BatchSettings;
    use crate::provider::MockDataProvider;
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

    fn config(tickers: &[&str]) -> BotConfig {
        BotConfig {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            ..BotConfig::default()
        }
    }

    fn unavailable(ticker: &str) -> AnalysisError {
        AnalysisError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: "nothing returned".to_string(),
        }
    }

    #[tokio::test]
    async fn test_classify_batch_ranks_results() {
        let mut provider = MockDataProvider::new();
        provider.expect_fetch().returning(|ticker, _| {
            Ok(match ticker {
                "AAPL" => series("AAPL", &[100.0, 105.0]),
                "NVDA" => series("NVDA", &[100.0, 112.0]),
                "TSLA" => series("TSLA", &[100.0, 94.0]),
                _ => series(ticker, &[100.0, 100.5]),
            })
        });

        let tickers: Vec<String> = ["AAPL", "NVDA", "TSLA", "MSFT"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let orchestrator =
            BatchOrchestrator::new(Arc::new(provider), config(&["AAPL", "NVDA", "TSLA", "MSFT"]));

        let report = orchestrator.classify_batch(&tickers).await;

        let up: Vec<&str> = report.up.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(up, vec!["NVDA", "AAPL"]);
        let down: Vec<&str> = report.down.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(down, vec!["TSLA"]);
        // MSFT moved inside the noise band: no list, but not skipped either.
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_classify_batch_isolates_failures() {
        let mut provider = MockDataProvider::new();
        provider.expect_fetch().returning(|ticker, _| match ticker {
            "BAD" => Err(unavailable("BAD")),
            "EMPTY" => Ok(series("EMPTY", &[])),
            _ => Ok(series(ticker, &[100.0, 105.0])),
        });

        let tickers: Vec<String> = ["AAPL", "BAD", "EMPTY"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let orchestrator =
            BatchOrchestrator::new(Arc::new(provider), config(&["AAPL", "BAD", "EMPTY"]));

        let report = orchestrator.classify_batch(&tickers).await;

        assert_eq!(report.up.len(), 1);
        assert_eq!(report.up[0].ticker, "AAPL");
        assert!(report.down.is_empty());
        // The provider failure is skipped; the empty series is a quiet None.
        assert_eq!(report.skipped, vec!["BAD".to_string()]);
    }

    #[tokio::test]
    async fn test_all_failing_batch_returns_empty_report() {
        let mut provider = MockDataProvider::new();
        provider
            .expect_fetch()
            .returning(|ticker, _| Err(unavailable(ticker)));

        let tickers: Vec<String> = ["A", "B"].iter().map(|t| t.to_string()).collect();
        let orchestrator = BatchOrchestrator::new(Arc::new(provider), config(&["A", "B"]));

        let report = orchestrator.classify_batch(&tickers).await;

        assert!(report.up.is_empty());
        assert!(report.down.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[tokio::test]
    async fn test_predict_batch_keeps_input_order_and_abstains() {
        let mut provider = MockDataProvider::new();
        provider.expect_fetch().returning(|ticker, _| {
            Ok(match ticker {
                "SHORT" => series("SHORT", &[100.0, 101.0]),
                _ => {
                    let closes: Vec<f64> = (0..60)
                        .map(|i| 100.0 + (i as f64) * 0.3 + if i % 2 == 0 { 0.0 } else { 2.0 })
                        .collect();
                    series(ticker, &closes)
                }
            })
        });

        let tickers: Vec<String> = ["AAPL", "SHORT"].iter().map(|t| t.to_string()).collect();
        let mut cfg = config(&["AAPL", "SHORT"]);
        cfg.predictor.n_trees = 15;
        let orchestrator = BatchOrchestrator::new(Arc::new(provider), cfg);

        let outcomes = orchestrator.predict_batch(&tickers).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "AAPL");
        assert!(matches!(outcomes[0].1, TickerOutcome::Ready(_)));
        assert!(matches!(
            outcomes[1].1,
            TickerOutcome::Abstained(AnalysisError::InsufficientHistory { .. })
        ));
    }

    #[tokio::test]
    async fn test_predictions_are_deterministic_across_batches() {
        let make_provider = || {
            let mut provider = MockDataProvider::new();
            provider.expect_fetch().returning(|ticker, _| {
                let closes: Vec<f64> = (0..60)
                    .map(|i| 100.0 + (i as f64) * 0.3 + if i % 3 == 0 { 1.5 } else { -0.5 })
                    .collect();
                Ok(series(ticker, &closes))
            });
            provider
        };

        let tickers = vec!["AAPL".to_string()];
        let mut cfg = config(&["AAPL"]);
        cfg.predictor.n_trees = 15;

        let first = BatchOrchestrator::new(Arc::new(make_provider()), cfg.clone())
            .predict_batch(&tickers)
            .await;
        let second = BatchOrchestrator::new(Arc::new(make_provider()), cfg)
            .predict_batch(&tickers)
            .await;

        assert_eq!(first, second);
    }

    /// Provider that hangs long enough to trip any timeout under test.
    struct SlowProvider;

    #[async_trait]
    impl DataProvider for SlowProvider {
        async fn fetch(
            &self,
            ticker: &str,
            _window: WindowSpec,
        ) -> Result<PriceSeries, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(series(ticker, &[100.0, 105.0]))
        }
    }

    #[tokio::test]
    async fn test_slow_fetch_hits_per_ticker_timeout() {
        let mut cfg = config(&["SLOW"]);
        cfg.batch = BatchSettings {
            fetch_timeout_ms: 50,
            ..BatchSettings::default()
        };
        let orchestrator = BatchOrchestrator::new(Arc::new(SlowProvider), cfg);

        let tickers = vec!["SLOW".to_string()];
        let report = orchestrator.classify_batch(&tickers).await;

        assert!(report.up.is_empty());
        assert_eq!(report.skipped, vec!["SLOW".to_string()]);
    }

    #[tokio::test]
    async fn test_deadline_skips_unfinished_tickers() {
        let mut cfg = config(&["SLOW", "ALSO_SLOW"]);
        cfg.batch = BatchSettings {
            fetch_timeout_ms: 60_000,
            batch_deadline_ms: 50,
            ..BatchSettings::default()
        };
        let orchestrator = BatchOrchestrator::new(Arc::new(SlowProvider), cfg);

        let tickers: Vec<String> = ["SLOW", "ALSO_SLOW"].iter().map(|t| t.to_string()).collect();
        let outcomes = orchestrator.predict_batch(&tickers).await;

        assert_eq!(outcomes.len(), 2);
        for (_, outcome) in outcomes {
            assert_eq!(outcome, TickerOutcome::Skipped);
        }
    }
}
