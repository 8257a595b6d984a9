use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default universe scanned when the caller supplies no tickers.
pub const DEFAULT_TICKERS: [&str; 6] = ["AAPL", "MSFT", "GOOGL", "TSLA", "NVDA", "AMZN"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub tickers: Vec<String>,
    pub trend: TrendSettings,
    pub predictor: PredictorSettings,
    pub batch: BatchSettings,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            trend: TrendSettings::default(),
            predictor: PredictorSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    /// Trailing window length in calendar days.
    pub window_days: i64,
    /// Strict lower bound for an Up classification, in percent.
    pub threshold_up_pct: f64,
    /// Strict upper bound for a Down classification, in percent.
    pub threshold_down_pct: f64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            window_days: 5,
            threshold_up_pct: 2.0,
            threshold_down_pct: -2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorSettings {
    /// History fetched per ticker for training, in calendar days.
    pub history_days: i64,
    /// Labeled rows required before a model fit is attempted.
    pub min_training_rows: usize,
    /// Chronological share of rows used for training.
    pub train_fraction: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            history_days: 365,
            min_training_rows: 10,
            train_fraction: 0.8,
            n_trees: 100,
            max_depth: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Concurrent provider fetches allowed at once.
    pub max_concurrent_fetches: usize,
    /// Per-ticker fetch timeout.
    pub fetch_timeout_ms: u64,
    /// Overall batch deadline; unfinished tickers are reported as skipped.
    pub batch_deadline_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            fetch_timeout_ms: 10_000,
            batch_deadline_ms: 60_000,
        }
    }
}

impl BotConfig {
    /// Reads TOML from `path`; a missing file falls back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config =
                    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path))?;
                info!("Loaded configuration from {}", path);
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using default configuration", path);
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path)),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.tickers.is_empty() {
            errors.push("tickers must not be empty".to_string());
        }
        if self.trend.window_days < 2 {
            errors.push("trend.window_days must be >= 2".to_string());
        }
        if self.trend.threshold_up_pct < self.trend.threshold_down_pct {
            errors.push("trend.threshold_up_pct must be >= trend.threshold_down_pct".to_string());
        }
        if self.predictor.history_days < 2 {
            errors.push("predictor.history_days must be >= 2".to_string());
        }
        if self.predictor.min_training_rows < 10 {
            errors.push("predictor.min_training_rows must be >= 10".to_string());
        }
        if self.predictor.train_fraction <= 0.0 || self.predictor.train_fraction >= 1.0 {
            errors.push("predictor.train_fraction must be between 0 and 1".to_string());
        }
        if self.predictor.n_trees == 0 {
            errors.push("predictor.n_trees must be > 0".to_string());
        }
        if self.predictor.max_depth == 0 {
            errors.push("predictor.max_depth must be > 0".to_string());
        }
        if self.batch.max_concurrent_fetches == 0 {
            errors.push("batch.max_concurrent_fetches must be > 0".to_string());
        }
        if self.batch.fetch_timeout_ms == 0 {
            errors.push("batch.fetch_timeout_ms must be > 0".to_string());
        }
        if self.batch.batch_deadline_ms == 0 {
            errors.push("batch.batch_deadline_ms must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(BotConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_collects_errors() {
        let invalid = BotConfig {
            tickers: Vec::new(),
            trend: TrendSettings {
                window_days: 1,
                ..TrendSettings::default()
            },
            predictor: PredictorSettings {
                n_trees: 0,
                ..PredictorSettings::default()
            },
            ..BotConfig::default()
        };

        let errors = invalid.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            tickers = ["AAPL"]

            [trend]
            window_days = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.tickers, vec!["AAPL"]);
        assert_eq!(config.trend.window_days, 7);
        assert_eq!(config.trend.threshold_up_pct, 2.0);
        assert_eq!(config.predictor.n_trees, 100);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let invalid = BotConfig {
            trend: TrendSettings {
                threshold_up_pct: -5.0,
                threshold_down_pct: 5.0,
                ..TrendSettings::default()
            },
            ..BotConfig::default()
        };

        assert!(invalid.validate().is_err());
    }
}
