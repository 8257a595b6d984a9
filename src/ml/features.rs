use ndarray::{Array1, Array2};

use crate::error::AnalysisError;
use crate::types::{PriceBar, PriceSeries};

/// Raw OHLCV of one bar, in column order.
pub const NUM_FEATURES: usize = 5;

/// Supervised table for one ticker: one labeled row per bar except the last,
/// plus the unlabeled latest bar the prediction targets.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Array2<f64>,
    /// 1.0 when the next close was strictly higher, else 0.0.
    pub labels: Array1<f64>,
    /// Feature vector of the most recent bar, the one no label can cover.
    pub latest: Array1<f64>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }
}

/// Builds the labeled table: `label[t] = close[t+1] > close[t]`.
///
/// Equal closes label as 0 (non-increase). Fewer than `min_rows` labeled rows
/// is `InsufficientHistory`, the predictor's abstain signal.
pub fn build(series: &PriceSeries, min_rows: usize) -> Result<FeatureTable, AnalysisError> {
    let bars = series.bars();
    let n_labeled = bars.len().saturating_sub(1);
    if n_labeled < min_rows {
        return Err(AnalysisError::InsufficientHistory {
            ticker: series.ticker().to_string(),
            got: n_labeled,
            need: min_rows,
        });
    }

    let mut rows = Array2::zeros((n_labeled, NUM_FEATURES));
    let mut labels = Array1::zeros(n_labeled);
    for t in 0..n_labeled {
        for (j, value) in bar_features(&bars[t]).iter().enumerate() {
            rows[[t, j]] = *value;
        }
        labels[t] = if bars[t + 1].close > bars[t].close {
            1.0
        } else {
            0.0
        };
    }

    let latest = Array1::from(bar_features(&bars[bars.len() - 1]).to_vec());

    Ok(FeatureTable {
        rows,
        labels,
        latest,
    })
}

fn bar_features(bar: &PriceBar) -> [f64; NUM_FEATURES] {
    [
        bar.open.try_into().unwrap_or(0.0),
        bar.high.try_into().unwrap_or(0.0),
        bar.low.try_into().unwrap_or(0.0),
        bar.close.try_into().unwrap_or(0.0),
        bar.volume as f64,
    ]
}
