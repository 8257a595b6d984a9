use ndarray::{s, Array1, Array2, Axis};
use tracing::debug;

use super::features;
use super::forest::{ForestClassifier, ForestConfig};
use crate::config::PredictorSettings;
use crate::error::AnalysisError;
use crate::types::{PredictionResult, PriceSeries};

/// Trains a per-ticker direction classifier and predicts the next session.
///
/// Stateless per call: the fitted forest lives only for the duration of the
/// call and is never persisted.
pub struct DirectionPredictor {
    settings: PredictorSettings,
}

impl DirectionPredictor {
    pub fn new(settings: PredictorSettings) -> Self {
        Self { settings }
    }

    pub fn predict_next_direction(
        &self,
        series: &PriceSeries,
    ) -> Result<PredictionResult, AnalysisError> {
        let table = features::build(series, self.settings.min_training_rows)?;

        // Scaler statistics come from the full labeled table, matching the
        // pipeline this was ported from. See DESIGN.md before "fixing" this.
        let (means, stds) = column_stats(&table.rows);
        let standardized = standardize(&table.rows, &means, &stds);

        // Chronological split; the held-out tail never reaches the fit and
        // is never shuffled into training.
        let n = table.len();
        let train_len = (((n as f64) * self.settings.train_fraction).floor() as usize).clamp(1, n);
        let x_train = standardized.slice(s![..train_len, ..]);
        let y_train = table.labels.slice(s![..train_len]);
        debug!(
            "{}: {} labeled rows, training on {}",
            series.ticker(),
            n,
            train_len
        );

        let mut forest = ForestClassifier::new(ForestConfig {
            n_trees: self.settings.n_trees,
            max_depth: self.settings.max_depth,
            seed: self.settings.seed,
            ..ForestConfig::default()
        });
        forest
            .fit(x_train, y_train)
            .map_err(|reason| AnalysisError::ModelTrainingFailure {
                ticker: series.ticker().to_string(),
                reason,
            })?;

        let latest = standardize_row(&table.latest, &means, &stds);
        let label = forest.predict_one(latest.view());

        Ok(PredictionResult {
            ticker: series.ticker().to_string(),
            predicted_up: label == 1.0,
        })
    }
}

fn column_stats(rows: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let means = rows
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(rows.ncols()));
    let stds = rows.std_axis(Axis(0), 0.0);
    (means, stds)
}

fn standardize(rows: &Array2<f64>, means: &Array1<f64>, stds: &Array1<f64>) -> Array2<f64> {
    let mut out = rows.clone();
    for j in 0..rows.ncols() {
        let std = stds[j];
        for i in 0..rows.nrows() {
            // Zero-variance columns carry no signal; pin them to 0.
            out[[i, j]] = if std > 1e-10 {
                (rows[[i, j]] - means[j]) / std
            } else {
                0.0
            };
        }
    }
    out
}

fn standardize_row(row: &Array1<f64>, means: &Array1<f64>, stds: &Array1<f64>) -> Array1<f64> {
    let mut out = row.clone();
    for j in 0..row.len() {
        out[j] = if stds[j] > 1e-10 {
            (row[j] - means[j]) / stds[j]
        } else {
            0.0
        };
    }
    out
}
