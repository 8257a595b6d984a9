use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
}

/// A classified move over the requested window. Derived, recomputed per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub ticker: String,
    pub percent_change: f64,
    pub direction: TrendDirection,
}

/// Next-session direction for one ticker. No trained model is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub ticker: String,
    pub predicted_up: bool,
}

/// Terminal state of one ticker in a batch pass.
///
/// Errors are data here, not control flow: the orchestrator records the
/// outcome and moves on to the next ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome<T> {
    /// The pipeline produced a result.
    Ready(T),
    /// The pipeline ran but the move stayed inside the noise band.
    NoSignal,
    /// A stage abstained or failed; the ticker is excluded, not the batch.
    Abstained(AnalysisError),
    /// The batch deadline elapsed before this ticker finished.
    Skipped,
}
