use thiserror::Error;

/// Failures the analytic core can produce while processing a single ticker.
///
/// Every variant is recovered at the per-ticker boundary by the batch
/// orchestrator; none of them aborts a batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("{ticker}: no usable data from provider ({reason})")]
    DataUnavailable { ticker: String, reason: String },

    #[error("{ticker}: insufficient history ({got} rows, need {need})")]
    InsufficientHistory {
        ticker: String,
        got: usize,
        need: usize,
    },

    #[error("{ticker}: first close is zero, percent change undefined")]
    DivisionUndefined { ticker: String },

    #[error("{ticker}: model training failed ({reason})")]
    ModelTrainingFailure { ticker: String, reason: String },
}
