pub mod features;
pub mod forest;
pub mod predictor;

pub use predictor::DirectionPredictor;
