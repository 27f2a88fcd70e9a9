use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while loading or running the predictor.
#[derive(Debug)]
pub enum PredictorError {
    /// Error occurred while loading weights or running the network
    ModelError(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
    /// The network returned a different number of residues than it was given
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for PredictorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "Model length mismatch: expected {} states, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for PredictorError {}

impl From<OrtError> for PredictorError {
    fn from(err: OrtError) -> Self {
        PredictorError::BuildError(err.to_string())
    }
}

impl From<crate::weights::WeightStoreError> for PredictorError {
    fn from(err: crate::weights::WeightStoreError) -> Self {
        PredictorError::BuildError(err.to_string())
    }
}
