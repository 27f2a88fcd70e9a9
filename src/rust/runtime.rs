use ort::environment::Environment;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::sync::OnceLock;

use crate::predictor::PredictorError;

static ENVIRONMENT: OnceLock<Result<Environment, String>> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
        }
    }
}

fn init_onnx_environment() -> ort::Result<Environment> {
    ort::init()
        .with_name("sspred")
        .build()
}

/// Returns the process-wide ONNX Runtime environment, creating it on first use.
///
/// The outcome of the first attempt is remembered, so a failed initialization
/// is reported on every later call instead of being retried.
pub fn ensure_initialized() -> Result<Environment, PredictorError> {
    ENVIRONMENT
        .get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| PredictorError::ModelError(format!("Failed to initialize ONNX Runtime environment: {}", e)))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, PredictorError> {
    let environment = ensure_initialized()?;
    let mut builder = Session::builder(&environment)?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder
            .with_inter_threads(config.inter_threads)
            .map_err(ort::Error::from)?;
    }
    if config.intra_threads > 0 {
        builder = builder
            .with_intra_threads(config.intra_threads)
            .map_err(ort::Error::from)?;
    }

    builder = builder
        .with_optimization_level(config.optimization_level)
        .map_err(ort::Error::from)?;

    Ok(builder)
}
