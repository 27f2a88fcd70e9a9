use std::path::PathBuf;
use serde::Serialize;
use serde_json::Value;

mod error;
mod featurize;
mod labels;
mod backend;
mod cnn;
mod predictor;
pub mod builder;
mod utils;

pub use error::PredictorError;
pub use featurize::{featurize, residue_index, FEATURE_WIDTH, ONE_HOT_WIDTH, RESIDUE_CODES};
pub use labels::{LabelSet, ModelMeta, DEFAULT_LABELS, DEFAULT_NUM_CLASSES};
pub use backend::{OnnxModel, StructureModel};
pub use cnn::ProteinCnn;
pub use predictor::{Composition, LoadInfo, Prediction, Predictor};
pub use builder::PredictorBuilder;

/// Information about the loaded model, as reported by the `/model` endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PredictorInfo {
    /// Contents of `meta.json` (or the defaults when it is absent)
    pub meta: Value,
    /// Whether the weights directory holds an ONNX graph
    pub has_onnx: bool,
    /// Whether the weights directory holds a safetensors checkpoint
    pub has_checkpoint: bool,
    /// Directory the artifacts were loaded from
    pub weights_dir: Option<PathBuf>,
    /// The artifact that is actually serving predictions
    pub loaded: LoadInfo,
    /// Labels in class-index order
    pub labels: Vec<String>,
    /// Residues kept after cleaning
    pub max_length: usize,
}
