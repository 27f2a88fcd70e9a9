use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use ndarray::{Array3, ArrayView3};
use ort::session::Session;
use ort::value::Tensor;
use log::info;

use super::error::PredictorError;
use super::featurize::FEATURE_WIDTH;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A loaded secondary-structure network.
///
/// Implementations take features shaped `[B, L, 24]` and return logits shaped
/// `[B, L, C]`. They must be usable from several request handlers at once.
pub trait StructureModel: Send + Sync + std::fmt::Debug {
    /// Short name of the artifact kind the model was loaded from
    fn backend_name(&self) -> &'static str;

    /// Number of classes in the output logits
    fn num_classes(&self) -> usize;

    /// Runs the forward pass
    fn forward(&self, features: ArrayView3<f32>) -> Result<Array3<f32>, PredictorError>;
}

/// The network exported as an ONNX graph, executed by ONNX Runtime.
///
/// The graph is expected to:
/// - Accept one float input of shape [batch_size, sequence_length, 24]
/// - Output logits of shape [batch_size, sequence_length, num_classes]
///   (a rank 2 [sequence_length, num_classes] output is accepted for batch size 1)
#[derive(Debug)]
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    num_classes: usize,
}

impl OnnxModel {
    pub fn load(path: &Path, config: &RuntimeConfig, num_classes: usize) -> Result<Self, PredictorError> {
        let session = create_session_builder(config)?.commit_from_file(path)?;
        Self::validate_model(&session, num_classes)?;
        info!("ONNX graph {:?} validated successfully", path);

        let input_name = session.inputs()[0].name().to_string();
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            num_classes,
        })
    }

    /// Validates that the graph has the expected input/output structure.
    ///
    /// Dynamic dimensions are reported as -1 and are not checked here.
    fn validate_model(session: &Session, num_classes: usize) -> Result<(), PredictorError> {
        if session.inputs().len() != 1 {
            return Err(PredictorError::ModelError(format!(
                "Model must have exactly 1 input (residue features), found {}",
                session.inputs().len()
            )));
        }
        if session.outputs().is_empty() {
            return Err(PredictorError::ModelError(
                "Model must have at least 1 output for logits".to_string(),
            ));
        }

        if let Some(&width) = session.inputs()[0].dtype().tensor_shape().and_then(|s| s.last()) {
            if width >= 0 && width as usize != FEATURE_WIDTH {
                return Err(PredictorError::ModelError(format!(
                    "Model input has {} features per residue, expected {}",
                    width, FEATURE_WIDTH
                )));
            }
        }
        if let Some(&classes) = session.outputs()[0].dtype().tensor_shape().and_then(|s| s.last()) {
            if classes >= 0 && classes as usize != num_classes {
                return Err(PredictorError::ModelError(format!(
                    "Model outputs {} classes but {} are configured",
                    classes, num_classes
                )));
            }
        }
        Ok(())
    }
}

impl StructureModel for OnnxModel {
    fn backend_name(&self) -> &'static str {
        "onnx"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, features: ArrayView3<f32>) -> Result<Array3<f32>, PredictorError> {
        let (batch, len, width) = features.dim();
        if width != FEATURE_WIDTH {
            return Err(PredictorError::ValidationError(format!(
                "Expected last dim={}, got {}",
                FEATURE_WIDTH, width
            )));
        }

        let values: Vec<f32> = features.iter().cloned().collect();
        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array((vec![batch, len, width], values))
                .map_err(|e| PredictorError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let mut session = self
            .session
            .lock()
            .map_err(|_| PredictorError::ModelError("ONNX session lock poisoned".to_string()))?;
        let outputs = session
            .run(input_tensors)
            .map_err(|e| PredictorError::ModelError(format!("Failed to run model: {}", e)))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictorError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let values = data.to_vec();
        let logits = match dims.as_slice() {
            &[b, l, c] => Array3::from_shape_vec((b, l, c), values),
            &[l, c] if batch == 1 => Array3::from_shape_vec((1, l, c), values),
            other => {
                return Err(PredictorError::ModelError(format!(
                    "Unexpected output shape {:?} for input [{}, {}, {}]",
                    other, batch, len, width
                )))
            }
        }
        .map_err(|e| PredictorError::ModelError(format!("Failed to shape logits: {}", e)))?;

        Ok(logits)
    }
}
