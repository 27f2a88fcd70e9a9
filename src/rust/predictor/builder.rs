use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{info, warn};

use super::backend::{OnnxModel, StructureModel};
use super::cnn::ProteinCnn;
use super::error::PredictorError;
use super::labels::{LabelSet, ModelMeta};
use super::predictor::{LoadInfo, Predictor};
use crate::runtime::RuntimeConfig;
use crate::sequence::DEFAULT_MAX_LENGTH;
use crate::weights::{WeightStore, CHECKPOINT_FILE, GRAPH_FILE};

/// A builder for constructing a Predictor with a fluent interface.
///
/// Weights are resolved when [`PredictorBuilder::build`] runs: the ONNX graph
/// is preferred, the safetensors checkpoint is the fallback, and the build
/// fails if the weights directory holds neither.
#[derive(Debug, Default)]
pub struct PredictorBuilder {
    weights_dir: Option<PathBuf>,
    model: Option<Arc<dyn StructureModel>>,
    meta: Option<ModelMeta>,
    max_length: Option<usize>,
    runtime_config: RuntimeConfig,
}

impl PredictorBuilder {
    /// Creates a new empty PredictorBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use sspred::PredictorBuilder;
    ///
    /// let builder = PredictorBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            weights_dir: None,
            model: None,
            meta: None,
            max_length: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution
    ///
    /// # Example
    /// ```
    /// use sspred::{PredictorBuilder, RuntimeConfig};
    ///
    /// let config = RuntimeConfig::default();
    /// let builder = PredictorBuilder::new()
    ///     .with_runtime_config(config);
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets the directory holding `model_weights.onnx`, `model_weights.safetensors`
    /// and `meta.json`. Without it the default weights directory is used.
    pub fn with_weights_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.weights_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Uses an already constructed network instead of loading one from disk.
    pub fn with_model(mut self, model: impl StructureModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Overrides the metadata that would otherwise be read from `meta.json`.
    pub fn with_meta(mut self, meta: ModelMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Sets the number of residues kept after cleaning
    ///
    /// # Returns
    /// * `Err(PredictorError::ValidationError)` if `max_length` is zero
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self, PredictorError> {
        if max_length == 0 {
            return Err(PredictorError::ValidationError(
                "Maximum sequence length must be at least 1".into(),
            ));
        }
        self.max_length = Some(max_length);
        Ok(self)
    }

    /// Builds and returns the final Predictor instance
    ///
    /// # Returns
    /// * `Result<Predictor, PredictorError>` - The constructed Predictor if successful, or an error if:
    ///   - The weights directory contains neither artifact
    ///   - An artifact fails its SHA-256 check against `meta.json`
    ///   - The graph or checkpoint cannot be loaded
    ///   - The model's class count disagrees with the label set
    pub fn build(mut self) -> Result<Predictor, PredictorError> {
        let max_length = self.max_length.unwrap_or(DEFAULT_MAX_LENGTH);

        let (model, meta, load_info, weights_dir) = match self.model.take() {
            Some(model) => {
                let meta = self.meta.take().unwrap_or_default();
                let load_info = LoadInfo {
                    backend: model.backend_name().to_string(),
                    path: None,
                    val_acc: None,
                };
                (model, meta, load_info, self.weights_dir.take())
            }
            None => {
                let store = match self.weights_dir.take() {
                    Some(dir) => WeightStore::new(dir),
                    None => WeightStore::new_default(),
                };

                let meta = match self.meta.take() {
                    Some(meta) => meta,
                    None => ModelMeta::load(&store.meta_path())?,
                };
                let (model, load_info) = Self::load_model(&store, &meta, &self.runtime_config)?;
                (model, meta, load_info, Some(store.weights_dir().to_path_buf()))
            }
        };

        let labels = LabelSet::from_meta(&meta);
        if labels.len() != model.num_classes() {
            return Err(PredictorError::BuildError(format!(
                "Model has {} classes but {} labels are configured",
                model.num_classes(),
                labels.len()
            )));
        }

        info!(
            "Predictor ready: backend={}, labels={:?}, max_length={}",
            load_info.backend,
            labels.labels(),
            max_length
        );

        Ok(Predictor {
            model,
            labels: Arc::new(labels),
            meta: Arc::new(meta),
            load_info,
            weights_dir,
            max_length,
        })
    }

    /// Walks the artifact fallback chain: ONNX graph first, then the checkpoint.
    fn load_model(
        store: &WeightStore,
        meta: &ModelMeta,
        config: &RuntimeConfig,
    ) -> Result<(Arc<dyn StructureModel>, LoadInfo), PredictorError> {
        let num_classes = meta.num_classes();
        if let Err(e) = store.ensure_available() {
            warn!("No model artifacts in {:?}", store.weights_dir());
            return Err(e.into());
        }

        if store.has_graph() {
            if let Some(expected) = meta.expected_sha256(GRAPH_FILE) {
                store.verify_artifact(GRAPH_FILE, expected)?;
            }
            let path = store.graph_path();
            info!("Loading ONNX graph from {:?}", path);
            let model = OnnxModel::load(&path, config, num_classes)?;
            return Ok((
                Arc::new(model),
                LoadInfo {
                    backend: "onnx".into(),
                    path: Some(path),
                    val_acc: None,
                },
            ));
        }

        if let Some(expected) = meta.expected_sha256(CHECKPOINT_FILE) {
            store.verify_artifact(CHECKPOINT_FILE, expected)?;
        }
        let path = store.checkpoint_path();
        info!("No ONNX graph found, loading checkpoint from {:?}", path);
        let model = ProteinCnn::from_checkpoint(&path, num_classes)?;
        let val_acc = model.val_acc();
        Ok((
            Arc::new(model),
            LoadInfo {
                backend: "checkpoint".into(),
                path: Some(path),
                val_acc,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use serde_json::json;
    use crate::predictor::cnn::tests::state_dict_bytes;
    use crate::weights::{sha256_hex, META_FILE};

    fn write_checkpoint(dir: &Path, num_classes: usize, class: usize) -> Vec<u8> {
        let metadata = HashMap::from([("val_acc".to_string(), "0.5".to_string())]);
        let bytes = state_dict_bytes(num_classes, Some(metadata), |name, i| {
            if name == "classifier.4.bias" && i == class { 1.0 } else { 0.0 }
        });
        fs::write(dir.join(CHECKPOINT_FILE), &bytes).unwrap();
        bytes
    }

    #[test]
    fn test_build_without_artifacts_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = PredictorBuilder::new()
            .with_weights_dir(dir.path())
            .build()
            .unwrap_err();
        assert!(matches!(err, PredictorError::BuildError(_)));
        assert!(err.to_string().contains("No model artifacts found"));
    }

    #[test]
    fn test_checkpoint_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), 3, 2);

        let predictor = PredictorBuilder::new()
            .with_weights_dir(dir.path())
            .build()
            .unwrap();
        let info = predictor.load_info();
        assert_eq!(info.backend, "checkpoint");
        assert_eq!(info.val_acc, Some(0.5));

        let prediction = predictor.predict("MKTAY", 1).unwrap();
        assert_eq!(prediction.states, vec!["C"; 5]);
    }

    #[test]
    fn test_label_map_from_meta_file() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), 3, 0);
        fs::write(
            dir.path().join(META_FILE),
            json!({ "num_classes": 3, "label_map": { "0": "C", "1": "H", "2": "E" } }).to_string(),
        )
        .unwrap();

        let predictor = PredictorBuilder::new()
            .with_weights_dir(dir.path())
            .build()
            .unwrap();
        assert_eq!(predictor.predict_states("GG").unwrap(), vec!["C", "C"]);
    }

    #[test]
    fn test_checksum_verified_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = write_checkpoint(dir.path(), 3, 1);

        fs::write(
            dir.path().join(META_FILE),
            json!({ "sha256": { "model_weights.safetensors": "00" } }).to_string(),
        )
        .unwrap();
        assert!(PredictorBuilder::new().with_weights_dir(dir.path()).build().is_err());

        fs::write(
            dir.path().join(META_FILE),
            json!({ "sha256": { "model_weights.safetensors": sha256_hex(&bytes) } }).to_string(),
        )
        .unwrap();
        assert!(PredictorBuilder::new().with_weights_dir(dir.path()).build().is_ok());
    }

    #[test]
    fn test_class_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), 3, 0);
        fs::write(dir.path().join(META_FILE), json!({ "num_classes": 8 }).to_string()).unwrap();

        // The checkpoint's last layer has 3 outputs, meta says 8
        assert!(PredictorBuilder::new().with_weights_dir(dir.path()).build().is_err());
    }

    #[test]
    fn test_invalid_graph_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), 3, 0);
        fs::write(dir.path().join(GRAPH_FILE), b"not an onnx graph").unwrap();

        // A present but broken graph is an error, not a silent fallback
        assert!(PredictorBuilder::new().with_weights_dir(dir.path()).build().is_err());
    }

    #[test]
    fn test_missing_directory_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("wieghts");
        let err = PredictorBuilder::new()
            .with_weights_dir(&missing)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("No model artifacts found"));
        assert!(!missing.exists());
    }

    #[test]
    fn test_graph_preferred_over_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), 3, 2);
        let graph = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/residue_matmul.onnx");
        fs::copy(graph, dir.path().join(GRAPH_FILE)).unwrap();

        let predictor = PredictorBuilder::new()
            .with_weights_dir(dir.path())
            .build()
            .unwrap();
        let info = predictor.load_info();
        assert_eq!(info.backend, "onnx");
        assert_eq!(info.val_acc, None);
        assert!(info.path.as_ref().unwrap().ends_with(GRAPH_FILE));

        // The checkpoint would answer "C" everywhere
        assert_eq!(predictor.predict_states("ACDE").unwrap(), vec!["H", "E", "C", "H"]);
    }

    #[test]
    fn test_graph_class_count_checked_against_meta() {
        let dir = tempfile::tempdir().unwrap();
        let graph = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/residue_matmul.onnx");
        fs::copy(graph, dir.path().join(GRAPH_FILE)).unwrap();
        fs::write(dir.path().join(META_FILE), json!({ "num_classes": 8 }).to_string()).unwrap();

        let err = PredictorBuilder::new()
            .with_weights_dir(dir.path())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("outputs 3 classes"));
    }

    #[test]
    fn test_zero_max_length_rejected() {
        assert!(matches!(
            PredictorBuilder::new().with_max_length(0),
            Err(PredictorError::ValidationError(_))
        ));
    }
}
