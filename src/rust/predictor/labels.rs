use std::path::Path;
use std::fs;
use ndarray::ArrayView2;
use serde_json::{json, Map, Value};
use log::{info, warn};

use super::error::PredictorError;
use super::utils::argmax;

/// Q3 labels in class-index order: helix, strand, coil.
pub const DEFAULT_LABELS: [&str; 3] = ["H", "E", "C"];

/// Number of classes assumed when no metadata says otherwise.
pub const DEFAULT_NUM_CLASSES: usize = 3;

/// Training-time metadata shipped next to the weights as `meta.json`.
///
/// Only `num_classes`, `label_map` and `sha256` are interpreted; every other
/// field is kept verbatim and reported through the model info endpoint.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    raw: Value,
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            raw: json!({ "arch": "ProteinClassifier2", "num_classes": DEFAULT_NUM_CLASSES }),
        }
    }
}

impl ModelMeta {
    /// Wraps an already parsed metadata document.
    pub fn from_value(raw: Value) -> Result<Self, PredictorError> {
        if !raw.is_object() {
            return Err(PredictorError::ValidationError(
                "Model metadata must be a JSON object".into(),
            ));
        }
        Ok(Self { raw })
    }

    /// Reads `meta.json`, falling back to the default metadata when the file is absent.
    pub fn load(path: &Path) -> Result<Self, PredictorError> {
        if !path.exists() {
            info!("No metadata at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| {
            PredictorError::BuildError(format!("Failed to read metadata {:?}: {}", path, e))
        })?;
        let raw: Value = serde_json::from_str(&text).map_err(|e| {
            PredictorError::BuildError(format!("Failed to parse metadata {:?}: {}", path, e))
        })?;
        Self::from_value(raw)
    }

    pub fn num_classes(&self) -> usize {
        self.raw
            .get("num_classes")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_NUM_CLASSES)
    }

    /// Expected SHA-256 digest for an artifact file name, if the metadata lists one.
    pub fn expected_sha256(&self, file_name: &str) -> Option<&str> {
        self.raw.get("sha256")?.get(file_name)?.as_str()
    }

    fn label_map(&self) -> Option<&Map<String, Value>> {
        self.raw.get("label_map")?.as_object()
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }
}

/// Maps class indices produced by the network to symbolic labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Resolves the label set for a model.
    ///
    /// A `label_map` that covers every index `0..num_classes` wins. Otherwise
    /// the Q3 defaults are used when the model has three classes, and the
    /// class indices themselves become the labels for any other class count.
    pub fn from_meta(meta: &ModelMeta) -> Self {
        let num_classes = meta.num_classes();

        if let Some(map) = meta.label_map() {
            let labels: Option<Vec<String>> = (0..num_classes)
                .map(|i| map.get(&i.to_string()).and_then(label_text))
                .collect();
            match labels {
                Some(labels) => return Self::new(labels),
                None => warn!("label_map does not cover classes 0..{}, ignoring it", num_classes),
            }
        }

        if num_classes == DEFAULT_NUM_CLASSES {
            Self::default()
        } else {
            warn!("No usable label_map for {} classes, labelling by index", num_classes);
            Self::new((0..num_classes).map(|i| i.to_string()).collect())
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Decodes `[L, C]` logits into one label per residue.
    pub fn decode(&self, logits: ArrayView2<f32>) -> Result<Vec<String>, PredictorError> {
        if logits.ncols() != self.labels.len() {
            return Err(PredictorError::PredictionError(format!(
                "Model produced {} classes but {} labels are configured",
                logits.ncols(),
                self.labels.len()
            )));
        }

        logits
            .rows()
            .into_iter()
            .map(|row| {
                let index = argmax(row).ok_or_else(|| {
                    PredictorError::PredictionError("Empty logits row".into())
                })?;
                Ok(self.labels[index].clone())
            })
            .collect()
    }
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
