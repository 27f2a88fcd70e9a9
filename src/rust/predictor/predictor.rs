use std::sync::Arc;
use std::path::PathBuf;
use ndarray::s;
use serde::Serialize;
use log::debug;

use super::backend::StructureModel;
use super::error::PredictorError;
use super::featurize::featurize;
use super::labels::{LabelSet, ModelMeta};
use crate::sequence::clean_sequence;

/// Where the running network came from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoadInfo {
    /// `"onnx"`, `"checkpoint"` or the name of a custom backend
    pub backend: String,
    /// Artifact the network was loaded from, if any
    pub path: Option<PathBuf>,
    /// Validation accuracy recorded in the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_acc: Option<f32>,
}

/// One prediction: the cleaned sequence and a label per residue.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Prediction {
    pub sequence: String,
    pub index_start: u64,
    pub states: Vec<String>,
}

/// Per-state residue counts of a prediction.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Composition {
    pub helix: usize,
    pub strand: usize,
    pub coil: usize,
    pub length: usize,
}

impl Composition {
    /// Fraction of residues in `count`; zero for an empty sequence.
    pub fn fraction(&self, count: usize) -> f32 {
        if self.length == 0 {
            0.0
        } else {
            count as f32 / self.length as f32
        }
    }
}

impl Prediction {
    /// Renders `Index,Residue,State` rows, numbering residues from `index_start`.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("Index,Residue,State\n");
        let rows: Vec<String> = self
            .sequence
            .chars()
            .zip(&self.states)
            .enumerate()
            .map(|(i, (residue, state))| format!("{},{},{}", self.index_start + i as u64, residue, state))
            .collect();
        csv.push_str(&rows.join("\n"));
        csv
    }

    pub fn composition(&self) -> Composition {
        let count = |label: &str| self.states.iter().filter(|s| s.as_str() == label).count();
        Composition {
            helix: count("H"),
            strand: count("E"),
            coil: count("C"),
            length: self.sequence.chars().count(),
        }
    }
}

/// A thread-safe per-residue secondary structure predictor.
///
/// # Thread Safety
///
/// The predictor only holds `Arc`s to immutable state, so it is `Send + Sync`
/// and one instance can serve every request.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use sspred::Predictor;
///
/// let predictor = Predictor::builder()
///     .with_weights_dir("weights")
///     .build()?;
///
/// let prediction = predictor.predict("MKTAYIAKQRQISFVKSHFSRQ", 1)?;
/// println!("{}", prediction.states.concat());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Predictor {
    pub(crate) model: Arc<dyn StructureModel>,
    pub(crate) labels: Arc<LabelSet>,
    pub(crate) meta: Arc<ModelMeta>,
    pub(crate) load_info: LoadInfo,
    pub(crate) weights_dir: Option<PathBuf>,
    pub(crate) max_length: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Predictor>();
    }
};

impl Predictor {
    /// Creates a new PredictorBuilder for fluent construction
    pub fn builder() -> super::builder::PredictorBuilder {
        super::builder::PredictorBuilder::new()
    }

    pub fn load_info(&self) -> &LoadInfo {
        &self.load_info
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns information about the loaded model and its weights directory
    pub fn info(&self) -> super::PredictorInfo {
        let (has_onnx, has_checkpoint) = match &self.weights_dir {
            Some(dir) => (
                dir.join(crate::weights::GRAPH_FILE).exists(),
                dir.join(crate::weights::CHECKPOINT_FILE).exists(),
            ),
            None => (false, false),
        };
        super::PredictorInfo {
            meta: self.meta.as_value().clone(),
            has_onnx,
            has_checkpoint,
            weights_dir: self.weights_dir.clone(),
            loaded: self.load_info.clone(),
            labels: self.labels.labels().to_vec(),
            max_length: self.max_length,
        }
    }

    /// Predicts one label per residue of an already cleaned sequence.
    ///
    /// # Errors
    /// - `ValidationError` if the sequence is empty
    /// - `ModelError` if the forward pass fails
    /// - `LengthMismatch` if the network does not return one row per residue
    pub fn predict_states(&self, sequence: &str) -> Result<Vec<String>, PredictorError> {
        if sequence.is_empty() {
            return Err(PredictorError::ValidationError("Input sequence cannot be empty".into()));
        }
        let residues = sequence.chars().count();

        let features = featurize(sequence);
        let logits = self.model.forward(features.view())?;
        if logits.shape()[0] == 0 {
            return Err(PredictorError::PredictionError("Model returned an empty batch".into()));
        }
        if logits.shape()[1] != residues {
            return Err(PredictorError::LengthMismatch {
                expected: residues,
                actual: logits.shape()[1],
            });
        }

        let states = self.labels.decode(logits.slice(s![0, .., ..]))?;
        if states.len() != residues {
            return Err(PredictorError::LengthMismatch {
                expected: residues,
                actual: states.len(),
            });
        }
        Ok(states)
    }

    /// Cleans raw input and predicts its secondary structure.
    ///
    /// # Errors
    /// - `ValidationError` if no valid amino acids remain after cleaning
    /// - any error from [`Predictor::predict_states`]
    pub fn predict(&self, raw: &str, index_start: u64) -> Result<Prediction, PredictorError> {
        let sequence = clean_sequence(raw, self.max_length);
        debug!("Cleaned sequence: {}", sequence);
        if sequence.is_empty() {
            return Err(PredictorError::ValidationError("No valid amino acids.".into()));
        }

        let states = self.predict_states(&sequence)?;
        debug!("Predicted states: {}", states.concat());
        Ok(Prediction {
            sequence,
            index_start,
            states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayView3};
    use std::thread;

    /// Labels residue `i` with class `i % num_classes`, optionally dropping residues.
    #[derive(Debug)]
    struct CyclingModel {
        num_classes: usize,
        drop: usize,
    }

    impl StructureModel for CyclingModel {
        fn backend_name(&self) -> &'static str {
            "cycling"
        }

        fn num_classes(&self) -> usize {
            self.num_classes
        }

        fn forward(&self, features: ArrayView3<f32>) -> Result<Array3<f32>, PredictorError> {
            let (batch, len, _) = features.dim();
            let len = len.saturating_sub(self.drop);
            let mut logits = Array3::zeros((batch, len, self.num_classes));
            for t in 0..len {
                logits[[0, t, t % self.num_classes]] = 1.0;
            }
            Ok(logits)
        }
    }

    fn predictor(drop: usize) -> Predictor {
        Predictor::builder()
            .with_model(CyclingModel { num_classes: 3, drop })
            .build()
            .unwrap()
    }

    #[test]
    fn test_predict_cleans_and_labels() {
        let prediction = predictor(0).predict("mk t-a y", 5).unwrap();
        assert_eq!(prediction.sequence, "MKTAY");
        assert_eq!(prediction.index_start, 5);
        assert_eq!(prediction.states, vec!["H", "E", "C", "H", "E"]);
    }

    #[test]
    fn test_predict_rejects_empty_after_cleaning() {
        let err = predictor(0).predict("123 ---", 1).unwrap_err();
        assert!(matches!(err, PredictorError::ValidationError(ref m) if m == "No valid amino acids."));
    }

    #[test]
    fn test_predict_truncates_to_max_length() {
        let predictor = Predictor::builder()
            .with_model(CyclingModel { num_classes: 3, drop: 0 })
            .with_max_length(4)
            .unwrap()
            .build()
            .unwrap();
        let prediction = predictor.predict("ACDEFGHIK", 1).unwrap();
        assert_eq!(prediction.sequence, "ACDE");
        assert_eq!(prediction.states.len(), 4);
    }

    #[test]
    fn test_length_mismatch() {
        let err = predictor(1).predict_states("MKTAY").unwrap_err();
        assert!(matches!(err, PredictorError::LengthMismatch { expected: 5, actual: 4 }));
    }

    #[test]
    fn test_csv_and_composition() {
        let prediction = Prediction {
            sequence: "MKTA".into(),
            index_start: 10,
            states: vec!["H".into(), "H".into(), "E".into(), "C".into()],
        };
        assert_eq!(prediction.to_csv(), "Index,Residue,State\n10,M,H\n11,K,H\n12,T,E\n13,A,C");

        let composition = prediction.composition();
        assert_eq!(composition, Composition { helix: 2, strand: 1, coil: 1, length: 4 });
        assert_eq!(composition.fraction(composition.helix), 0.5);
    }

    #[test]
    fn test_info_without_weights_dir() {
        let info = predictor(0).info();
        assert_eq!(info.loaded.backend, "cycling");
        assert!(!info.has_onnx);
        assert!(!info.has_checkpoint);
        assert_eq!(info.labels, vec!["H", "E", "C"]);
        assert_eq!(info.meta["num_classes"], 3);
    }

    #[test]
    fn test_thread_safety() {
        let predictor = Arc::new(predictor(0));
        let mut handles = vec![];

        for _ in 0..3 {
            let predictor = Arc::clone(&predictor);
            handles.push(thread::spawn(move || {
                let result = predictor.predict("MKTAYIAK", 1);
                assert!(result.is_ok());
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
