//! Per-residue protein secondary structure (Q3: helix/strand/coil) prediction.
//!
//! A raw amino-acid sequence is cleaned, encoded as a `[1, L, 24]` feature
//! tensor (22-way one-hot plus N/C-terminal flags), run through a small 1D
//! convolutional network and decoded into one label per residue.
//!
//! The network is loaded from a weights directory, preferring an ONNX graph
//! (`model_weights.onnx`) and falling back to a safetensors state dict
//! (`model_weights.safetensors`) executed natively.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sspred::Predictor;
//!
//! let predictor = Predictor::builder()
//!     .with_weights_dir("weights")
//!     .build()?;
//!
//! let prediction = predictor.predict("MKTAYIAKQRQISFVKSHFSRQ", 1)?;
//! for (residue, state) in prediction.sequence.chars().zip(&prediction.states) {
//!     println!("{} {}", residue, state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! [`server::create_router`] exposes the predictor over HTTP; see the
//! [`server`] module for the endpoints.

pub mod predictor;
mod runtime;
pub mod sequence;
pub mod server;
pub mod weights;

pub use predictor::{
    Composition, LabelSet, LoadInfo, ModelMeta, Prediction, Predictor, PredictorBuilder,
    PredictorError, PredictorInfo, StructureModel,
};
pub use runtime::{RuntimeConfig, create_session_builder};
pub use sequence::{clean_sequence, DEFAULT_MAX_LENGTH};
pub use weights::{WeightStore, WeightStoreError};

pub fn init_logger() {
    env_logger::init();
}
