use std::fs;
use std::path::Path;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3};
use safetensors::{Dtype, SafeTensors};
use log::info;

use super::backend::StructureModel;
use super::error::PredictorError;
use super::featurize::FEATURE_WIDTH;
use super::utils::relu_inplace;

/// `(state dict prefix, in channels, out channels, kernel size)` for each convolution.
const CONV_LAYERS: [(&str, usize, usize, usize); 5] = [
    ("convLayers.0", FEATURE_WIDTH, 16, 3),
    ("convLayers.2", 16, 16, 5),
    ("convLayers.4", 16, 16, 7),
    ("convLayers.6", 16, 32, 15),
    ("convLayers.8", 32, 32, 21),
];

const HIDDEN_WIDTH: usize = 32;

/// One-dimensional convolution with zero "same" padding.
#[derive(Debug, Clone)]
struct Conv1d {
    /// `[out, in, kernel]`
    weight: Array3<f32>,
    bias: Array1<f32>,
}

impl Conv1d {
    fn padding(&self) -> usize {
        (self.weight.shape()[2] - 1) / 2
    }

    /// `x` is `[L, in]`, the result is `[L, out]`.
    fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let len = x.nrows();
        let (out_channels, _, kernel) = self.weight.dim();
        let pad = self.padding() as isize;
        let mut out = Array2::<f32>::zeros((len, out_channels));

        for t in 0..len {
            let mut row = out.row_mut(t);
            row.assign(&self.bias);
            for k in 0..kernel {
                let src = t as isize + k as isize - pad;
                if src < 0 || src >= len as isize {
                    continue;
                }
                let input = x.row(src as usize);
                // [out, in] slice of the kernel at tap k
                let taps = self.weight.slice(s![.., .., k]);
                row += &taps.dot(&input);
            }
        }

        out
    }
}

/// Fully connected layer, PyTorch layout.
#[derive(Debug, Clone)]
struct Linear {
    /// `[out, in]`
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// `x` is `[L, in]`, the result is `[L, out]`.
    fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

/// Native forward pass of the per-residue CNN, built from a safetensors state dict.
///
/// The network is five same-length convolutions (kernels 3, 5, 7, 15, 21)
/// with ReLU between them, followed by a three layer per-residue MLP.
#[derive(Debug, Clone)]
pub struct ProteinCnn {
    convs: Vec<Conv1d>,
    classifier: Vec<Linear>,
    num_classes: usize,
    val_acc: Option<f32>,
}

impl ProteinCnn {
    /// Loads the state dict from a `.safetensors` checkpoint.
    pub fn from_checkpoint(path: &Path, num_classes: usize) -> Result<Self, PredictorError> {
        let buffer = fs::read(path).map_err(|e| {
            PredictorError::BuildError(format!("Failed to read checkpoint {:?}: {}", path, e))
        })?;
        let model = Self::from_bytes(&buffer, num_classes)?;
        info!(
            "Loaded checkpoint {:?} ({} classes, val_acc: {:?})",
            path, model.num_classes, model.val_acc
        );
        Ok(model)
    }

    /// Parses a serialized safetensors state dict.
    ///
    /// A `val_acc` entry in the safetensors header metadata is picked up and
    /// reported alongside the load info.
    pub fn from_bytes(buffer: &[u8], num_classes: usize) -> Result<Self, PredictorError> {
        let tensors = SafeTensors::deserialize(buffer)
            .map_err(|e| PredictorError::ModelError(format!("Invalid checkpoint: {}", e)))?;
        let (_, header) = SafeTensors::read_metadata(buffer)
            .map_err(|e| PredictorError::ModelError(format!("Invalid checkpoint header: {}", e)))?;
        let val_acc = header
            .metadata()
            .as_ref()
            .and_then(|m| m.get("val_acc"))
            .and_then(|v| v.parse::<f32>().ok());

        let convs = CONV_LAYERS
            .iter()
            .map(|&(name, in_ch, out_ch, kernel)| {
                Ok(Conv1d {
                    weight: load_array3(&tensors, &format!("{}.weight", name), (out_ch, in_ch, kernel))?,
                    bias: load_array1(&tensors, &format!("{}.bias", name), out_ch)?,
                })
            })
            .collect::<Result<Vec<_>, PredictorError>>()?;

        let linear_shapes = [
            ("classifier.0", HIDDEN_WIDTH, HIDDEN_WIDTH),
            ("classifier.2", HIDDEN_WIDTH, HIDDEN_WIDTH),
            ("classifier.4", HIDDEN_WIDTH, num_classes),
        ];
        let classifier = linear_shapes
            .iter()
            .map(|&(name, in_f, out_f)| {
                Ok(Linear {
                    weight: load_array2(&tensors, &format!("{}.weight", name), (out_f, in_f))?,
                    bias: load_array1(&tensors, &format!("{}.bias", name), out_f)?,
                })
            })
            .collect::<Result<Vec<_>, PredictorError>>()?;

        Ok(Self {
            convs,
            classifier,
            num_classes,
            val_acc,
        })
    }

    pub fn val_acc(&self) -> Option<f32> {
        self.val_acc
    }

    /// Runs a single `[L, 24]` sequence and returns `[L, C]` logits.
    fn forward_sequence(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let last_conv = self.convs.len() - 1;
        let mut hidden = x.to_owned();
        for (i, conv) in self.convs.iter().enumerate() {
            hidden = conv.forward(hidden.view());
            if i != last_conv {
                relu_inplace(hidden.view_mut());
            }
        }

        let last_linear = self.classifier.len() - 1;
        for (i, linear) in self.classifier.iter().enumerate() {
            hidden = linear.forward(hidden.view());
            if i != last_linear {
                relu_inplace(hidden.view_mut());
            }
        }
        hidden
    }
}

impl StructureModel for ProteinCnn {
    fn backend_name(&self) -> &'static str {
        "checkpoint"
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

        let mut logits = Array3::<f32>::zeros((batch, len, self.num_classes));
        for b in 0..batch {
            let out = self.forward_sequence(features.slice(s![b, .., ..]));
            logits.slice_mut(s![b, .., ..]).assign(&out);
        }
        Ok(logits)
    }
}

fn tensor_values(
    tensors: &SafeTensors<'_>,
    name: &str,
    expected: &[usize],
) -> Result<Vec<f32>, PredictorError> {
    let view = tensors
        .tensor(name)
        .map_err(|e| PredictorError::ModelError(format!("Missing tensor '{}': {}", name, e)))?;
    if view.shape() != expected {
        return Err(PredictorError::ModelError(format!(
            "Tensor '{}' has shape {:?}, expected {:?}",
            name,
            view.shape(),
            expected
        )));
    }
    match view.dtype() {
        Dtype::F32 => Ok(view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        Dtype::F64 => Ok(view
            .data()
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect()),
        other => Err(PredictorError::ModelError(format!(
            "Tensor '{}' has unsupported dtype {:?}",
            name, other
        ))),
    }
}

fn load_array1(tensors: &SafeTensors<'_>, name: &str, len: usize) -> Result<Array1<f32>, PredictorError> {
    Ok(Array1::from_vec(tensor_values(tensors, name, &[len])?))
}

fn load_array2(
    tensors: &SafeTensors<'_>,
    name: &str,
    shape: (usize, usize),
) -> Result<Array2<f32>, PredictorError> {
    let values = tensor_values(tensors, name, &[shape.0, shape.1])?;
    Array2::from_shape_vec(shape, values)
        .map_err(|e| PredictorError::ModelError(format!("Failed to shape '{}': {}", name, e)))
}

fn load_array3(
    tensors: &SafeTensors<'_>,
    name: &str,
    shape: (usize, usize, usize),
) -> Result<Array3<f32>, PredictorError> {
    let values = tensor_values(tensors, name, &[shape.0, shape.1, shape.2])?;
    Array3::from_shape_vec(shape, values)
        .map_err(|e| PredictorError::ModelError(format!("Failed to shape '{}': {}", name, e)))
}
