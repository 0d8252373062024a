use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module};
use tracing::info;

use crate::error::{ArtifactError, InferenceError};

/// Feed-forward regression model loaded from a safetensors artifact.
///
/// The artifact holds `layers.{i}.weight` (`[out, in]`) and `layers.{i}.bias`
/// (`[out]`) pairs, contiguous from index 0. The forward pass applies ReLU
/// between layers and leaves the single-output head linear.
#[derive(Debug)]
pub struct MlpRegressor {
    layers: Vec<Linear>,
    input_dim: usize,
    device: Device,
}

impl MlpRegressor {
    /// Load the model artifact from disk. Called once at startup, before the
    /// listener binds; any failure here keeps the process from serving.
    #[tracing::instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let device = Device::Cpu;
        let tensors =
            candle_core::safetensors::load(path, &device).map_err(|source| ArtifactError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let model = Self::from_tensors(tensors)?;
        info!(
            path = %path.display(),
            layers = model.layers.len(),
            input_dim = model.input_dim,
            "Model artifact loaded"
        );
        Ok(model)
    }

    /// Assemble the layer stack from named tensors, checking that every
    /// weight has a matching bias, consecutive layers chain, and the head
    /// produces a single scalar.
    pub fn from_tensors(tensors: HashMap<String, Tensor>) -> Result<Self, ArtifactError> {
        let device = Device::Cpu;
        let mut layers = Vec::new();
        let mut input_dim = None;
        let mut prev_out = None;

        for index in 0.. {
            let weight_name = format!("layers.{index}.weight");
            let Some(weight) = tensors.get(&weight_name) else {
                break;
            };
            let bias_name = format!("layers.{index}.bias");
            let bias = tensors
                .get(&bias_name)
                .ok_or_else(|| ArtifactError::MissingTensor {
                    name: bias_name.clone(),
                })?;

            let (out_dim, in_dim) = weight.dims2().map_err(|_| ArtifactError::BadShape {
                name: weight_name.clone(),
                shape: weight.dims().to_vec(),
                expected: "[out, in]".to_string(),
            })?;
            let bias_dim = bias.dims1().map_err(|_| ArtifactError::BadShape {
                name: bias_name.clone(),
                shape: bias.dims().to_vec(),
                expected: "[out]".to_string(),
            })?;
            if bias_dim != out_dim {
                return Err(ArtifactError::BadShape {
                    name: bias_name,
                    shape: bias.dims().to_vec(),
                    expected: format!("[{out_dim}]"),
                });
            }

            if let Some(expected) = prev_out {
                if in_dim != expected {
                    return Err(ArtifactError::BrokenChain {
                        index,
                        expected,
                        actual: in_dim,
                    });
                }
            } else {
                input_dim = Some(in_dim);
            }
            prev_out = Some(out_dim);

            let weight =
                weight
                    .to_dtype(DType::F32)
                    .map_err(|source| ArtifactError::Convert {
                        name: weight_name,
                        source,
                    })?;
            let bias = bias
                .to_dtype(DType::F32)
                .map_err(|source| ArtifactError::Convert {
                    name: format!("layers.{index}.bias"),
                    source,
                })?;
            layers.push(Linear::new(weight, Some(bias)));
        }

        let (Some(input_dim), Some(final_out)) = (input_dim, prev_out) else {
            return Err(ArtifactError::Empty);
        };
        if final_out != 1 {
            return Err(ArtifactError::MultiOutput { outputs: final_out });
        }

        Ok(MlpRegressor {
            layers,
            input_dim,
            device,
        })
    }

    /// Number of features the model expects per request.
    pub fn input_dimension(&self) -> usize {
        self.input_dim
    }

    /// Run the forward pass on a single feature vector.
    ///
    /// Length validation happens at the HTTP boundary; any failure surfacing
    /// from the tensor computation itself is returned to the caller. Takes
    /// `&self`, so one shared instance serves concurrent requests without a
    /// lock.
    pub fn predict(&self, features: &[f32]) -> Result<f32, InferenceError> {
        let mut x = Tensor::from_slice(features, (1, features.len()), &self.device)?;
        for (index, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if index + 1 < self.layers.len() {
                x = x.relu()?;
            }
        }
        let prediction = x.squeeze(1)?.squeeze(0)?.to_scalar::<f32>()?;
        Ok(prediction)
    }
}
