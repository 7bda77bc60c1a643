use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("invalid weights manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("weights manifest lists no shard files")]
    NoShards,
    #[error("weight {name} has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },
    #[error("shard data ends before weight {name} ({needed} bytes needed, {available} left)")]
    Truncated {
        name: String,
        needed: usize,
        available: usize,
    },
}

/// Affine quantization of a stored weight: `value = q * scale + min`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Quantization {
    pub dtype: String,
    #[serde(default)]
    pub scale: f32,
    #[serde(default)]
    pub min: f32,
}

/// Name, shape and storage type of one tensor in the shard data.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
    #[serde(default)]
    pub quantization: Option<Quantization>,
}

impl WeightSpec {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    fn storage_dtype(&self) -> &str {
        self.quantization
            .as_ref()
            .map(|q| q.dtype.as_str())
            .unwrap_or(&self.dtype)
    }

    /// Reads this weight from the front of `data` as f32 values and
    /// returns them with the remaining bytes.
    fn read<'a>(&self, data: &'a [u8]) -> Result<(Vec<f32>, &'a [u8]), ManifestError> {
        let width = match self.storage_dtype() {
            "uint8" => 1,
            "uint16" => 2,
            "float32" | "int32" => 4,
            other => {
                return Err(ManifestError::UnsupportedDtype {
                    name: self.name.clone(),
                    dtype: other.to_string(),
                })
            }
        };
        let needed = self.element_count() * width;
        if data.len() < needed {
            return Err(ManifestError::Truncated {
                name: self.name.clone(),
                needed,
                available: data.len(),
            });
        }
        let (raw, rest) = data.split_at(needed);
        let values = match (self.storage_dtype(), &self.quantization) {
            ("uint8", Some(q)) => raw.iter().map(|&v| v as f32 * q.scale + q.min).collect(),
            ("uint16", Some(q)) => raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32 * q.scale + q.min)
                .collect(),
            ("int32", _) => raw
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32)
                .collect(),
            ("float32", _) => raw
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            (dtype, _) => {
                return Err(ManifestError::UnsupportedDtype {
                    name: self.name.clone(),
                    dtype: format!("{dtype} without quantization parameters"),
                })
            }
        };
        Ok((values, rest))
    }
}

/// One group of a weights manifest.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    #[serde(default)]
    pub weights: Vec<WeightSpec>,
}

/// A decoded f32 tensor in its manifest shape.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

pub type NamedWeights = HashMap<String, WeightTensor>;

/// A bundle's JSON descriptor: an array of weight groups whose `paths`
/// name the binary shard files, in load order.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightsManifest {
    groups: Vec<WeightGroup>,
}

impl WeightsManifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let groups: Vec<WeightGroup> = serde_json::from_slice(bytes)?;
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[WeightGroup] {
        &self.groups
    }

    /// Every shard path across all groups, in order.
    pub fn shard_paths(&self) -> Result<Vec<&str>, ManifestError> {
        let paths: Vec<&str> = self
            .groups
            .iter()
            .flat_map(|g| g.paths.iter().map(String::as_str))
            .collect();
        if paths.is_empty() {
            return Err(ManifestError::NoShards);
        }
        Ok(paths)
    }

    /// Whether the shards hold raw named tensors rather than a serialized
    /// model. Manifests without weight specs point at model files.
    pub fn describes_tensors(&self) -> bool {
        self.groups.iter().any(|g| !g.weights.is_empty())
    }

    /// Splits the concatenated shard bytes into named tensors, in the order
    /// the specs are listed.
    pub fn decode(&self, data: &[u8]) -> Result<NamedWeights, ManifestError> {
        let mut rest = data;
        let mut weights = NamedWeights::new();
        for spec in self.groups.iter().flat_map(|g| g.weights.iter()) {
            let (values, tail) = spec.read(rest)?;
            rest = tail;
            weights.insert(
                spec.name.clone(),
                WeightTensor {
                    shape: spec.shape.clone(),
                    values,
                },
            );
        }
        if !rest.is_empty() {
            log::warn!("[models] {} trailing shard bytes ignored", rest.len());
        }
        Ok(weights)
    }
}
