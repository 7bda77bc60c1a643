use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::models::domain::asset_fetcher::AssetFetcher;
use crate::models::domain::bundle_loader::{BundleLoader, LoadError};
use crate::models::domain::model_bundle::{join_location, ModelBundle};
use crate::models::domain::weights_manifest::WeightsManifest;

use super::execution_provider::{preferred_execution_providers, preferred_provider_label};
use super::tfjs_converter;

/// Memory layout of a model's image input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[N, C, H, W]`
    Nchw,
    /// `[N, H, W, C]`
    Nhwc,
}

impl TensorLayout {
    /// Infers the layout from an input shape. Dynamic dims are `-1`.
    pub fn from_shape(shape: &[i64]) -> Self {
        if shape.len() == 4 && shape[1] == 3 && shape[3] != 3 {
            TensorLayout::Nchw
        } else {
            TensorLayout::Nhwc
        }
    }

    /// Square spatial input size declared by the model, if static.
    pub fn spatial_size(self, shape: &[i64]) -> Option<u32> {
        if shape.len() != 4 {
            return None;
        }
        let dim = match self {
            TensorLayout::Nchw => shape[2],
            TensorLayout::Nhwc => shape[1],
        };
        (dim > 0).then_some(dim as u32)
    }
}

#[derive(Error, Debug)]
#[error("{0} session lock poisoned")]
pub struct SessionPoisoned(pub ModelBundle);

/// An initialized bundle: one ONNX Runtime session plus its input layout.
///
/// `ort` sessions need `&mut` to run, so the session sits behind a mutex and
/// the model itself is shared through the registry.
pub struct OnnxModel {
    bundle: ModelBundle,
    session: Mutex<ort::session::Session>,
    input_shape: Vec<i64>,
    layout: TensorLayout,
}

impl OnnxModel {
    pub fn bundle(&self) -> ModelBundle {
        self.bundle
    }

    pub fn input_shape(&self) -> &[i64] {
        &self.input_shape
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn input_size(&self) -> Option<u32> {
        self.layout.spatial_size(&self.input_shape)
    }

    pub fn session(&self) -> Result<MutexGuard<'_, ort::session::Session>, SessionPoisoned> {
        self.session.lock().map_err(|_| SessionPoisoned(self.bundle))
    }
}

/// Loads a bundle by reading its manifest and concatenating the listed
/// shards in order. Manifests that describe named tensors are rebuilt into
/// an ONNX graph; otherwise the shard bytes are committed as a model file.
pub struct OnnxBundleLoader<F> {
    fetcher: Arc<F>,
}

impl<F: AssetFetcher> OnnxBundleLoader<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    fn read_manifest(&self, bundle: ModelBundle, base: &str) -> Result<WeightsManifest, LoadError> {
        let manifest_bytes = self.fetcher.fetch(&bundle.manifest_location(base))?;
        Ok(WeightsManifest::parse(&manifest_bytes)?)
    }

    fn read_shards(
        &self,
        bundle: ModelBundle,
        base: &str,
        manifest: &WeightsManifest,
    ) -> Result<Vec<u8>, LoadError> {
        let mut weights = Vec::new();
        for shard in manifest.shard_paths()? {
            let bytes = self.fetcher.fetch(&join_location(base, shard))?;
            log::debug!("[models] {bundle}: shard {shard} ({} bytes)", bytes.len());
            weights.extend_from_slice(&bytes);
        }
        Ok(weights)
    }

    /// Serialized ONNX model for `bundle`, converting tensor weight sets.
    pub fn model_bytes(&self, bundle: ModelBundle, base: &str) -> Result<Vec<u8>, LoadError> {
        let manifest = self.read_manifest(bundle, base)?;
        let data = self.read_shards(bundle, base, &manifest)?;
        if !manifest.describes_tensors() {
            return Ok(data);
        }
        let weights = manifest.decode(&data)?;
        log::debug!("[models] {bundle}: converting {} tensors", weights.len());
        Ok(tfjs_converter::convert(bundle, &weights)?)
    }
}

impl<F: AssetFetcher> BundleLoader for OnnxBundleLoader<F> {
    type Model = OnnxModel;

    fn load(&self, bundle: ModelBundle, base: &str) -> Result<OnnxModel, LoadError> {
        let model = self.model_bytes(bundle, base)?;
        let builder = ort::session::Session::builder().map_err(|e| format!("{bundle}: {e}"))?;
        let builder = builder
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| format!("{bundle}: {e}"))?;
        let session = builder
            .commit_from_memory(&model)
            .map_err(|e| format!("{bundle}: {e}"))?;

        let input_shape: Vec<i64> = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    Some(shape.iter().copied().collect())
                } else {
                    None
                }
            })
            .ok_or_else(|| format!("{bundle} model has no tensor input"))?;
        let layout = TensorLayout::from_shape(&input_shape);

        log::info!(
            "[models] {bundle}: session ready ({} bytes, input {input_shape:?}, {layout:?}, {})",
            model.len(),
            preferred_provider_label()
        );

        Ok(OnnxModel {
            bundle,
            session: Mutex::new(session),
            input_shape,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::asset_fetcher::FetchError;
    use crate::models::domain::weights_manifest::NamedWeights;
    use crate::models::infrastructure::asset_downloader::default_catalog;
    use crate::models::infrastructure::tfjs_converter::tests::{
        face_landmark_68_weights, tiny_face_detector_weights,
    };
    use ndarray::Array4;
    use rstest::rstest;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl AssetFetcher for MapFetcher {
        fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
            self.0.get(location).cloned().ok_or(FetchError::Status {
                location: location.to_string(),
                status: 404,
            })
        }
    }

    #[rstest]
    #[case(&[1, 3, 416, 416], TensorLayout::Nchw, Some(416))]
    #[case(&[1, 416, 416, 3], TensorLayout::Nhwc, Some(416))]
    #[case(&[-1, -1, -1, 3], TensorLayout::Nhwc, None)]
    #[case(&[1, 3, -1, -1], TensorLayout::Nchw, None)]
    #[case(&[1, 112], TensorLayout::Nhwc, None)]
    fn test_layout_from_shape(
        #[case] shape: &[i64],
        #[case] layout: TensorLayout,
        #[case] size: Option<u32>,
    ) {
        assert_eq!(TensorLayout::from_shape(shape), layout);
        assert_eq!(layout.spatial_size(shape), size);
    }

    #[test]
    fn test_model_file_shards_are_concatenated_in_order() {
        let base = "/srv/models";
        let manifest = br#"[{"paths":["tiny-shard1","tiny-shard2"],"weights":[]}]"#.to_vec();
        let files = HashMap::from([
            (ModelBundle::TinyFaceDetector.manifest_location(base), manifest),
            (format!("{base}/tiny-shard1"), vec![1, 2]),
            (format!("{base}/tiny-shard2"), vec![3]),
        ]);
        let loader = OnnxBundleLoader::new(Arc::new(MapFetcher(files)));
        let bytes = loader
            .model_bytes(ModelBundle::TinyFaceDetector, base)
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_shard_is_error() {
        let base = "/srv/models";
        let files = HashMap::from([(
            ModelBundle::FaceLandmark68.manifest_location(base),
            br#"[{"paths":["lm-shard1"]}]"#.to_vec(),
        )]);
        let loader = OnnxBundleLoader::new(Arc::new(MapFetcher(files)));
        let err = loader
            .model_bytes(ModelBundle::FaceLandmark68, base)
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    /// Manifest and single shard in the CDN's format: every tensor stored
    /// as uint8 with per-tensor `scale` and `min`.
    fn quantized_bundle(weights: &NamedWeights, shard: &str) -> (Vec<u8>, Vec<u8>) {
        let mut names: Vec<&String> = weights.keys().collect();
        names.sort();
        let mut specs = Vec::new();
        let mut data = Vec::new();
        for name in names {
            let tensor = &weights[name];
            let min = tensor.values.iter().copied().fold(f32::INFINITY, f32::min);
            let max = tensor.values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let scale = ((max - min) / 255.0).max(f32::EPSILON);
            data.extend(
                tensor
                    .values
                    .iter()
                    .map(|v| ((v - min) / scale).round() as u8),
            );
            specs.push(serde_json::json!({
                "name": name,
                "shape": tensor.shape,
                "dtype": "float32",
                "quantization": {"dtype": "uint8", "scale": scale, "min": min},
            }));
        }
        let manifest = serde_json::json!([{ "weights": specs, "paths": [shard] }]);
        (serde_json::to_vec(&manifest).unwrap(), data)
    }

    /// Serves `weights` under the file names the default catalog downloads.
    fn loader_for(bundle: ModelBundle, weights: &NamedWeights, base: &str) -> OnnxBundleLoader<MapFetcher> {
        let stem = bundle.manifest_file().trim_end_matches("-weights_manifest.json");
        let shard_name = default_catalog()
            .into_iter()
            .map(|e| e.name)
            .find(|name| name.starts_with(stem) && name.contains("-shard"))
            .unwrap();
        let (manifest, shard) = quantized_bundle(weights, &shard_name);
        let files = HashMap::from([
            (bundle.manifest_location(base), manifest),
            (join_location(base, &shard_name), shard),
        ]);
        OnnxBundleLoader::new(Arc::new(MapFetcher(files)))
    }

    fn output_shape(model: &OnnxModel, input: Array4<f32>) -> Vec<usize> {
        let mut session = model.session().unwrap();
        let value = ort::value::Tensor::from_array(input).unwrap();
        let outputs = session.run(ort::inputs![value]).unwrap();
        let tensor = outputs[0].try_extract_array::<f32>().unwrap();
        tensor.shape().to_vec()
    }

    #[test]
    fn test_quantized_tensor_manifest_is_converted_before_commit() {
        let base = "/srv/models";
        let loader = loader_for(ModelBundle::TinyFaceDetector, &tiny_face_detector_weights(), base);
        let bytes = loader
            .model_bytes(ModelBundle::TinyFaceDetector, base)
            .unwrap();
        // ModelProto starts with ir_version, not raw uint8 weights.
        assert_eq!(bytes[0], 0x08);
    }

    #[test]
    fn test_tiny_face_detector_weights_load_into_session() {
        let base = "/srv/models";
        let loader = loader_for(ModelBundle::TinyFaceDetector, &tiny_face_detector_weights(), base);
        let model = loader.load(ModelBundle::TinyFaceDetector, base).unwrap();
        assert_eq!(model.layout(), TensorLayout::Nchw);
        assert_eq!(model.input_size(), None);
        assert_eq!(
            output_shape(&model, Array4::zeros((1, 3, 416, 416))),
            vec![1, 25, 13, 13]
        );
    }

    #[test]
    fn test_face_landmark_68_weights_load_into_session() {
        let base = "/srv/models";
        let loader = loader_for(ModelBundle::FaceLandmark68, &face_landmark_68_weights(), base);
        let model = loader.load(ModelBundle::FaceLandmark68, base).unwrap();
        assert_eq!(model.input_shape(), &[1, 3, 112, 112]);
        assert_eq!(model.input_size(), Some(112));
        assert_eq!(
            output_shape(&model, Array4::zeros((1, 3, 112, 112))),
            vec![1, 136]
        );
    }

    #[test]
    fn test_truncated_tensor_shard_fails_load() {
        let base = "/srv/models";
        let (manifest, shard) = quantized_bundle(&face_landmark_68_weights(), "lm-shard1");
        let files = HashMap::from([
            (ModelBundle::FaceLandmark68.manifest_location(base), manifest),
            (format!("{base}/lm-shard1"), shard[..shard.len() / 2].to_vec()),
        ]);
        let loader = OnnxBundleLoader::new(Arc::new(MapFetcher(files)));
        let err = loader
            .model_bytes(ModelBundle::FaceLandmark68, base)
            .unwrap_err();
        assert!(err.to_string().contains("shard data ends before weight"));
    }
}
