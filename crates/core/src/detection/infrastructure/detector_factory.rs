use std::sync::Arc;

use crate::detection::domain::detector_options::TinyFaceDetectorOptions;
use crate::detection::domain::face_detector::{FaceDetector, LandmarkDetector};
use crate::models::bootstrap_models_use_case::{BootstrapError, BootstrapModelsUseCase};
use crate::models::domain::model_bundle::ModelBundle;
use crate::models::domain::model_registry::ModelRegistry;
use crate::models::domain::retry_policy::RetryPolicy;
use crate::models::infrastructure::onnx_bundle_loader::{OnnxBundleLoader, OnnxModel};
use crate::models::infrastructure::origin_asset_fetcher::OriginAssetFetcher;
use crate::shared::cancellation::CancellationToken;

use super::onnx_landmark_net::OnnxLandmarkNet;
use super::onnx_tiny_face_detector::OnnxTinyFaceDetector;

/// Loads both bundles from `base` (URL or directory) into a fresh registry.
pub fn load_onnx_models(
    base: &str,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ModelRegistry<OnnxModel>, Box<dyn std::error::Error + Send + Sync>> {
    let fetcher = Arc::new(OriginAssetFetcher::new()?);
    let loader = OnnxBundleLoader::new(fetcher.clone());
    let registry = ModelRegistry::new();
    BootstrapModelsUseCase::new(fetcher.as_ref(), &loader)
        .with_retry(retry)
        .with_cancellation(cancel.clone())
        .execute(base, &registry)?;
    Ok(registry)
}

/// Builds the tiny face detector from a loaded registry.
pub fn create_face_detector(
    registry: &ModelRegistry<OnnxModel>,
    options: TinyFaceDetectorOptions,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model = registry
        .get(ModelBundle::TinyFaceDetector)
        .ok_or_else(|| not_loaded(ModelBundle::TinyFaceDetector))?;
    Ok(Box::new(OnnxTinyFaceDetector::new(model, options)?))
}

/// Builds the 68-point landmark net, if its bundle is loaded.
pub fn create_landmark_detector(
    registry: &ModelRegistry<OnnxModel>,
) -> Option<Box<dyn LandmarkDetector>> {
    registry
        .get(ModelBundle::FaceLandmark68)
        .map(|model| Box::new(OnnxLandmarkNet::new(model)) as Box<dyn LandmarkDetector>)
}

fn not_loaded(bundle: ModelBundle) -> String {
    format!("{bundle} model is not loaded")
}

/// True when a bootstrap failure came from a cancelled backoff.
pub fn is_cancelled(err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::Cancelled)
    )
}
