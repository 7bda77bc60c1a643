use std::fmt;

use crate::shared::constants::{FACE_LANDMARK_68_MANIFEST, TINY_FACE_DETECTOR_MANIFEST};

/// The pretrained bundles a tracking session needs.
///
/// `ALL` is also the initialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelBundle {
    TinyFaceDetector,
    FaceLandmark68,
}

impl ModelBundle {
    pub const ALL: &[ModelBundle] = &[ModelBundle::TinyFaceDetector, ModelBundle::FaceLandmark68];

    pub fn name(self) -> &'static str {
        match self {
            ModelBundle::TinyFaceDetector => "TinyFaceDetector",
            ModelBundle::FaceLandmark68 => "FaceLandmark68Net",
        }
    }

    /// Manifest file name, relative to the model base location.
    pub fn manifest_file(self) -> &'static str {
        match self {
            ModelBundle::TinyFaceDetector => TINY_FACE_DETECTOR_MANIFEST,
            ModelBundle::FaceLandmark68 => FACE_LANDMARK_68_MANIFEST,
        }
    }

    pub fn manifest_location(self, base: &str) -> String {
        join_location(base, self.manifest_file())
    }
}

impl fmt::Display for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins a base location (URL or path) and a relative file with one `/`.
pub fn join_location(base: &str, file: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        file.trim_start_matches("./").trim_start_matches('/')
    )
}

/// Debug view of where each manifest is expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub base: String,
    pub manifests: Vec<(ModelBundle, String)>,
}

pub fn model_paths(base: &str) -> ModelPaths {
    ModelPaths {
        base: base.to_string(),
        manifests: ModelBundle::ALL
            .iter()
            .map(|&b| (b, b.manifest_location(base)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_order_detector_first() {
        assert_eq!(
            ModelBundle::ALL,
            &[ModelBundle::TinyFaceDetector, ModelBundle::FaceLandmark68]
        );
    }

    #[test]
    fn test_manifest_location_joins_with_single_slash() {
        assert_eq!(
            ModelBundle::TinyFaceDetector.manifest_location("/models/"),
            "/models/tiny_face_detector_model-weights_manifest.json"
        );
        assert_eq!(
            ModelBundle::FaceLandmark68.manifest_location("http://host/models"),
            "http://host/models/face_landmark_68_model-weights_manifest.json"
        );
    }

    #[test]
    fn test_join_location_strips_relative_prefix() {
        assert_eq!(join_location("./models", "./shard1"), "./models/shard1");
    }

    #[test]
    fn test_model_paths_lists_every_bundle() {
        let paths = model_paths("./models");
        assert_eq!(paths.base, "./models");
        assert_eq!(paths.manifests.len(), 2);
        assert_eq!(paths.manifests[0].0, ModelBundle::TinyFaceDetector);
        assert!(paths.manifests[1].1.ends_with(FACE_LANDMARK_68_MANIFEST));
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(ModelBundle::FaceLandmark68.to_string(), "FaceLandmark68Net");
    }
}
