use super::model_bundle::ModelBundle;

pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Initializes one model bundle from its base location.
///
/// Implementations are expected to read the bundle's manifest and shards
/// relative to `base` and return a ready-to-run model.
pub trait BundleLoader: Send + Sync {
    type Model: Send + Sync;

    fn load(&self, bundle: ModelBundle, base: &str) -> Result<Self::Model, LoadError>;
}
