pub mod asset_fetcher;
pub mod bundle_loader;
pub mod model_bundle;
pub mod model_registry;
pub mod retry_policy;
pub mod weights_manifest;
