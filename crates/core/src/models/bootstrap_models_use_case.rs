use std::thread;

use thiserror::Error;

use crate::models::domain::asset_fetcher::AssetFetcher;
use crate::models::domain::bundle_loader::{BundleLoader, LoadError};
use crate::models::domain::model_bundle::ModelBundle;
use crate::models::domain::model_registry::ModelRegistry;
use crate::models::domain::retry_policy::{RetryError, RetryPolicy};
use crate::models::domain::weights_manifest::WeightsManifest;
use crate::shared::cancellation::CancellationToken;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("failed to load {failed} model manifest(s)")]
    ManifestUnreachable {
        failed: usize,
        failures: Vec<(ModelBundle, String)>,
    },
    #[error("failed to initialize {bundle} after {attempts} attempt(s): {source}")]
    ModelInit {
        bundle: ModelBundle,
        attempts: u32,
        source: LoadError,
    },
    #[error("model loading cancelled")]
    Cancelled,
}

/// Verifies every bundle's manifest, then initializes the bundles in order.
///
/// Manifests are checked concurrently and all must succeed before any model
/// is initialized. Initialization itself is sequential and retried per
/// bundle according to the retry policy.
pub struct BootstrapModelsUseCase<'a, F, L> {
    fetcher: &'a F,
    loader: &'a L,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, F, L> BootstrapModelsUseCase<'a, F, L>
where
    F: AssetFetcher,
    L: BundleLoader,
{
    pub fn new(fetcher: &'a F, loader: &'a L) -> Self {
        Self {
            fetcher,
            loader,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn execute(
        &self,
        base: &str,
        registry: &ModelRegistry<L::Model>,
    ) -> Result<(), BootstrapError> {
        log::info!("[models] Loading models from: {base}");
        self.verify_manifests(base)?;

        for &bundle in ModelBundle::ALL {
            if registry.is_loaded(bundle) {
                log::debug!("[models] {bundle} already loaded");
                continue;
            }
            let model = self.initialize(bundle, base)?;
            registry.mark_loaded(bundle, model);
            log::info!("[models] {bundle} loaded successfully");
        }

        log::info!("[models] All models loaded successfully");
        Ok(())
    }

    /// Fetches every manifest in parallel and validates it as JSON.
    fn verify_manifests(&self, base: &str) -> Result<(), BootstrapError> {
        let results: Vec<(ModelBundle, Result<usize, String>)> = thread::scope(|scope| {
            let handles: Vec<_> = ModelBundle::ALL
                .iter()
                .map(|&bundle| {
                    let location = bundle.manifest_location(base);
                    (
                        bundle,
                        scope.spawn(move || self.check_manifest(&location)),
                    )
                })
                .collect();
            handles
                .into_iter()
                .map(|(bundle, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err("manifest check panicked".to_string()));
                    (bundle, result)
                })
                .collect()
        });

        let mut failures = Vec::new();
        for (bundle, result) in results {
            match result {
                Ok(len) => log::info!("[models] {bundle} manifest ok ({len} bytes)"),
                Err(reason) => {
                    log::error!("[models] {bundle} manifest failed: {reason}");
                    failures.push((bundle, reason));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BootstrapError::ManifestUnreachable {
                failed: failures.len(),
                failures,
            })
        }
    }

    fn check_manifest(&self, location: &str) -> Result<usize, String> {
        let bytes = self.fetcher.fetch(location).map_err(|e| e.to_string())?;
        WeightsManifest::parse(&bytes).map_err(|e| e.to_string())?;
        Ok(bytes.len())
    }

    fn initialize(&self, bundle: ModelBundle, base: &str) -> Result<L::Model, BootstrapError> {
        self.retry
            .run(&self.cancel, |attempt| {
                log::debug!(
                    "[models] {bundle}: attempt {attempt}/{}",
                    self.retry.max_attempts
                );
                self.loader.load(bundle, base)
            })
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, last } => {
                    log::error!("[models] {bundle} failed after {attempts} attempt(s): {last}");
                    BootstrapError::ModelInit {
                        bundle,
                        attempts,
                        source: last,
                    }
                }
                RetryError::Cancelled => BootstrapError::Cancelled,
            })
    }
}
