use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use super::model_bundle::ModelBundle;

/// Record of which bundles a tracking session has initialized.
///
/// Each session owns its registry. Entries are write-once: a bundle stays
/// loaded for the life of the registry and a second `mark_loaded` keeps the
/// first model. A poisoned lock is recovered; entries are never left
/// half-written.
pub struct ModelRegistry<M> {
    models: RwLock<HashMap<ModelBundle, Arc<M>>>,
}

impl<M> Default for ModelRegistry<M> {
    fn default() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }
}

impl<M> ModelRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ModelBundle, Arc<M>>> {
        self.models.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loaded(&self, bundle: ModelBundle) -> bool {
        self.read().contains_key(&bundle)
    }

    pub fn all_loaded(&self) -> bool {
        ModelBundle::ALL.iter().all(|&b| self.is_loaded(b))
    }

    pub fn get(&self, bundle: ModelBundle) -> Option<Arc<M>> {
        self.read().get(&bundle).cloned()
    }

    /// Records `model` for `bundle` and returns the registered instance.
    pub fn mark_loaded(&self, bundle: ModelBundle, model: M) -> Arc<M> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        models
            .entry(bundle)
            .or_insert_with(|| Arc::new(model))
            .clone()
    }

    pub fn loaded(&self) -> Vec<ModelBundle> {
        ModelBundle::ALL
            .iter()
            .copied()
            .filter(|&b| self.is_loaded(b))
            .collect()
    }
}
