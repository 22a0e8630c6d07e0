use parking_lot::RwLock;
use std::sync::Arc;
use tastevec_core::{Error, Result, VectorModel};
use tracing::info;

/// Lifecycle of the shared model
#[derive(Debug, Clone, Default)]
pub enum ModelState {
    /// No fit has succeeded yet; every transform is rejected
    #[default]
    Unfitted,
    Fitted(Arc<VectorModel>),
}

/// Holds the active model and swaps it atomically on refit.
///
/// Readers take a cheap `Arc` clone and keep using that snapshot for the
/// whole request, so a concurrent refit never changes the model under them.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    state: RwLock<ModelState>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in `Fitted` with a model restored from disk
    pub fn with_model(model: VectorModel) -> Self {
        Self {
            state: RwLock::new(ModelState::Fitted(Arc::new(model))),
        }
    }

    pub fn state(&self) -> ModelState {
        self.state.read().clone()
    }

    pub fn is_fitted(&self) -> bool {
        matches!(*self.state.read(), ModelState::Fitted(_))
    }

    /// The active model, or [`Error::ModelNotFitted`]
    pub fn active(&self) -> Result<Arc<VectorModel>> {
        match &*self.state.read() {
            ModelState::Fitted(model) => Ok(model.clone()),
            ModelState::Unfitted => Err(Error::ModelNotFitted),
        }
    }

    /// Version of the active model; 0 while unfitted
    pub fn version(&self) -> u64 {
        match &*self.state.read() {
            ModelState::Fitted(model) => model.version(),
            ModelState::Unfitted => 0,
        }
    }

    /// Version the next installed model will carry
    pub fn next_version(&self) -> u64 {
        self.version() + 1
    }

    /// Replace the active model. The model must already carry its version.
    pub fn install(&self, model: VectorModel) -> Arc<VectorModel> {
        let model = Arc::new(model);
        let previous = std::mem::replace(&mut *self.state.write(), ModelState::Fitted(model.clone()));
        if let ModelState::Fitted(old) = previous {
            info!(from = old.version(), to = model.version(), "model swapped");
        } else {
            info!(version = model.version(), "first model installed");
        }
        model
    }
}
