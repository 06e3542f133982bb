//! Context handle lifecycle and operations.

use std::sync::{Arc, Weak};

use orobas_core::{
    resolve, CallOptions, ContextMode, ContextOptions, ContextState, EffectiveOptions, Error,
    HandleKind, ModelOptions, ModelState, Result,
};

use crate::adapter::{ContextRef, EngineAdapter};
use crate::model::{ModelHandle, ModelShared};

/// Handle owning the lifecycle of one execution context derived from a model.
///
/// The mode (embedding or generation) is fixed at creation and never changes;
/// `encode` and `generate` enforce it. The handle holds a non-owning
/// reference back to its parent model and fails once the model is destroyed.
pub struct ContextHandle {
    adapter: Arc<dyn EngineAdapter>,
    raw: ContextRef,
    state: ContextState,
    mode: ContextMode,
    options: ContextOptions,
    model_options: ModelOptions,
    model: Weak<ModelShared>,
}

impl ContextHandle {
    /// Allocates an engine-side context for a loaded model.
    ///
    /// The supplied options are merged over the model's context defaults;
    /// the engine context is sized by the resolved `context_size` and
    /// `batch_size`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotLoaded`]/[`Error::HandleDestroyed`] if the
    /// model is not loaded, and [`Error::EngineInit`] if the engine cannot
    /// allocate the context.
    pub async fn create(model: &ModelHandle, options: ContextOptions) -> Result<Self> {
        model.require_loaded("create context")?;

        let mut merged = options.merged_over(&model.options().context);
        // `existing` is a factory directive, not part of the context's
        // configuration.
        merged.existing = false;

        let params = merged.params(model.options().embedding);
        let raw = model.adapter().create_context(model.raw(), &params).await?;

        let mode = ContextMode::from_embedding(params.embedding);
        tracing::debug!(
            %mode,
            context_size = params.context_size,
            batch_size = params.batch_size,
            "Created context"
        );

        Ok(Self {
            adapter: Arc::clone(model.adapter()),
            raw,
            state: ContextState::Created,
            mode,
            options: merged,
            model_options: model.options().clone(),
            model: Arc::downgrade(model.shared()),
        })
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Returns the mode fixed at creation.
    #[must_use]
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// Returns the resolved context-level options.
    #[must_use]
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Encodes text into one embedding vector per token.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Mode`] unless this is an embedding context, or on
    /// lifecycle violations and engine failures.
    pub async fn encode(&self, text: &str, options: &CallOptions) -> Result<Vec<Vec<f32>>> {
        self.guard("encode")?;
        if !self.mode.is_embedding() {
            return Err(Error::mode("embedding context required"));
        }

        let effective = resolve(
            &EffectiveOptions::default(),
            &self.model_options,
            Some(&self.options),
            options,
        );
        self.adapter.encode(self.raw, text, &effective).await
    }

    /// Generates text from a prompt, returning the engine output verbatim.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Mode`] on an embedding context, or on lifecycle
    /// violations and engine failures.
    pub async fn generate(&self, prompt: &str, options: &CallOptions) -> Result<String> {
        self.guard("generate")?;
        if self.mode.is_embedding() {
            return Err(Error::mode("generation context required"));
        }

        let effective = resolve(
            &EffectiveOptions::default(),
            &self.model_options,
            Some(&self.options),
            options,
        );

        tracing::debug!(
            temperature = effective.temperature,
            max_tokens = effective.max_tokens,
            "Starting generation"
        );
        self.adapter.generate(self.raw, prompt, &effective).await
    }

    /// Destroys the handle, releasing the engine-side context resource.
    ///
    /// Idempotent: destroying an already-destroyed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates engine failures during release.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.state == ContextState::Destroyed {
            return Ok(());
        }

        self.adapter.destroy_context(self.raw).await?;
        self.state = ContextState::Destroyed;

        tracing::debug!(mode = %self.mode, "Context destroyed");
        Ok(())
    }

    /// Checks this handle and the parent model before an operation.
    fn guard(&self, operation: &'static str) -> Result<()> {
        if self.state == ContextState::Destroyed {
            return Err(Error::destroyed(HandleKind::Context, operation));
        }

        match self.model.upgrade() {
            Some(shared) => match shared.state() {
                ModelState::Loaded => Ok(()),
                ModelState::Created => Err(Error::not_loaded(operation)),
                ModelState::Destroyed => Err(Error::destroyed(HandleKind::Model, operation)),
            },
            None => Err(Error::destroyed(HandleKind::Model, operation)),
        }
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        // Engine release is async and cannot run here. A context whose
        // parent model was already destroyed has nothing left to release.
        let model_gone = self
            .model
            .upgrade()
            .is_none_or(|shared| shared.state() == ModelState::Destroyed);

        if self.state != ContextState::Destroyed && !model_gone {
            tracing::warn!(
                mode = %self.mode,
                "Context handle dropped without destroy; engine resource leaked"
            );
        }
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}
