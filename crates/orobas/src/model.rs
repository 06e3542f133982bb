//! Model handle lifecycle and operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use orobas_core::{
    resolve, CallOptions, ContextOptions, ContextState, EffectiveOptions, Error, HandleKind,
    ModelMetadata, ModelOptions, ModelState, Result, TokenId,
};
use parking_lot::Mutex;

use crate::adapter::{EngineAdapter, ModelRef};
use crate::context::ContextHandle;

/// Model state cell shared with derived contexts.
///
/// Contexts hold a `Weak` reference to this so they can confirm the parent
/// model is still loaded without owning it.
pub(crate) struct ModelShared {
    state: Mutex<ModelState>,
}

impl ModelShared {
    pub(crate) fn state(&self) -> ModelState {
        *self.state.lock()
    }
}

/// Handle owning the lifecycle of one loaded model.
///
/// Identity is the model file path. The handle moves through
/// `Created → Loaded → Destroyed`; `Destroyed` is terminal. It exposes
/// tokenize/detokenize and metadata queries, and acts as the factory for
/// context handles.
pub struct ModelHandle {
    adapter: Arc<dyn EngineAdapter>,
    filepath: PathBuf,
    options: ModelOptions,
    raw: ModelRef,
    shared: Arc<ModelShared>,
    context: Option<ContextHandle>,
}

impl ModelHandle {
    /// Allocates an engine-side model resource and returns a handle in the
    /// `Created` state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineInit`] if the engine cannot allocate the
    /// resource.
    pub async fn create(
        adapter: Arc<dyn EngineAdapter>,
        filepath: impl Into<PathBuf>,
        options: ModelOptions,
    ) -> Result<Self> {
        let filepath = filepath.into();
        let raw = adapter.create_model(&filepath, &options).await?;

        tracing::debug!(filepath = %filepath.display(), "Created model handle");

        Ok(Self {
            adapter,
            filepath,
            options,
            raw,
            shared: Arc::new(ModelShared {
                state: Mutex::new(ModelState::Created),
            }),
            context: None,
        })
    }

    /// Creates a model handle and loads its weights in one step.
    ///
    /// On load failure the engine-side resource is released before the error
    /// is returned, so nothing leaks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineInit`] on allocation failure and
    /// [`Error::ModelLoad`] if the weights file is rejected.
    pub async fn open(
        adapter: Arc<dyn EngineAdapter>,
        filepath: impl Into<PathBuf>,
        options: ModelOptions,
    ) -> Result<Self> {
        let mut model = Self::create(adapter, filepath, options).await?;

        if let Err(err) = model.load().await {
            if let Err(destroy_err) = model.destroy().await {
                tracing::warn!(
                    error = %destroy_err,
                    "Failed to release model after load failure"
                );
            }
            return Err(err);
        }

        Ok(model)
    }

    /// Loads the model weights from the handle's file path.
    ///
    /// Transitions `Created → Loaded`. On failure the handle stays in
    /// `Created` and the call may be retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] with the engine diagnostic if the file
    /// is missing or invalid.
    pub async fn load(&mut self) -> Result<()> {
        let filepath = self.filepath.clone();
        self.load_from(filepath).await
    }

    /// Loads the model weights from a different file path.
    ///
    /// The handle's identity follows the new path on success; a retry after
    /// a failed [`load`](Self::load) goes through here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] with the engine diagnostic if the file
    /// is missing or invalid.
    pub async fn load_from(&mut self, filepath: impl Into<PathBuf>) -> Result<()> {
        if self.state() == ModelState::Destroyed {
            return Err(Error::destroyed(HandleKind::Model, "load"));
        }

        let filepath = filepath.into();
        self.adapter.load_model(self.raw, &filepath).await?;

        self.filepath = filepath;
        *self.shared.state.lock() = ModelState::Loaded;

        tracing::info!(filepath = %self.filepath.display(), "Model loaded");
        Ok(())
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.shared.state()
    }

    /// Returns the model file path.
    #[must_use]
    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// Returns the model-level options.
    #[must_use]
    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Returns metadata for the loaded model.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotLoaded`] before [`load`](Self::load) succeeds
    /// and [`Error::HandleDestroyed`] after [`destroy`](Self::destroy).
    pub async fn metadata(&self) -> Result<ModelMetadata> {
        self.require_loaded("metadata")?;

        let info = self.adapter.model_info(self.raw).await?;

        Ok(ModelMetadata {
            parameters: info.parameters,
            context_window: info.context_window,
            filepath: self.filepath.clone(),
            embedding: self.options.embedding,
            context: self.context.as_ref().map(|ctx| ctx.options().clone()),
        })
    }

    /// Converts text into token ids.
    ///
    /// The `add_special`/`parse_special` flags resolve through the cascade
    /// against the model's own defaults.
    ///
    /// # Errors
    ///
    /// Fails on lifecycle violations or if the engine rejects the input.
    pub async fn tokenize(&self, text: &str, options: &CallOptions) -> Result<Vec<TokenId>> {
        self.require_loaded("tokenize")?;

        let effective = resolve(&EffectiveOptions::default(), &self.options, None, options);
        self.adapter.tokenize(self.raw, text, &effective).await
    }

    /// Converts token ids back into text.
    ///
    /// The `remove_special`/`unparse_special` flags resolve through the
    /// cascade against the model's own defaults.
    ///
    /// # Errors
    ///
    /// Fails on lifecycle violations or if the engine rejects the input.
    pub async fn detokenize(&self, tokens: &[TokenId], options: &CallOptions) -> Result<String> {
        self.require_loaded("detokenize")?;

        let effective = resolve(&EffectiveOptions::default(), &self.options, None, options);
        self.adapter.detokenize(self.raw, tokens, &effective).await
    }

    /// Returns a context for this model, creating one if needed.
    ///
    /// With `options.existing` set, a live context is returned unchanged.
    /// Replacing a live context is rejected with [`Error::ContextExists`];
    /// destroy it first. A destroyed context is replaced transparently.
    ///
    /// # Errors
    ///
    /// Fails on lifecycle violations or with [`Error::EngineInit`] if the
    /// engine cannot allocate the context.
    pub async fn context(&mut self, options: ContextOptions) -> Result<&mut ContextHandle> {
        self.require_loaded("create context")?;

        match self.context.take() {
            Some(ctx) if ctx.state() == ContextState::Created => {
                if options.existing {
                    Ok(self.context.insert(ctx))
                } else {
                    self.context = Some(ctx);
                    Err(Error::ContextExists)
                }
            }
            _ => {
                let context = ContextHandle::create(self, options).await?;
                Ok(self.context.insert(context))
            }
        }
    }

    /// Generates text from a prompt using the model's context, creating a
    /// generation context from the model defaults on first use.
    ///
    /// # Errors
    ///
    /// Fails on lifecycle violations, with [`Error::Mode`] if the model's
    /// context is in embedding mode, or if the engine fails.
    pub async fn generate(&mut self, prompt: &str, options: &CallOptions) -> Result<String> {
        let context = self.context(ContextOptions::existing()).await?;
        context.generate(prompt, options).await
    }

    /// Encodes text into token embeddings using the model's context,
    /// creating one from the model defaults on first use.
    ///
    /// # Errors
    ///
    /// Fails on lifecycle violations, with [`Error::Mode`] if the model's
    /// context is in generation mode, or if the engine fails.
    pub async fn encode(&mut self, text: &str, options: &CallOptions) -> Result<Vec<Vec<f32>>> {
        let context = self.context(ContextOptions::existing()).await?;
        context.encode(text, options).await
    }

    /// Destroys the handle, releasing the engine-side context (if held) and
    /// model resources in dependency order.
    ///
    /// Idempotent: destroying an already-destroyed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates engine failures during release.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.state() == ModelState::Destroyed {
            return Ok(());
        }

        if let Some(context) = self.context.as_mut() {
            context.destroy().await?;
        }

        self.adapter.destroy_model(self.raw).await?;
        *self.shared.state.lock() = ModelState::Destroyed;

        tracing::debug!(filepath = %self.filepath.display(), "Model destroyed");
        Ok(())
    }

    pub(crate) fn require_loaded(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            ModelState::Loaded => Ok(()),
            ModelState::Created => Err(Error::not_loaded(operation)),
            ModelState::Destroyed => Err(Error::destroyed(HandleKind::Model, operation)),
        }
    }

    pub(crate) fn adapter(&self) -> &Arc<dyn EngineAdapter> {
        &self.adapter
    }

    pub(crate) fn raw(&self) -> ModelRef {
        self.raw
    }

    pub(crate) fn shared(&self) -> &Arc<ModelShared> {
        &self.shared
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        // Engine release is async and cannot run here.
        if self.state() != ModelState::Destroyed {
            tracing::warn!(
                filepath = %self.filepath.display(),
                "Model handle dropped without destroy; engine resource leaked"
            );
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("filepath", &self.filepath)
            .field("state", &self.state())
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    const MODEL_PATH: &str = "models/smollm/SmolLM-135M-Instruct.Q8_0.gguf";

    fn engine() -> Arc<MockEngine> {
        MockEngine::new().with_model(MODEL_PATH).into_shared()
    }

    #[tokio::test]
    async fn create_load_metadata() {
        let mut model = ModelHandle::open(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();

        assert_eq!(model.state(), ModelState::Loaded);

        let metadata = model.metadata().await.unwrap();
        assert!(metadata.parameters > 0);
        assert!(metadata.context_window > 0);
        assert!(!metadata.embedding);
        assert!(metadata.context.is_none());

        model.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn open_missing_file_reports_load_failure() {
        let err = ModelHandle::open(engine(), "nope", ModelOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to load model"));
    }

    #[tokio::test]
    async fn load_failure_is_retryable_with_corrected_path() {
        let mut model = ModelHandle::create(engine(), "nope", ModelOptions::default())
            .await
            .unwrap();

        assert!(model.load().await.is_err());
        assert_eq!(model.state(), ModelState::Created);

        model.load_from(MODEL_PATH).await.unwrap();
        assert_eq!(model.state(), ModelState::Loaded);
        assert_eq!(model.filepath(), Path::new(MODEL_PATH));

        model.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn operations_require_loaded_state() {
        let mut model = ModelHandle::create(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            model.metadata().await,
            Err(Error::NotLoaded { .. })
        ));
        assert!(matches!(
            model.tokenize("Hello", &CallOptions::default()).await,
            Err(Error::NotLoaded { .. })
        ));
        assert!(matches!(
            model.context(ContextOptions::default()).await,
            Err(Error::NotLoaded { .. })
        ));

        model.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn destroyed_handle_rejects_operations() {
        let mut model = ModelHandle::open(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();
        model.destroy().await.unwrap();

        assert!(matches!(
            model.tokenize("Hello", &CallOptions::default()).await,
            Err(Error::HandleDestroyed { .. })
        ));
        assert!(matches!(model.load().await, Err(Error::HandleDestroyed { .. })));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let mut model = ModelHandle::open(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();

        model.destroy().await.unwrap();
        model.destroy().await.unwrap();
        assert_eq!(model.state(), ModelState::Destroyed);
    }

    #[tokio::test]
    async fn call_override_wins_over_model_option() {
        let options = ModelOptions::default().with_add_special(true);
        let mut model = ModelHandle::open(engine(), MODEL_PATH, options).await.unwrap();

        let with_model_default = model.tokenize("hi", &CallOptions::default()).await.unwrap();
        let with_override = model
            .tokenize("hi", &CallOptions::default().with_add_special(false))
            .await
            .unwrap();

        // Model-level add_special prepends BOS; the call override strips it.
        assert_eq!(with_model_default.len(), with_override.len() + 1);

        model.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn context_reuse_and_replacement_rules() {
        let mut model = ModelHandle::open(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();

        model.context(ContextOptions::default()).await.unwrap();

        // A live context is returned unchanged when requested.
        model.context(ContextOptions::existing()).await.unwrap();

        // Replacing a live context is rejected and the context stays held.
        assert!(matches!(
            model.context(ContextOptions::default()).await,
            Err(Error::ContextExists)
        ));
        assert!(model.metadata().await.unwrap().context.is_some());

        // A destroyed context is replaced transparently.
        model
            .context(ContextOptions::existing())
            .await
            .unwrap()
            .destroy()
            .await
            .unwrap();
        model.context(ContextOptions::default()).await.unwrap();

        model.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn metadata_includes_held_context_options() {
        let mut model = ModelHandle::open(engine(), MODEL_PATH, ModelOptions::default())
            .await
            .unwrap();

        model
            .context(ContextOptions::default().with_context_size(1024))
            .await
            .unwrap();

        let metadata = model.metadata().await.unwrap();
        let context = metadata.context.unwrap();
        assert_eq!(context.context_size, Some(1024));

        model.destroy().await.unwrap();
    }
}
