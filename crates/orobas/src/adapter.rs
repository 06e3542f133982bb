//! The engine adapter binding contract.
//!
//! This is the only boundary the façade depends on. The native engine (model
//! file parsing, tokenizer, forward pass, sampling loop) lives behind this
//! trait; the façade treats it as an opaque, fallible, asynchronous service
//! and issues at most one outstanding request per handle at a time.

use std::path::Path;

use async_trait::async_trait;
use orobas_core::{
    ContextParams, EffectiveOptions, EngineModelInfo, ModelOptions, Result, TokenId,
};

/// Opaque reference to an engine-side model resource.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ModelRef(pub u64);

/// Opaque reference to an engine-side context resource.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ContextRef(pub u64);

/// Binding contract for the native text-generation engine.
///
/// All operations are asynchronous and may fail; failures propagate to the
/// caller as-is, wrapped with handle/operation context by the façade. Model
/// files are opaque byte blobs identified only by filesystem path.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Allocates an engine-side model resource for the given file path.
    async fn create_model(&self, filepath: &Path, options: &ModelOptions) -> Result<ModelRef>;

    /// Populates a model resource from its weights file.
    ///
    /// Fails with a diagnostic containing `Failed to load model` when the
    /// file is missing or invalid.
    async fn load_model(&self, model: ModelRef, filepath: &Path) -> Result<()>;

    /// Releases an engine-side model resource.
    async fn destroy_model(&self, model: ModelRef) -> Result<()>;

    /// Returns the engine-reported metadata for a loaded model.
    async fn model_info(&self, model: ModelRef) -> Result<EngineModelInfo>;

    /// Converts text into token ids.
    async fn tokenize(
        &self,
        model: ModelRef,
        text: &str,
        options: &EffectiveOptions,
    ) -> Result<Vec<TokenId>>;

    /// Converts token ids back into text.
    async fn detokenize(
        &self,
        model: ModelRef,
        tokens: &[TokenId],
        options: &EffectiveOptions,
    ) -> Result<String>;

    /// Allocates an engine-side context sized by the resolved parameters.
    async fn create_context(&self, model: ModelRef, params: &ContextParams) -> Result<ContextRef>;

    /// Releases an engine-side context resource.
    async fn destroy_context(&self, context: ContextRef) -> Result<()>;

    /// Encodes text into one embedding vector per token.
    ///
    /// The context must have been allocated with `embedding: true`.
    async fn encode(
        &self,
        context: ContextRef,
        text: &str,
        options: &EffectiveOptions,
    ) -> Result<Vec<Vec<f32>>>;

    /// Generates text from a prompt.
    ///
    /// The context must have been allocated with `embedding: false`.
    async fn generate(
        &self,
        context: ContextRef,
        prompt: &str,
        options: &EffectiveOptions,
    ) -> Result<String>;
}
