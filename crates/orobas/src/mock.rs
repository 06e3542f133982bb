//! Deterministic in-process engine adapter.
//!
//! `MockEngine` stands in for the native engine in tests and examples, the
//! same way the reference CPU backend stands in for accelerated backends. It
//! keeps a virtual model catalog, tokenizes at the byte level so
//! detokenization is an exact inverse, and generates a fixed word cycle.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use orobas_core::{
    ContextParams, EffectiveOptions, EngineModelInfo, Error, ModelOptions, Result, TokenId,
};
use parking_lot::Mutex;

use crate::adapter::{ContextRef, EngineAdapter, ModelRef};

/// Beginning-of-sequence token id.
pub const BOS_TOKEN: TokenId = TokenId(1);

/// End-of-sequence token id.
pub const EOS_TOKEN: TokenId = TokenId(2);

/// Byte tokens start above the special-token id space.
const BYTE_OFFSET: u32 = 256;

/// Dimensionality of mock embeddings.
const EMBEDDING_DIM: u32 = 8;

const CONTINUATION: [&str; 5] = ["jumps", "over", "the", "lazy", "dog"];

#[derive(Default)]
struct MockState {
    next_id: u64,
    models: HashMap<u64, MockModel>,
    contexts: HashMap<u64, MockContext>,
}

struct MockModel {
    loaded: bool,
}

struct MockContext {
    embedding: bool,
}

/// In-process engine adapter with deterministic behavior.
pub struct MockEngine {
    fail_model_allocations: bool,
    fail_context_allocations: bool,
    catalog: HashSet<PathBuf>,
    state: Mutex<MockState>,
}

impl MockEngine {
    /// Creates an engine with an empty model catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fail_model_allocations: false,
            fail_context_allocations: false,
            catalog: HashSet::new(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Creates an engine that refuses every resource allocation.
    #[must_use]
    pub fn failing_allocations() -> Self {
        Self {
            fail_model_allocations: true,
            fail_context_allocations: true,
            ..Self::new()
        }
    }

    /// Creates an engine that allocates models but refuses contexts.
    #[must_use]
    pub fn failing_context_allocations() -> Self {
        Self {
            fail_context_allocations: true,
            ..Self::new()
        }
    }

    /// Registers a virtual model file; loading any other path fails.
    #[must_use]
    pub fn with_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog.insert(path.into());
        self
    }

    /// Creates a shareable reference to this engine.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn alloc(&self, state: &mut MockState) -> u64 {
        state.next_id += 1;
        state.next_id
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineAdapter for MockEngine {
    async fn create_model(&self, filepath: &Path, _options: &ModelOptions) -> Result<ModelRef> {
        if self.fail_model_allocations {
            return Err(Error::engine_init(format!(
                "cannot allocate model for {}",
                filepath.display()
            )));
        }

        let mut state = self.state.lock();
        let id = self.alloc(&mut state);
        state.models.insert(id, MockModel { loaded: false });
        Ok(ModelRef(id))
    }

    async fn load_model(&self, model: ModelRef, filepath: &Path) -> Result<()> {
        if !self.catalog.contains(filepath) {
            return Err(Error::model_load(format!(
                "no such file: {}",
                filepath.display()
            )));
        }

        let mut state = self.state.lock();
        match state.models.get_mut(&model.0) {
            Some(entry) => {
                entry.loaded = true;
                Ok(())
            }
            None => Err(Error::engine("load_model", "unknown model handle")),
        }
    }

    async fn destroy_model(&self, model: ModelRef) -> Result<()> {
        self.state.lock().models.remove(&model.0);
        Ok(())
    }

    async fn model_info(&self, model: ModelRef) -> Result<EngineModelInfo> {
        let state = self.state.lock();
        match state.models.get(&model.0) {
            Some(entry) if entry.loaded => Ok(EngineModelInfo {
                parameters: 135_000_000,
                context_window: 2048,
            }),
            Some(_) => Err(Error::engine("model_info", "model not loaded")),
            None => Err(Error::engine("model_info", "unknown model handle")),
        }
    }

    async fn tokenize(
        &self,
        model: ModelRef,
        text: &str,
        options: &EffectiveOptions,
    ) -> Result<Vec<TokenId>> {
        let state = self.state.lock();
        if !state.models.contains_key(&model.0) {
            return Err(Error::engine("tokenize", "unknown model handle"));
        }

        let mut tokens = Vec::with_capacity(text.len() + 1);
        if options.add_special {
            tokens.push(BOS_TOKEN);
        }
        tokens.extend(text.bytes().map(|b| TokenId(BYTE_OFFSET + u32::from(b))));
        Ok(tokens)
    }

    async fn detokenize(
        &self,
        model: ModelRef,
        tokens: &[TokenId],
        options: &EffectiveOptions,
    ) -> Result<String> {
        let state = self.state.lock();
        if !state.models.contains_key(&model.0) {
            return Err(Error::engine("detokenize", "unknown model handle"));
        }

        let mut bytes = Vec::with_capacity(tokens.len());
        let mut rendered = String::new();
        for token in tokens {
            if token.0 >= BYTE_OFFSET {
                bytes.push((token.0 - BYTE_OFFSET) as u8);
                continue;
            }
            // Special token: rendered only when unparsing is requested.
            if options.unparse_special && !options.remove_special {
                rendered.push_str(&flush(&mut bytes)?);
                rendered.push_str(match *token {
                    BOS_TOKEN => "<s>",
                    EOS_TOKEN => "</s>",
                    _ => "<unk>",
                });
            }
        }
        rendered.push_str(&flush(&mut bytes)?);
        Ok(rendered)
    }

    async fn create_context(&self, model: ModelRef, params: &ContextParams) -> Result<ContextRef> {
        if self.fail_context_allocations {
            return Err(Error::engine_init("Failed to create context"));
        }

        let mut state = self.state.lock();
        match state.models.get(&model.0) {
            Some(entry) if entry.loaded => {}
            Some(_) => return Err(Error::engine("create_context", "model not loaded")),
            None => return Err(Error::engine("create_context", "unknown model handle")),
        }

        let id = self.alloc(&mut state);
        state.contexts.insert(
            id,
            MockContext {
                embedding: params.embedding,
            },
        );
        Ok(ContextRef(id))
    }

    async fn destroy_context(&self, context: ContextRef) -> Result<()> {
        self.state.lock().contexts.remove(&context.0);
        Ok(())
    }

    async fn encode(
        &self,
        context: ContextRef,
        text: &str,
        options: &EffectiveOptions,
    ) -> Result<Vec<Vec<f32>>> {
        {
            let state = self.state.lock();
            match state.contexts.get(&context.0) {
                Some(entry) if entry.embedding => {}
                Some(_) => {
                    return Err(Error::engine("encode", "context not configured for embeddings"))
                }
                None => return Err(Error::engine("encode", "unknown context handle")),
            }
        }

        let mut tokens = Vec::new();
        if options.add_special {
            tokens.push(BOS_TOKEN);
        }
        tokens.extend(text.bytes().map(|b| TokenId(BYTE_OFFSET + u32::from(b))));

        Ok(tokens
            .iter()
            .map(|token| {
                (0..EMBEDDING_DIM)
                    .map(|i| ((token.0 + i) % 97) as f32 / 97.0)
                    .collect()
            })
            .collect())
    }

    async fn generate(
        &self,
        context: ContextRef,
        _prompt: &str,
        options: &EffectiveOptions,
    ) -> Result<String> {
        {
            let state = self.state.lock();
            match state.contexts.get(&context.0) {
                Some(entry) if !entry.embedding => {}
                Some(_) => {
                    return Err(Error::engine("generate", "context not configured for generation"))
                }
                None => return Err(Error::engine("generate", "unknown context handle")),
            }
        }

        let mut output = String::new();
        for i in 0..options.max_tokens {
            output.push(' ');
            output.push_str(CONTINUATION[(i as usize) % CONTINUATION.len()]);
        }
        Ok(output)
    }
}

fn flush(bytes: &mut Vec<u8>) -> Result<String> {
    let text = String::from_utf8(std::mem::take(bytes))
        .map_err(|err| Error::engine("detokenize", err.to_string()))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_PATH: &str = "models/smollm/SmolLM-135M-Instruct.Q8_0.gguf";

    async fn loaded(engine: &MockEngine) -> ModelRef {
        let model = engine
            .create_model(Path::new(MODEL_PATH), &ModelOptions::default())
            .await
            .unwrap();
        engine.load_model(model, Path::new(MODEL_PATH)).await.unwrap();
        model
    }

    #[tokio::test]
    async fn byte_tokenizer_round_trips() {
        let engine = MockEngine::new().with_model(MODEL_PATH);
        let model = loaded(&engine).await;

        let options = EffectiveOptions::default();
        let tokens = engine.tokenize(model, "Hello", &options).await.unwrap();
        assert_eq!(tokens.len(), 5);

        let text = engine.detokenize(model, &tokens, &options).await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn add_special_prepends_bos() {
        let engine = MockEngine::new().with_model(MODEL_PATH);
        let model = loaded(&engine).await;

        let options = EffectiveOptions {
            add_special: true,
            ..EffectiveOptions::default()
        };
        let tokens = engine.tokenize(model, "x", &options).await.unwrap();
        assert_eq!(tokens[0], BOS_TOKEN);
        assert_eq!(tokens.len(), 2);

        // Specials are silent unless unparsing is requested.
        let text = engine
            .detokenize(model, &tokens, &EffectiveOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "x");

        let unparsed = engine
            .detokenize(
                model,
                &tokens,
                &EffectiveOptions {
                    unparse_special: true,
                    ..EffectiveOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unparsed, "<s>x");
    }

    #[tokio::test]
    async fn generation_follows_max_tokens() {
        let engine = MockEngine::new().with_model(MODEL_PATH);
        let model = loaded(&engine).await;
        let context = engine
            .create_context(
                model,
                &ContextParams {
                    embedding: false,
                    context_size: 2048,
                    batch_size: 512,
                },
            )
            .await
            .unwrap();

        let options = EffectiveOptions {
            max_tokens: 5,
            ..EffectiveOptions::default()
        };
        let output = engine
            .generate(context, "The quick brown fox", &options)
            .await
            .unwrap();
        assert_eq!(output, " jumps over the lazy dog");
    }

    #[tokio::test]
    async fn failing_allocations_refuse_resources() {
        let engine = MockEngine::failing_allocations();
        let err = engine
            .create_model(Path::new(MODEL_PATH), &ModelOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineInit { .. }));
    }

    #[tokio::test]
    async fn failing_context_allocations_still_load_models() {
        let engine = MockEngine::failing_context_allocations().with_model(MODEL_PATH);
        let model = loaded(&engine).await;

        let err = engine
            .create_context(
                model,
                &ContextParams {
                    embedding: false,
                    context_size: 2048,
                    batch_size: 512,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineInit { .. }));
    }
}
