//! # Orobas
//!
//! *"The Prince gives true answers"*
//!
//! Orobas is a lifecycle and configuration façade over a native
//! text-generation engine. The engine itself — tokenizer, forward pass,
//! sampling loop, weights-file parsing — lives behind the [`EngineAdapter`]
//! binding contract; this crate owns what sits above it:
//!
//! - **Model handles**: `Created → Loaded → Destroyed` lifecycle,
//!   tokenize/detokenize, metadata, context factory
//! - **Context handles**: embedding vs. generation mode fixed at creation,
//!   encode/generate, safe teardown
//! - **Cascading options**: call > context > model > built-in defaults,
//!   resolved by a pure function
//!
//! ## Example
//!
//! ```
//! use orobas::{CallOptions, MockEngine, ModelHandle, ModelOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> orobas::Result<()> {
//!     let engine = MockEngine::new()
//!         .with_model("models/smollm/SmolLM-135M-Instruct.Q8_0.gguf")
//!         .into_shared();
//!
//!     let mut model = ModelHandle::open(
//!         engine,
//!         "models/smollm/SmolLM-135M-Instruct.Q8_0.gguf",
//!         ModelOptions::default(),
//!     )
//!     .await?;
//!
//!     let result = model
//!         .generate(
//!             "The quick brown fox",
//!             &CallOptions::default().with_temperature(0.8).with_max_tokens(5),
//!         )
//!         .await?;
//!     assert!(!result.is_empty());
//!
//!     model.destroy().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod context;
pub mod mock;
pub mod model;

pub use adapter::{ContextRef, EngineAdapter, ModelRef};
pub use context::ContextHandle;
pub use mock::MockEngine;
pub use model::ModelHandle;

// Re-exports from orobas-core
pub use orobas_core::{
    resolve, CallOptions, ContextMode, ContextOptions, ContextParams, ContextState,
    EffectiveOptions, EngineModelInfo, Error, HandleKind, ModelMetadata, ModelOptions, ModelState,
    Result, TokenId,
};
