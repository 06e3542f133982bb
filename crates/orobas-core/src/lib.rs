//! # Orobas Core
//!
//! Core types for the Orobas façade over a native text-generation engine.
//!
//! This crate provides the foundational abstractions used across the Orobas
//! workspace:
//! - Unified error taxonomy for lifecycle and engine failures
//! - Cascading option layers and the pure resolver that flattens them
//! - Model metadata types
//! - Handle lifecycle states

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod metadata;
pub mod options;
pub mod types;

pub use error::{Error, HandleKind, Result};
pub use metadata::{EngineModelInfo, ModelMetadata};
pub use options::{
    resolve, CallOptions, ContextOptions, ContextParams, EffectiveOptions, ModelOptions,
};
pub use types::{ContextMode, ContextState, ModelState, TokenId};
