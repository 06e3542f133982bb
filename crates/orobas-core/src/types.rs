//! Common types used across the Orobas façade.

use serde::{Deserialize, Serialize};

/// An integer identifier produced by the engine's tokenizer for a unit of
/// text.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TokenId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TokenId> for u32 {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

/// Lifecycle state of a model handle.
///
/// `Destroyed` is terminal; every operation except `destroy` fails once it is
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Engine-side resource allocated, weights not yet loaded.
    Created,
    /// Weights loaded; tokenize/detokenize/context creation are valid.
    Loaded,
    /// Engine-side resource released.
    Destroyed,
}

/// Lifecycle state of a context handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// Engine-side context allocated and usable.
    Created,
    /// Engine-side context released.
    Destroyed,
}

/// Operating mode of a context, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Autoregressive text generation.
    Generation,
    /// Token embedding extraction.
    Embedding,
}

impl ContextMode {
    /// Creates a mode from the `embedding` option flag.
    #[must_use]
    pub fn from_embedding(embedding: bool) -> Self {
        if embedding {
            Self::Embedding
        } else {
            Self::Generation
        }
    }

    /// Returns `true` for embedding mode.
    #[must_use]
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding)
    }
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_embedding_flag() {
        assert_eq!(ContextMode::from_embedding(true), ContextMode::Embedding);
        assert_eq!(ContextMode::from_embedding(false), ContextMode::Generation);
        assert!(ContextMode::Embedding.is_embedding());
        assert!(!ContextMode::Generation.is_embedding());
    }

    #[test]
    fn token_id_round_trips_through_u32() {
        let id = TokenId::from(42u32);
        assert_eq!(u32::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }
}
