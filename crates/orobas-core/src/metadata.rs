//! Model metadata types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::options::ContextOptions;

/// Raw metadata reported by the engine for a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineModelInfo {
    /// Number of parameters in the model.
    pub parameters: u64,
    /// Context window size the model was trained with.
    pub context_window: u32,
}

/// Metadata for a loaded model, combining engine-reported facts with the
/// handle's own configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Number of parameters in the model.
    pub parameters: u64,

    /// Context window size the model was trained with.
    pub context_window: u32,

    /// Path the model was loaded from.
    pub filepath: PathBuf,

    /// Whether contexts derived from this model default to embedding mode.
    pub embedding: bool,

    /// Options of the model's live context, if one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextOptions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_without_absent_context() {
        let metadata = ModelMetadata {
            parameters: 135_000_000,
            context_window: 2048,
            filepath: PathBuf::from("models/smollm.gguf"),
            embedding: false,
            context: None,
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("context").is_none());
        assert_eq!(json["parameters"], 135_000_000u64);
    }
}
