//! Cascading option layers and the resolver that flattens them.
//!
//! Options cascade strictly one direction: call-level overrides win over
//! context-level, which win over model-level, which win over the built-in
//! defaults. Absent (`None`) values fall through to the next layer; precedence
//! is enforced by [`resolve`] rather than by incidental merge order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in default for the maximum tokens a context can hold.
pub const DEFAULT_CONTEXT_SIZE: u32 = 2048;

/// Built-in default for the maximum tokens processed in parallel.
pub const DEFAULT_BATCH_SIZE: u32 = 512;

/// Built-in default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Built-in default for the maximum number of tokens to generate.
pub const DEFAULT_MAX_TOKENS: u32 = 20;

/// Built-in default for top-k sampling.
pub const DEFAULT_TOP_K: u32 = 40;

/// Model-level options, immutable after model creation.
///
/// These form the model layer of the cascade and supply the defaults for
/// every context derived from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Whether contexts derived from this model default to embedding mode.
    pub embedding: bool,

    /// Add special tokens when tokenizing.
    pub add_special: Option<bool>,

    /// Parse special tokens in input text.
    pub parse_special: Option<bool>,

    /// Remove special tokens when detokenizing.
    pub remove_special: Option<bool>,

    /// Render special tokens back to text when detokenizing.
    pub unparse_special: Option<bool>,

    /// Defaults for contexts created from this model.
    pub context: ContextOptions,

    /// Unrecognized options, passed through to the engine unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelOptions {
    /// Creates options for an embedding model.
    #[must_use]
    pub fn embedding() -> Self {
        Self {
            embedding: true,
            ..Self::default()
        }
    }

    /// Sets the special-token flags used when tokenizing.
    #[must_use]
    pub fn with_add_special(mut self, add: bool) -> Self {
        self.add_special = Some(add);
        self
    }

    /// Sets whether special tokens are parsed in input text.
    #[must_use]
    pub fn with_parse_special(mut self, parse: bool) -> Self {
        self.parse_special = Some(parse);
        self
    }

    /// Sets the context defaults for derived contexts.
    #[must_use]
    pub fn with_context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }
}

/// Context-level options.
///
/// Supplied when creating a context; unset fields fall back to the model's
/// context defaults and then to the built-ins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Whether this context is for embeddings (`true`) or generation
    /// (`false`). Falls back to the model-level `embedding` flag.
    pub embedding: Option<bool>,

    /// Maximum tokens in the context window.
    pub context_size: Option<u32>,

    /// Maximum tokens to process in parallel.
    pub batch_size: Option<u32>,

    /// Add special tokens when tokenizing.
    pub add_special: Option<bool>,

    /// Parse special tokens in input text.
    pub parse_special: Option<bool>,

    /// Reuse the model's live context instead of creating a new one.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub existing: bool,

    /// Unrecognized options, passed through to the engine unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContextOptions {
    /// Creates options for an embedding context.
    #[must_use]
    pub fn embedding() -> Self {
        Self {
            embedding: Some(true),
            ..Self::default()
        }
    }

    /// Requests the model's existing context if one is live.
    #[must_use]
    pub fn existing() -> Self {
        Self {
            existing: true,
            ..Self::default()
        }
    }

    /// Sets the context window size.
    #[must_use]
    pub fn with_context_size(mut self, size: u32) -> Self {
        self.context_size = Some(size);
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets whether special tokens are added.
    #[must_use]
    pub fn with_add_special(mut self, add: bool) -> Self {
        self.add_special = Some(add);
        self
    }

    /// Merges these options over a defaults layer.
    ///
    /// Fields set here win; absent fields take the default layer's value.
    /// The `existing` flag is a creation directive, not a cascading option,
    /// and is never inherited.
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());

        Self {
            embedding: self.embedding.or(defaults.embedding),
            context_size: self.context_size.or(defaults.context_size),
            batch_size: self.batch_size.or(defaults.batch_size),
            add_special: self.add_special.or(defaults.add_special),
            parse_special: self.parse_special.or(defaults.parse_special),
            existing: self.existing,
            extra,
        }
    }

    /// Resolves the engine-facing sizing parameters for this context.
    #[must_use]
    pub fn params(&self, model_embedding: bool) -> ContextParams {
        ContextParams {
            embedding: self.embedding.unwrap_or(model_embedding),
            context_size: self.context_size.unwrap_or(DEFAULT_CONTEXT_SIZE),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }
}

/// Resolved sizing parameters handed to the engine when allocating a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextParams {
    /// Whether the engine context is allocated for embedding extraction.
    pub embedding: bool,
    /// Maximum tokens in the context window.
    pub context_size: u32,
    /// Maximum tokens to process in parallel.
    pub batch_size: u32,
}

/// Per-call option overrides for tokenize/detokenize/encode/generate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    /// Add special tokens when tokenizing.
    pub add_special: Option<bool>,

    /// Parse special tokens in input text.
    pub parse_special: Option<bool>,

    /// Remove special tokens when detokenizing.
    pub remove_special: Option<bool>,

    /// Render special tokens back to text when detokenizing.
    pub unparse_special: Option<bool>,

    /// Sampling temperature for generation.
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Top-k sampling cutoff for generation.
    pub top_k: Option<u32>,

    /// Unrecognized options, passed through to the engine unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallOptions {
    /// Sets whether special tokens are added.
    #[must_use]
    pub fn with_add_special(mut self, add: bool) -> Self {
        self.add_special = Some(add);
        self
    }

    /// Sets whether special tokens are parsed.
    #[must_use]
    pub fn with_parse_special(mut self, parse: bool) -> Self {
        self.parse_special = Some(parse);
        self
    }

    /// Sets whether special tokens are removed on detokenize.
    #[must_use]
    pub fn with_remove_special(mut self, remove: bool) -> Self {
        self.remove_special = Some(remove);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum number of tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the top-k sampling cutoff.
    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// The fully resolved configuration for a single call.
///
/// The `Default` impl is the built-in defaults layer of the cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveOptions {
    /// Add special tokens when tokenizing.
    pub add_special: bool,

    /// Parse special tokens in input text.
    pub parse_special: bool,

    /// Remove special tokens when detokenizing.
    pub remove_special: bool,

    /// Render special tokens back to text when detokenizing.
    pub unparse_special: bool,

    /// Sampling temperature for generation.
    pub temperature: f32,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,

    /// Top-k sampling cutoff for generation.
    pub top_k: u32,

    /// Unrecognized options, passed through to the engine unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        Self {
            add_special: false,
            parse_special: false,
            remove_special: false,
            unparse_special: false,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_k: DEFAULT_TOP_K,
            extra: Map::new(),
        }
    }
}

/// Resolves the effective options for a single call.
///
/// Pure function, no side effects. For each option the most specific
/// non-absent value wins, in the fixed order call > context > model >
/// built-in defaults. Unknown keys carried in the `extra` maps are merged
/// with the same precedence and passed through unchanged.
#[must_use]
pub fn resolve(
    defaults: &EffectiveOptions,
    model: &ModelOptions,
    context: Option<&ContextOptions>,
    call: &CallOptions,
) -> EffectiveOptions {
    let ctx_add = context.and_then(|c| c.add_special);
    let ctx_parse = context.and_then(|c| c.parse_special);

    let mut extra = defaults.extra.clone();
    extra.extend(model.extra.clone());
    if let Some(context) = context {
        extra.extend(context.extra.clone());
    }
    extra.extend(call.extra.clone());

    EffectiveOptions {
        add_special: call
            .add_special
            .or(ctx_add)
            .or(model.add_special)
            .unwrap_or(defaults.add_special),
        parse_special: call
            .parse_special
            .or(ctx_parse)
            .or(model.parse_special)
            .unwrap_or(defaults.parse_special),
        remove_special: call
            .remove_special
            .or(model.remove_special)
            .unwrap_or(defaults.remove_special),
        unparse_special: call
            .unparse_special
            .or(model.unparse_special)
            .unwrap_or(defaults.unparse_special),
        temperature: call.temperature.unwrap_or(defaults.temperature),
        max_tokens: call.max_tokens.unwrap_or(defaults.max_tokens),
        top_k: call.top_k.unwrap_or(defaults.top_k),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_apply_when_all_layers_absent() {
        let effective = resolve(
            &EffectiveOptions::default(),
            &ModelOptions::default(),
            None,
            &CallOptions::default(),
        );

        assert!(!effective.add_special);
        assert!(!effective.parse_special);
        assert!(!effective.remove_special);
        assert!(!effective.unparse_special);
        assert_eq!(effective.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(effective.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(effective.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn call_layer_wins_over_context_and_model() {
        let model = ModelOptions::default().with_add_special(true);
        let context = ContextOptions::default().with_add_special(true);
        let call = CallOptions::default().with_add_special(false);

        let effective = resolve(&EffectiveOptions::default(), &model, Some(&context), &call);
        assert!(!effective.add_special);
    }

    #[test]
    fn context_layer_wins_over_model() {
        let model = ModelOptions::default().with_parse_special(false);
        let context = ContextOptions {
            parse_special: Some(true),
            ..ContextOptions::default()
        };

        let effective = resolve(
            &EffectiveOptions::default(),
            &model,
            Some(&context),
            &CallOptions::default(),
        );
        assert!(effective.parse_special);
    }

    #[test]
    fn absent_call_value_falls_through_to_model() {
        let model = ModelOptions {
            remove_special: Some(true),
            ..ModelOptions::default()
        };

        let effective = resolve(
            &EffectiveOptions::default(),
            &model,
            None,
            &CallOptions::default(),
        );
        assert!(effective.remove_special);
    }

    #[test]
    fn generation_knobs_resolve_from_call_layer() {
        let call = CallOptions::default()
            .with_temperature(0.9)
            .with_max_tokens(7);

        let effective = resolve(
            &EffectiveOptions::default(),
            &ModelOptions::default(),
            None,
            &call,
        );
        assert_eq!(effective.temperature, 0.9);
        assert_eq!(effective.max_tokens, 7);
        assert_eq!(effective.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn unknown_keys_pass_through_with_call_precedence() {
        let mut model = ModelOptions::default();
        model
            .extra
            .insert("mirostat".to_string(), Value::from(1));
        model.extra.insert("seed".to_string(), Value::from(7));

        let mut call = CallOptions::default();
        call.extra.insert("seed".to_string(), Value::from(42));

        let effective = resolve(&EffectiveOptions::default(), &model, None, &call);
        assert_eq!(effective.extra["mirostat"], Value::from(1));
        assert_eq!(effective.extra["seed"], Value::from(42));
    }

    #[test]
    fn context_merge_prefers_supplied_values() {
        let defaults = ContextOptions::default()
            .with_context_size(4096)
            .with_add_special(true);
        let supplied = ContextOptions::default().with_context_size(1024);

        let merged = supplied.merged_over(&defaults);
        assert_eq!(merged.context_size, Some(1024));
        assert_eq!(merged.add_special, Some(true));
    }

    #[test]
    fn context_params_fall_back_to_builtins() {
        let params = ContextOptions::default().params(false);
        assert!(!params.embedding);
        assert_eq!(params.context_size, DEFAULT_CONTEXT_SIZE);
        assert_eq!(params.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn context_embedding_falls_back_to_model_flag() {
        let params = ContextOptions::default().params(true);
        assert!(params.embedding);

        let params = ContextOptions {
            embedding: Some(false),
            ..ContextOptions::default()
        }
        .params(true);
        assert!(!params.embedding);
    }

    #[test]
    fn existing_flag_is_not_inherited() {
        let defaults = ContextOptions::existing();
        let merged = ContextOptions::default().merged_over(&defaults);
        assert!(!merged.existing);
    }

    #[test]
    fn options_deserialize_with_unknown_keys() {
        let call: CallOptions =
            serde_json::from_str(r#"{"max_tokens": 5, "mirostat": 2}"#).unwrap();
        // Unknown keys land in `extra` rather than being rejected.
        assert_eq!(call.max_tokens, Some(5));
        assert!(call.extra.contains_key("mirostat"));
    }
}
