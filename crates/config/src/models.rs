//! Per-model metadata: display names and context windows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Display name
    pub name: String,

    /// Maximum prompt plus completion size, in tokens
    pub context_window: usize,

    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub recommendation: String,
}

impl ModelInfo {
    fn new(name: &str, context_window: usize, capabilities: &[&str], recommendation: &str) -> Self {
        Self {
            name: name.into(),
            context_window,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            recommendation: recommendation.into(),
        }
    }
}

pub(crate) fn default_models() -> BTreeMap<String, ModelInfo> {
    BTreeMap::from([
        (
            "llama3.2:latest".to_string(),
            ModelInfo::new("Llama 3.2", 8192, &["general", "reasoning"], "Best for General Use"),
        ),
        (
            "phi3:latest".to_string(),
            ModelInfo::new("Phi-3", 4096, &["reasoning", "general"], "Best for Reasoning"),
        ),
        (
            "gemma3:1b".to_string(),
            ModelInfo::new("Gemma 3 1B", 8192, &["coding", "general"], "Best for Coding"),
        ),
        (
            "llama2:latest".to_string(),
            ModelInfo::new("Llama 2", 4096, &["general"], "Legacy Support"),
        ),
    ])
}

/// Resolves a model identifier to its context window.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelInfo>,
    default_context_window: usize,
}

impl ModelRegistry {
    pub fn new(models: BTreeMap<String, ModelInfo>, default_context_window: usize) -> Self {
        Self {
            models,
            default_context_window,
        }
    }

    /// Context window for `model`, or the configured default when unknown.
    pub fn context_window_for(&self, model: &str) -> usize {
        match self.models.get(model) {
            Some(info) => info.context_window,
            None => {
                tracing::debug!(
                    model,
                    default = self.default_context_window,
                    "Unknown model, using default context window"
                );
                self.default_context_window
            }
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelInfo> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelInfo)> {
        self.models.iter()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(default_models(), 4096)
    }
}
