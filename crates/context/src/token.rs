//! Token counting.
//!
//! Counts are produced by a BPE tokenizer (`cl100k_base` by default) as a
//! stand-in for the target model's own tokenizer. When the BPE tables are
//! unavailable, or the `heuristic` encoding is configured, counting falls
//! back to characters / 4 rounded down. That fallback is an approximation
//! and [`TokenCounter::is_exact`] reports `false` while it is in use.

use std::str::FromStr;
use std::sync::Arc;

use ctxkeeper_config::TokenizerConfig;
use ctxkeeper_core::Message;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Which tokenizer backs the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    P50kBase,
    R50kBase,
    Heuristic,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cl100k_base" => Ok(Self::Cl100kBase),
            "p50k_base" => Ok(Self::P50kBase),
            "r50k_base" => Ok(Self::R50kBase),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(format!("unknown encoding '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
    per_message_overhead: usize,
}

impl TokenCounter {
    pub const DEFAULT_OVERHEAD: usize = 4;

    /// Build a counter for `encoding`. Falls back to the heuristic, with a
    /// warning, if the BPE tables cannot be loaded.
    pub fn new(encoding: Encoding, per_message_overhead: usize) -> Self {
        let loaded = match encoding {
            Encoding::Cl100kBase => Some(tiktoken_rs::cl100k_base()),
            Encoding::P50kBase => Some(tiktoken_rs::p50k_base()),
            Encoding::R50kBase => Some(tiktoken_rs::r50k_base()),
            Encoding::Heuristic => None,
        };

        let bpe = match loaded {
            Some(Ok(bpe)) => Some(Arc::new(bpe)),
            Some(Err(e)) => {
                warn!(?encoding, error = %e, "Tokenizer unavailable, counting chars/4");
                None
            }
            None => None,
        };

        Self {
            bpe,
            per_message_overhead,
        }
    }

    /// Characters / 4 counter with no BPE tables.
    pub fn heuristic(per_message_overhead: usize) -> Self {
        Self::new(Encoding::Heuristic, per_message_overhead)
    }

    /// Build from the `[tokenizer]` config section.
    pub fn from_config(config: &TokenizerConfig) -> Self {
        let encoding = config.encoding.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "Falling back to heuristic token counting");
            Encoding::Heuristic
        });
        Self::new(encoding, config.per_message_overhead)
    }

    /// `false` when counts come from the chars/4 approximation.
    pub fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }

    pub fn per_message_overhead(&self) -> usize {
        self.per_message_overhead
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.chars().count() / 4,
        }
    }

    /// Content tokens plus the per-message framing overhead. Attached
    /// images are not counted.
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        self.count_tokens(&message.content) + self.per_message_overhead
    }

    pub fn count_message_list_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message_tokens(m)).sum()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(Encoding::Cl100kBase, Self::DEFAULT_OVERHEAD)
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .field("per_message_overhead", &self.per_message_overhead)
            .finish()
    }
}
