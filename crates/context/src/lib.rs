//! Context management for ctxkeeper.
//!
//! - [`token`]: token counting with a BPE tokenizer or a chars/4 fallback
//! - [`images`]: inline base64 image stripping
//! - [`summarizer`]: summary generation through the chat provider
//! - [`planner`]: fits a conversation into a model's context window

pub mod images;
pub mod planner;
pub mod summarizer;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use images::{IMAGE_PLACEHOLDER, strip_history, strip_inline_images};
pub use planner::{
    BudgetReport, BudgetSettings, ContextBudgetPlanner, EMPTY_SUMMARY, PlanOutcome,
    PlannedContext, SUMMARY_PREFIX,
};
pub use summarizer::Summarizer;
pub use token::{Encoding, TokenCounter};
