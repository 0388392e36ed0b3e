//! Context budget planning.
//!
//! Given a conversation and a target model, decides which messages are sent
//! to the model. While the history fits within `trigger_fraction` of the
//! model's context window it is returned as is. Otherwise the oldest
//! messages are folded into a persisted summary and the result is one
//! system message carrying that summary followed by the recent tail.
//!
//! The tail is the longest suffix whose cost stays within
//! `compression_ratio` of the budget, widened to at least
//! `min_recent_messages`. A stored summary that already covers the
//! candidates is reused without calling the model. When the tail holds
//! every message there is nothing to fold and the summary reads
//! [`EMPTY_SUMMARY`].

use std::sync::Arc;

use ctxkeeper_config::{AppConfig, ContextConfig, ModelRegistry};
use ctxkeeper_core::{
    ConversationId, ConversationStore, ConversationSummary, Error, Message, Result, SummaryStore,
};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::images::strip_history;
use crate::summarizer::Summarizer;
use crate::token::TokenCounter;

pub const SUMMARY_PREFIX: &str = "Previous conversation summary:\n";

/// Summary text used when the recent tail already holds every message.
pub const EMPTY_SUMMARY: &str = "No previous conversation.";

/// Tunables of the planner, usually taken from `[context]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSettings {
    pub trigger_fraction: f64,
    pub compression_ratio: f64,
    pub min_recent_messages: usize,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for BudgetSettings {
    fn from(config: &ContextConfig) -> Self {
        Self {
            trigger_fraction: config.trigger_fraction,
            compression_ratio: config.compression_ratio,
            min_recent_messages: config.min_recent_messages,
        }
    }
}

/// How the planned context was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The history is returned unchanged (images stripped).
    Fits,
    /// The oldest `summarized` messages were replaced by a summary.
    Compacted {
        summarized: usize,
        reused_summary: bool,
    },
}

#[derive(Debug, Clone)]
pub struct PlannedContext {
    pub messages: Vec<Message>,
    pub outcome: PlanOutcome,
    /// Cost of `messages` under the planner's counter
    pub token_count: usize,
    /// The trigger budget the plan was made against
    pub budget: usize,
}

impl PlannedContext {
    pub fn was_compacted(&self) -> bool {
        matches!(self.outcome, PlanOutcome::Compacted { .. })
    }
}

/// Token accounting of a conversation, without compacting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetReport {
    pub message_count: usize,
    pub total_tokens: usize,
    pub context_window: usize,
    pub budget: usize,
}

impl BudgetReport {
    pub fn needs_compaction(&self) -> bool {
        self.total_tokens > self.budget
    }
}

pub struct ContextBudgetPlanner {
    conversations: Arc<dyn ConversationStore>,
    summaries: Arc<dyn SummaryStore>,
    summarizer: Summarizer,
    counter: TokenCounter,
    registry: ModelRegistry,
    settings: BudgetSettings,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl ContextBudgetPlanner {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        summaries: Arc<dyn SummaryStore>,
        summarizer: Summarizer,
        counter: TokenCounter,
        registry: ModelRegistry,
    ) -> Self {
        Self {
            conversations,
            summaries,
            summarizer,
            counter,
            registry,
            settings: BudgetSettings::default(),
            locks: DashMap::new(),
        }
    }

    /// Wire a planner from the loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        conversations: Arc<dyn ConversationStore>,
        summaries: Arc<dyn SummaryStore>,
        summarizer: Summarizer,
    ) -> Self {
        Self::new(
            conversations,
            summaries,
            summarizer.with_temperature(config.context.summary_temperature),
            TokenCounter::from_config(&config.tokenizer),
            config.model_registry(),
        )
        .with_settings(BudgetSettings::from(&config.context))
    }

    pub fn with_settings(mut self, settings: BudgetSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Trigger budget for `model`: `trigger_fraction` of its window, rounded down.
    pub fn budget_for(&self, model: &str) -> usize {
        let window = self.registry.context_window_for(model);
        (window as f64 * self.settings.trigger_fraction) as usize
    }

    /// Count the conversation's history against `model`'s budget.
    pub async fn inspect(&self, conversation: &ConversationId, model: &str) -> Result<BudgetReport> {
        let history = self.load_stripped(conversation).await?;
        Ok(BudgetReport {
            message_count: history.len(),
            total_tokens: self.counter.count_message_list_tokens(&history),
            context_window: self.registry.context_window_for(model),
            budget: self.budget_for(model),
        })
    }

    /// `true` when the next [`get_context`](Self::get_context) would compact.
    pub async fn needs_compaction(&self, conversation: &ConversationId, model: &str) -> Result<bool> {
        Ok(self.inspect(conversation, model).await?.needs_compaction())
    }

    /// Produce the message list to send to `model` for `conversation`.
    ///
    /// May call the summarizer and persist one summary. A summarization
    /// failure is returned as [`Error::GenerationUnavailable`] with nothing
    /// persisted.
    pub async fn get_context(
        &self,
        conversation: &ConversationId,
        model: &str,
    ) -> Result<PlannedContext> {
        let history = self.load_stripped(conversation).await?;
        let budget = self.budget_for(model);
        let total = self.counter.count_message_list_tokens(&history);

        if total <= budget {
            debug!(
                conversation = %conversation,
                total, budget,
                "History fits within budget"
            );
            return Ok(PlannedContext {
                messages: history,
                outcome: PlanOutcome::Fits,
                token_count: total,
                budget,
            });
        }

        let keep = self.recent_tail_len(&history, budget);
        let split = history.len() - keep;
        let (candidates, recent) = history.split_at(split);

        if candidates.is_empty() {
            warn!(
                conversation = %conversation,
                total, budget,
                messages = history.len(),
                "History over budget but every message is in the recent tail"
            );
        }

        let lock = self.locks.entry(conversation.clone()).or_default().clone();
        let resolved = {
            let _guard = lock.lock().await;
            self.resolve_summary(conversation, model, candidates).await
        };
        drop(lock);
        self.locks.remove_if(conversation, |_, held| Arc::strong_count(held) == 1);
        let (summary_text, reused_summary) = resolved?;

        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(Message::system(format!("{SUMMARY_PREFIX}{summary_text}")));
        messages.extend_from_slice(recent);
        let token_count = self.counter.count_message_list_tokens(&messages);

        info!(
            conversation = %conversation,
            model,
            summarized = candidates.len(),
            kept = recent.len(),
            reused_summary,
            before = total,
            after = token_count,
            "Context compacted"
        );

        Ok(PlannedContext {
            messages,
            outcome: PlanOutcome::Compacted {
                summarized: candidates.len(),
                reused_summary,
            },
            token_count,
            budget,
        })
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    async fn load_stripped(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        if self.conversations.get_conversation(conversation).await?.is_none() {
            return Err(Error::conversation_not_found(conversation));
        }
        let history = self.conversations.load_history(conversation).await?;
        Ok(strip_history(&history))
    }

    /// Number of trailing messages kept verbatim.
    fn recent_tail_len(&self, history: &[Message], budget: usize) -> usize {
        let target = (budget as f64 * self.settings.compression_ratio) as usize;

        let mut spent = 0;
        let mut keep = 0;
        for message in history.iter().rev() {
            let cost = self.counter.count_message_tokens(message);
            if spent + cost > target {
                break;
            }
            spent += cost;
            keep += 1;
        }

        keep.max(self.settings.min_recent_messages).min(history.len())
    }

    /// Summary text covering `candidates`, and whether it was reused.
    /// Caller holds the conversation's lock.
    async fn resolve_summary(
        &self,
        conversation: &ConversationId,
        model: &str,
        candidates: &[Message],
    ) -> Result<(String, bool)> {
        if let Some(existing) = self.summaries.latest_summary(conversation).await?
            && existing.messages_summarized >= candidates.len()
        {
            debug!(
                conversation = %conversation,
                covers = existing.messages_summarized,
                candidates = candidates.len(),
                "Reusing stored summary"
            );
            return Ok((existing.summary_text, true));
        }

        if candidates.is_empty() {
            return Ok((EMPTY_SUMMARY.to_string(), false));
        }

        let text = self.summarizer.summarize(model, candidates).await?;
        let summary = ConversationSummary::new(conversation.clone(), text, candidates.len());

        if self.summaries.save_summary(&summary).await? {
            return Ok((summary.summary_text, false));
        }

        // Another writer stored a wider summary first.
        match self.summaries.latest_summary(conversation).await? {
            Some(winner) => {
                debug!(
                    conversation = %conversation,
                    covers = winner.messages_summarized,
                    "Summary save rejected, using stored summary"
                );
                Ok((winner.summary_text, true))
            }
            None => Ok((summary.summary_text, false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use ctxkeeper_config::ModelInfo;
    use ctxkeeper_core::{Conversation, Role, StoreError};
    use ctxkeeper_store::InMemoryStore;
    use proptest::prelude::*;

    const TINY: &str = "tiny:latest";

    fn tiny_registry(window: usize) -> ModelRegistry {
        let mut models = BTreeMap::new();
        models.insert(
            TINY.to_string(),
            ModelInfo {
                name: "Tiny".into(),
                context_window: window,
                capabilities: vec!["chat".into()],
                recommendation: "Tests".into(),
            },
        );
        ModelRegistry::new(models, 4096)
    }

    fn planner_with(
        store: &InMemoryStore,
        provider: Arc<ScriptedProvider>,
        window: usize,
    ) -> ContextBudgetPlanner {
        ContextBudgetPlanner::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Summarizer::new(provider),
            TokenCounter::heuristic(4),
            tiny_registry(window),
        )
    }

    async fn conversation_with(store: &InMemoryStore, contents: &[&str]) -> ConversationId {
        let conv = Conversation::new();
        store.create_conversation(&conv).await.unwrap();
        for (i, content) in contents.iter().enumerate() {
            let msg = if i % 2 == 0 {
                Message::user(*content)
            } else {
                Message::assistant(*content)
            };
            store.append_message(&conv.id, &msg).await.unwrap();
        }
        conv.id
    }

    fn words(n: usize) -> String {
        // "word " is 5 chars; heuristic cost is n * 5 / 4
        "word ".repeat(n)
    }

    #[tokio::test]
    async fn empty_history_fits() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("unused"));
        let planner = planner_with(&store, provider.clone(), 100);
        let conv = conversation_with(&store, &[]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert!(planned.messages.is_empty());
        assert_eq!(planned.outcome, PlanOutcome::Fits);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn short_history_is_returned_unchanged() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("unused"));
        let planner = planner_with(&store, provider.clone(), 8192);
        let conv = conversation_with(&store, &["Hello", "Hi there", "How are you?"]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        let history = store.load_history(&conv).await.unwrap();
        assert_eq!(planned.messages, history);
        assert!(!planned.was_compacted());
        assert_eq!(planned.budget, 6144);
        assert_eq!(provider.call_count(), 0);
        assert!(store.latest_summary(&conv).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let store = InMemoryStore::new();
        let planner = planner_with(&store, Arc::new(ScriptedProvider::replying("x")), 100);
        let err = planner
            .get_context(&ConversationId::from("missing"), TINY)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "Conversation", .. }));
    }

    #[tokio::test]
    async fn images_are_stripped_before_counting() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("unused"));
        let planner = planner_with(&store, provider.clone(), 100);
        let image = format!("![x](data:image/png;base64,{})", "A".repeat(4000));
        let conv = conversation_with(&store, &[&format!("see {image}")]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert_eq!(planned.outcome, PlanOutcome::Fits);
        assert_eq!(planned.messages[0].content, "see [Image]");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn over_budget_history_is_compacted() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("They discussed words."));
        // budget 75, tail target 22
        let planner = planner_with(&store, provider.clone(), 100);
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();

        assert_eq!(
            planned.outcome,
            PlanOutcome::Compacted {
                summarized: 3,
                reused_summary: false
            }
        );
        assert_eq!(planned.messages.len(), 3);
        assert_eq!(planned.messages[0].role, Role::System);
        assert_eq!(
            planned.messages[0].content,
            "Previous conversation summary:\nThey discussed words."
        );
        assert_eq!(planned.messages[1].content, "ok");
        assert_eq!(planned.messages[2].content, "fine");
        assert_eq!(provider.call_count(), 1);

        let stored = store.latest_summary(&conv).await.unwrap().unwrap();
        assert_eq!(stored.messages_summarized, 3);
        assert_eq!(stored.summary_text, "They discussed words.");
    }

    #[tokio::test]
    async fn second_call_reuses_summary() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("Summary one."));
        let planner = planner_with(&store, provider.clone(), 100);
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        let first = planner.get_context(&conv, TINY).await.unwrap();
        let second = planner.get_context(&conv, TINY).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(first.messages[0].content, second.messages[0].content);
        assert_eq!(
            second.outcome,
            PlanOutcome::Compacted {
                summarized: 3,
                reused_summary: true
            }
        );
    }

    #[tokio::test]
    async fn min_recent_floor_keeps_two_messages() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("s"));
        let planner = planner_with(&store, provider.clone(), 100);
        let long = words(20);
        // every message is individually above the tail target
        let conv = conversation_with(&store, &[&long, &long, &long, &long]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert_eq!(
            planned.outcome,
            PlanOutcome::Compacted {
                summarized: 2,
                reused_summary: false
            }
        );
        assert_eq!(planned.messages.len(), 3);
    }

    #[tokio::test]
    async fn over_budget_floor_compacts_with_empty_summary() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("s"));
        let planner = planner_with(&store, provider.clone(), 100);
        let huge = words(80);
        let conv = conversation_with(&store, &[&huge, &huge]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert_eq!(
            planned.outcome,
            PlanOutcome::Compacted {
                summarized: 0,
                reused_summary: false
            }
        );
        assert!(planned.was_compacted());
        assert_eq!(planned.messages.len(), 3);
        assert_eq!(planned.messages[0].role, Role::System);
        assert_eq!(
            planned.messages[0].content,
            "Previous conversation summary:\nNo previous conversation."
        );
        assert_eq!(planned.messages[1].content, huge);
        assert_eq!(planned.messages[2].content, huge);
        assert!(planned.token_count > planned.budget);
        assert_eq!(provider.call_count(), 0);
        assert!(store.latest_summary(&conv).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn over_budget_floor_reuses_stored_summary() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("s"));
        let planner = planner_with(&store, provider.clone(), 100);
        let huge = words(80);
        let conv = conversation_with(&store, &[&huge, &huge]).await;
        store
            .save_summary(&ConversationSummary::new(conv.clone(), "Earlier talk.", 4))
            .await
            .unwrap();

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert_eq!(
            planned.outcome,
            PlanOutcome::Compacted {
                summarized: 0,
                reused_summary: true
            }
        );
        assert_eq!(
            planned.messages[0].content,
            "Previous conversation summary:\nEarlier talk."
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn conversation_locks_are_released_after_compaction() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("Done."));
        let planner = planner_with(&store, provider, 100);
        let long = words(20);
        for _ in 0..3 {
            let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;
            planner.get_context(&conv, TINY).await.unwrap();
        }
        assert_eq!(planner.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn conversation_lock_is_released_after_failure() {
        let store = InMemoryStore::new();
        let planner = planner_with(&store, Arc::new(ScriptedProvider::failing()), 100);
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        assert!(planner.get_context(&conv, TINY).await.is_err());
        assert_eq!(planner.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn summarizer_failure_persists_nothing() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::failing());
        let planner = planner_with(&store, provider.clone(), 100);
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        let err = planner.get_context(&conv, TINY).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
        assert!(store.latest_summary(&conv).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inspect_reports_budget() {
        let store = InMemoryStore::new();
        let planner = planner_with(&store, Arc::new(ScriptedProvider::replying("s")), 100);
        let conv = conversation_with(&store, &["test", "test"]).await;

        let report = planner.inspect(&conv, TINY).await.unwrap();
        assert_eq!(report.message_count, 2);
        assert_eq!(report.total_tokens, 10);
        assert_eq!(report.context_window, 100);
        assert_eq!(report.budget, 75);
        assert!(!planner.needs_compaction(&conv, TINY).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_model_uses_default_window() {
        let store = InMemoryStore::new();
        let planner = planner_with(&store, Arc::new(ScriptedProvider::replying("s")), 100);
        assert_eq!(planner.budget_for("mystery:7b"), 3072);
    }

    /// Summary store that loses every save to a wider concurrent summary.
    struct RacingSummaries {
        inner: InMemoryStore,
    }

    #[async_trait::async_trait]
    impl SummaryStore for RacingSummaries {
        async fn latest_summary(
            &self,
            id: &ConversationId,
        ) -> std::result::Result<Option<ConversationSummary>, StoreError> {
            self.inner.latest_summary(id).await
        }

        async fn save_summary(
            &self,
            summary: &ConversationSummary,
        ) -> std::result::Result<bool, StoreError> {
            let wider = ConversationSummary::new(
                summary.conversation_id.clone(),
                "Written elsewhere.",
                summary.messages_summarized + 1,
            );
            self.inner.save_summary(&wider).await?;
            self.inner.save_summary(summary).await
        }
    }

    #[tokio::test]
    async fn rejected_save_uses_winning_summary() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("Mine."));
        let planner = ContextBudgetPlanner::new(
            Arc::new(store.clone()),
            Arc::new(RacingSummaries {
                inner: store.clone(),
            }),
            Summarizer::new(provider),
            TokenCounter::heuristic(4),
            tiny_registry(100),
        );
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        let planned = planner.get_context(&conv, TINY).await.unwrap();
        assert_eq!(
            planned.messages[0].content,
            "Previous conversation summary:\nWritten elsewhere."
        );
        assert_eq!(
            store.latest_summary(&conv).await.unwrap().unwrap().messages_summarized,
            4
        );
    }

    #[tokio::test]
    async fn concurrent_calls_generate_once() {
        let store = InMemoryStore::new();
        let provider = Arc::new(ScriptedProvider::replying("Shared."));
        let planner = Arc::new(planner_with(&store, provider.clone(), 100));
        let long = words(20);
        let conv = conversation_with(&store, &[&long, &long, &long, "ok", "fine"]).await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let planner = planner.clone();
                let conv = conv.clone();
                tokio::spawn(async move { planner.get_context(&conv, TINY).await })
            })
            .collect();

        for handle in handles {
            let planned = handle.await.unwrap().unwrap();
            assert_eq!(planned.messages[0].content, "Previous conversation summary:\nShared.");
        }
        assert_eq!(provider.call_count(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn tail_respects_target_or_floor(lengths in prop::collection::vec(0usize..40, 1..12)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                let provider = Arc::new(ScriptedProvider::replying("s"));
                let planner = planner_with(&store, provider, 100);
                let contents: Vec<String> = lengths.iter().map(|n| words(*n)).collect();
                let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
                let conv = conversation_with(&store, &refs).await;
                let history = store.load_history(&conv).await.unwrap();
                let counter = TokenCounter::heuristic(4);

                let planned = planner.get_context(&conv, TINY).await.unwrap();
                prop_assert_eq!(
                    planned.token_count,
                    counter.count_message_list_tokens(&planned.messages)
                );
                match planned.outcome {
                    PlanOutcome::Fits => {
                        prop_assert_eq!(&planned.messages, &history);
                        prop_assert!(planned.token_count <= planned.budget);
                    }
                    PlanOutcome::Compacted { summarized, .. } => {
                        let tail = &planned.messages[1..];
                        prop_assert_eq!(summarized + tail.len(), history.len());
                        prop_assert_eq!(tail, &history[summarized..]);
                        let tail_cost = counter.count_message_list_tokens(tail);
                        prop_assert!(tail.len() == 2 || tail_cost <= 22);
                        prop_assert!(planned.token_count <= planned.budget || tail.len() == 2);
                    }
                }
                Ok(())
            })?;
        }
    }
}
