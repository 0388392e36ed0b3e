//! `ctxkeeper context`: Inspect a conversation's token budget.

use ctxkeeper_context::PlanOutcome;
use ctxkeeper_core::{ConversationId, Role};

use super::{CmdResult, open_app, preview};

pub async fn run(conversation: String, model: Option<String>, compact: bool) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    let model = app.model_or_default(model);

    let report = app.planner.inspect(&id, &model).await?;
    println!("Context for {id} on {model}");
    println!("  Messages:        {}", report.message_count);
    println!("  History tokens:  {}", report.total_tokens);
    println!("  Context window:  {}", report.context_window);
    println!("  Budget:          {}", report.budget);
    println!(
        "  Needs compaction: {}",
        if report.needs_compaction() { "yes" } else { "no" }
    );

    if !compact {
        return Ok(());
    }

    let planned = app.planner.get_context(&id, &model).await?;
    match planned.outcome {
        PlanOutcome::Fits => println!("\n  Sent as is ({} tokens)", planned.token_count),
        PlanOutcome::Compacted {
            summarized,
            reused_summary,
        } => println!(
            "\n  {summarized} messages summarized ({}), {} tokens after compaction",
            if reused_summary { "stored summary" } else { "new summary" },
            planned.token_count
        ),
    }
    for message in &planned.messages {
        let tag = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        println!("  [{tag:>9}] {}", preview(&message.content, 72));
    }
    Ok(())
}
