//! `ctxkeeper new` / `list` / `delete-conversation`.

use ctxkeeper_core::ConversationId;

use super::{CmdResult, open_app};

pub async fn create(title: Option<String>) -> CmdResult {
    let app = open_app().await?;
    let conversation = app.create_conversation(title).await?;
    println!("{}", conversation.id);
    eprintln!("✅ Created \"{}\"", conversation.title);
    Ok(())
}

pub async fn list() -> CmdResult {
    let app = open_app().await?;
    let conversations = app.list_conversations().await?;

    if conversations.is_empty() {
        println!("No conversations yet. Run `ctxkeeper new` to start one.");
        return Ok(());
    }

    for conversation in conversations {
        println!(
            "{}  {}  {}",
            conversation.id,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.title
        );
    }
    Ok(())
}

pub async fn delete(conversation: String) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    if app.delete_conversation(&id).await? {
        println!("🗑️  Deleted conversation {id}");
        Ok(())
    } else {
        Err(format!("Conversation not found: {id}").into())
    }
}
