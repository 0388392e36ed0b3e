//! `ctxkeeper chat`: Single-message or interactive chat.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ctxkeeper::{App, ChatTurn};
use ctxkeeper_core::ConversationId;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CmdResult, open_app};

pub async fn run(
    conversation: String,
    message: Option<String>,
    model: Option<String>,
    rag: bool,
    images: Vec<PathBuf>,
) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    let conv = app.require_conversation(&id).await?;
    let model = app.model_or_default(model);
    let images = images
        .iter()
        .map(|p| encode_image(p))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(msg) = message {
        send(&app, ChatTurn::new(id, msg, &model).with_rag(rag).with_images(images)).await?;
        return Ok(());
    }

    println!();
    println!("  Conversation: {}", conv.title);
    println!("  Model:        {model}");
    println!("  Documents:    {}", if rag { "on" } else { "off" });
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_images = images;

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if !line.is_empty() {
            let turn = ChatTurn::new(id.clone(), line, &model)
                .with_rag(rag)
                .with_images(std::mem::take(&mut pending_images));
            if let Err(e) = send(&app, turn).await {
                eprintln!("  [Error] {e}");
            }
        }
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

async fn send(app: &App, turn: ChatTurn) -> CmdResult {
    let mut stdout = std::io::stdout();
    let report = app
        .chat_turn(turn, |fragment| {
            print!("{fragment}");
            let _ = stdout.flush();
        })
        .await?;
    println!();

    let mut notes = Vec::new();
    if report.was_compacted {
        notes.push("earlier messages summarized");
    }
    if report.used_rag {
        notes.push("documents used");
    }
    if !notes.is_empty() {
        eprintln!("  ({})", notes.join(", "));
    }
    Ok(())
}

/// Read an image file as a data URL.
fn encode_image(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
