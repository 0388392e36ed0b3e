//! `ctxkeeper ingest` / `docs` / `search` / `forget`.

use std::path::PathBuf;

use ctxkeeper_core::{ConversationId, DocumentId};
use ctxkeeper_retrieval::SearchOutcome;

use super::{CmdResult, open_app, preview};

pub async fn ingest(conversation: String, file: PathBuf) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("Not a file: {}", file.display()))?;
    let bytes = std::fs::read(&file).map_err(|e| format!("Cannot read {}: {e}", file.display()))?;

    let report = app.retrieval.ingest(&id, &filename, bytes).await?;
    println!("{}", report.document_id);
    eprintln!(
        "✅ {filename}: {} chunks indexed{}",
        report.chunks_indexed,
        if report.chunks_skipped > 0 {
            format!(", {} skipped (embedding failed)", report.chunks_skipped)
        } else {
            String::new()
        }
    );
    Ok(())
}

pub async fn list(conversation: String) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    app.require_conversation(&id).await?;

    let documents = app.retrieval.list_documents(&id).await?;
    if documents.is_empty() {
        println!("No documents. Add one with `ctxkeeper ingest {id} <file>`.");
        return Ok(());
    }
    for doc in documents {
        println!(
            "{}  {:<4}  {}  {}",
            doc.id,
            doc.file_type,
            doc.uploaded_at.format("%Y-%m-%d %H:%M"),
            doc.filename
        );
    }
    Ok(())
}

pub async fn search(conversation: String, query: String, top_k: Option<usize>) -> CmdResult {
    let app = open_app().await?;
    let id = ConversationId::from(conversation.as_str());
    app.require_conversation(&id).await?;
    let k = top_k.unwrap_or_else(|| app.retrieval.top_k());

    match app.retrieval.search(&id, &query, k).await {
        SearchOutcome::Hits(hits) => {
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "  {:>2}. [score: {:.3}] {}#{}  {}",
                    i + 1,
                    hit.score,
                    hit.document_id,
                    hit.chunk_index,
                    preview(&hit.text, 80)
                );
            }
        }
        SearchOutcome::Empty => println!("   No matching chunks."),
        SearchOutcome::Failed(reason) => println!("   ⚠️  Search unavailable: {reason}"),
    }
    Ok(())
}

pub async fn forget(document: String) -> CmdResult {
    let app = open_app().await?;
    let id = DocumentId::from(document.as_str());
    if app.retrieval.delete_document(&id).await? {
        println!("🗑️  Deleted document {id}");
        Ok(())
    } else {
        Err(format!("Document not found: {id}").into())
    }
}
