//! Prompt augmentation with retrieved chunks.

use ctxkeeper_core::ScoredChunk;

/// Numbered block of retrieved chunks, ending in a `---` rule.
/// Empty when there are no hits.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut context = String::from("### Relevant Documents:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("**Document {}:**\n{}\n\n", i + 1, hit.text));
    }
    context.push_str("---\n\n");
    context
}

/// The user turn sent to the model: retrieved context followed by the query.
/// Without hits the query is returned unchanged.
pub fn augment_prompt(query: &str, hits: &[ScoredChunk]) -> String {
    if hits.is_empty() {
        return query.to_string();
    }
    format!("{}User Query: {query}", format_context(hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxkeeper_core::DocumentId;

    fn hit(text: &str) -> ScoredChunk {
        ScoredChunk {
            document_id: DocumentId::from("doc"),
            chunk_index: 0,
            text: text.into(),
            score: 0.9,
        }
    }

    #[test]
    fn no_hits_leaves_query_alone() {
        assert_eq!(augment_prompt("What is up?", &[]), "What is up?");
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn hits_are_numbered_from_one() {
        let prompt = augment_prompt("Summarize", &[hit("alpha"), hit("beta")]);
        assert_eq!(
            prompt,
            "### Relevant Documents:\n\n\
             **Document 1:**\nalpha\n\n\
             **Document 2:**\nbeta\n\n\
             ---\n\n\
             User Query: Summarize"
        );
    }
}
