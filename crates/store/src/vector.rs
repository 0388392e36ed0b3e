//! Vector similarity utilities shared by the scan-based backends.
//!
//! The in-memory and SQLite stores keep embeddings next to their chunks
//! and rank by brute-force cosine similarity. PostgreSQL delegates ranking
//! to pgvector instead.

use ctxkeeper_core::{DocumentChunk, ScoredChunk};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 for empty, zero-norm, or mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank candidate chunks by similarity to `query`, best first.
///
/// Candidates must arrive in insertion order; the sort is stable, so equal
/// scores keep that order.
pub fn rank_chunks<'a>(
    candidates: impl IntoIterator<Item = &'a DocumentChunk>,
    query: &[f32],
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|chunk| ScoredChunk {
            document_id: chunk.document_id.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            score: cosine_similarity(&chunk.embedding, query),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Serialize an embedding vector to little-endian bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_blob`]. Trailing bytes that do not form a
/// whole `f32` are ignored.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
