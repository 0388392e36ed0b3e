//! Paragraph and sentence aware document chunking.

use std::sync::LazyLock;

use regex_lite::Regex;

pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 1000;

static PARAGRAPH_BREAK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n").ok());
static SENTENCE_END: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[.!?]\s+").ok());

/// Splits extracted text into chunks of at most `chunk_size_words` words.
///
/// Paragraphs are packed together until the next one would overflow. An
/// oversized paragraph is split at sentence ends instead, and its last
/// partial chunk stays open for the following paragraph. A single sentence
/// longer than the limit becomes its own chunk.
#[derive(Debug, Clone, Copy)]
pub struct DocumentChunker {
    chunk_size_words: usize,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE_WORDS)
    }
}

impl DocumentChunker {
    pub fn new(chunk_size_words: usize) -> Self {
        Self {
            chunk_size_words: chunk_size_words.max(1),
        }
    }

    pub fn chunk_size_words(&self) -> usize {
        self.chunk_size_words
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut out = ChunkBuffer::new(self.chunk_size_words);

        for paragraph in split_paragraphs(text) {
            if word_count(paragraph) > self.chunk_size_words {
                out.flush();
                for sentence in split_sentences(paragraph) {
                    out.push(sentence, " ");
                }
            } else {
                out.push(paragraph, "\n\n");
            }
        }

        out.finish()
    }
}

struct ChunkBuffer {
    limit: usize,
    current: String,
    words: usize,
    chunks: Vec<String>,
}

impl ChunkBuffer {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            current: String::new(),
            words: 0,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let words = word_count(piece);
        if !self.current.is_empty() && self.words + words > self.limit {
            self.flush();
        }
        if !self.current.is_empty() {
            self.current.push_str(separator);
        }
        self.current.push_str(piece);
        self.words += words;
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.words = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    let parts: Vec<&str> = match PARAGRAPH_BREAK.as_ref() {
        Some(re) => re.split(text).collect(),
        None => vec![text],
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Sentences of `paragraph`, each keeping its terminal punctuation.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let Some(re) = SENTENCE_END.as_ref() else {
        return vec![paragraph];
    };

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in re.find_iter(paragraph) {
        // punctuation is a single ASCII byte
        let end = m.start() + 1;
        let sentence = paragraph[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
