//! Text extraction for uploaded documents.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use ctxkeeper_core::{Error, Result};
use regex_lite::Regex;

/// Supported upload types, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Markdown,
    Pdf,
    Docx,
}

impl FileKind {
    pub const SUPPORTED: &'static [&'static str] = &["txt", "md", "pdf", "docx"];

    /// Kind of `filename` from its extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => Ok(Self::Text),
            "md" => Ok(Self::Markdown),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => Err(Error::UnsupportedFileType { extension }),
        }
    }

    /// Normalized tag stored on the document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// PDF and DOCX parsing is CPU-bound and runs off the async workers.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Pdf | Self::Docx)
    }

    pub fn extractor(&self) -> Box<dyn TextExtractor> {
        match self {
            Self::Text | Self::Markdown => Box::new(PlainTextExtractor),
            Self::Pdf => Box::new(PdfExtractor),
            Self::Docx => Box::new(DocxExtractor),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns raw file bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Extraction(format!("text is not valid UTF-8: {e}")))
    }
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| Error::Extraction(format!("PDF: {e}")))?;
        Ok(text.trim().to_string())
    }
}

/// Reads the text runs of `word/document.xml`, one line per paragraph.
pub struct DocxExtractor;

static TEXT_RUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").ok());

impl TextExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Extraction(format!("DOCX: {e}")))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| Error::Extraction(format!("DOCX: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| Error::Extraction(format!("DOCX: {e}")))?;

        let re = TEXT_RUN
            .as_ref()
            .ok_or_else(|| Error::Internal("text run pattern failed to compile".into()))?;

        let paragraphs: Vec<String> = xml
            .split("</w:p>")
            .map(|para| {
                re.captures_iter(para)
                    .filter_map(|c| c.get(1))
                    .map(|m| unescape_xml(m.as_str()))
                    .collect::<String>()
            })
            .collect();

        Ok(paragraphs.join("\n").trim().to_string())
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract `bytes` as `kind`, on the blocking pool when parsing is heavy.
pub async fn extract_text(kind: FileKind, bytes: Vec<u8>) -> Result<String> {
    if !kind.is_blocking() {
        return kind.extractor().extract(&bytes);
    }

    tokio::task::spawn_blocking(move || kind.extractor().extract(&bytes))
        .await
        .map_err(|e| Error::Extraction(format!("{kind} extraction aborted: {e}")))?
}
