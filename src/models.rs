//! Core data models used throughout the assistant.
//!
//! These types represent the documents, segments, chunks, and conversation
//! turns that flow through the indexing and query pipelines.

use std::fmt;
use std::path::{Path, PathBuf};

/// File types the extractor knows how to read.
///
/// Resolved once from the file extension. Anything else becomes
/// [`DocumentKind::Unrecognized`], which is still read as UTF-8 text so
/// mislabeled files are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
    Unrecognized,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            Some("txt") | Some("text") | Some("md") => DocumentKind::Text,
            _ => DocumentKind::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "text",
            DocumentKind::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file, consumed immediately by the indexer.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = DocumentKind::from_path(&path);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            kind,
        }
    }

    /// File name used in provenance output; falls back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A unit of extracted text: one PDF page, or a whole text/docx file.
#[derive(Debug, Clone)]
pub struct Segment {
    pub document_id: String,
    pub source: String,
    /// 0-based position of the segment within its document.
    pub index: usize,
    /// 1-based page number for paginated formats.
    pub page: Option<u32>,
    pub text: String,
}

/// A bounded window of a segment's text, the unit stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub segment_index: usize,
    pub page: Option<u32>,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from the index with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}
