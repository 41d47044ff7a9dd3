//! Indexing pipeline: extract → chunk → embed → store.
//!
//! Each uploaded file is processed to completion before the next one
//! starts. A file either lands in the index with all of its chunks or not
//! at all; a failure is reported for that file and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunk::Chunker;
use crate::error::{RagError, Result};
use crate::extract;
use crate::index::VectorIndex;
use crate::models::Document;

/// Outcome of a batch upload.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents fully indexed.
    pub processed: usize,
    /// Chunks added across all processed documents.
    pub chunks: usize,
    /// Files that failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Indexer {
    chunker: Chunker,
    index: Arc<VectorIndex>,
}

impl Indexer {
    pub fn new(chunker: Chunker, index: Arc<VectorIndex>) -> Self {
        Self { chunker, index }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Index one file and return the number of chunks added.
    ///
    /// Stops at the first failing stage; nothing from the file is stored
    /// in that case.
    pub async fn add_document(&self, path: &Path) -> Result<usize> {
        let document = Document::new(path);
        tracing::debug!(path = %path.display(), kind = %document.kind, "extracting");

        let segments = {
            let document = document.clone();
            tokio::task::spawn_blocking(move || extract::extract(&document))
                .await
                .map_err(|e| {
                    RagError::extraction(
                        path.display().to_string(),
                        format!("extraction task failed: {}", e),
                    )
                })??
        };
        let chunks = self.chunker.split(&segments)?;
        let added = self.index.insert(&document, &chunks).await?;

        tracing::info!(
            file = %document.display_name(),
            segments = segments.len(),
            chunks = added,
            "indexed document"
        );
        Ok(added)
    }

    /// Index every file in order, collecting per-file failures.
    pub async fn add_documents<P: AsRef<Path>>(&self, paths: &[P]) -> IngestReport {
        let mut report = IngestReport::default();

        for path in paths {
            let path = path.as_ref();
            match self.add_document(path).await {
                Ok(chunks) => {
                    report.processed += 1;
                    report.chunks += chunks;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to index document");
                    report.failures.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        report
    }
}
