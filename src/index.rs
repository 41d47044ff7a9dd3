//! Persistent vector index over chunk embeddings.
//!
//! Entries live in a SQLite database (`index.sqlite`) inside the
//! configured directory. The database file is created by the first
//! successful [`VectorIndex::insert`]; before that the index is *not
//! ready* and [`VectorIndex::search`] fails with
//! [`RagError::IndexNotReady`]. Reopening an existing directory restores
//! every previously committed entry.
//!
//! Insertion and search are mutually atomic: inserts take the write side
//! of an `RwLock` and commit a whole document in one transaction, searches
//! read under the read side, so a search never sees half a document.
//!
//! Search is brute-force cosine similarity over all stored vectors, ranked
//! highest first with ties broken by insertion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{Chunk, Document, ScoredChunk};

/// Summary counts for `docqa stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: u64,
    pub entries: u64,
    pub model: Option<String>,
}

struct IndexState {
    pool: Option<SqlitePool>,
    entries: u64,
}

pub struct VectorIndex {
    db_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Open the index stored at `db_path`.
    ///
    /// A missing file is not an error: the index starts uninitialized and
    /// the file is created on first insert.
    pub async fn open(db_path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db_path = db_path.into();
        let mut state = IndexState {
            pool: None,
            entries: 0,
        };

        if db_path.exists() {
            let pool = db::connect(&db_path, false).await?;
            migrate::run_migrations(&pool).await?;
            state.entries = count_entries(&pool).await?;
            warn_on_model_mismatch(&pool, embedder.model_name()).await?;
            tracing::info!(path = %db_path.display(), entries = state.entries, "opened vector index");
            state.pool = Some(pool);
        }

        Ok(Self {
            db_path,
            embedder,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// True once at least one document has been committed.
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.entries > 0
    }

    pub async fn len(&self) -> u64 {
        self.state.read().await.entries
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Embed and persist `chunks` as one document, all or nothing.
    ///
    /// Documents are never deduplicated: inserting the same content twice
    /// stores it twice.
    pub async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Err(RagError::EmptyInput(document.display_name()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let model = self.embedder.model_name().to_string();

        let mut state = self.state.write().await;
        let pool = match &state.pool {
            Some(pool) => pool.clone(),
            None => {
                let pool = db::connect(&self.db_path, true).await?;
                migrate::run_migrations(&pool).await?;
                tracing::info!(path = %self.db_path.display(), "created vector index");
                state.pool = Some(pool.clone());
                pool
            }
        };

        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, path, kind, chunk_count, added_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(document.path.display().to_string())
        .bind(document.kind.as_str())
        .bind(chunks.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO entries (chunk_id, document_id, source, segment_index, page,
                                     chunk_index, text, hash, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&document.id)
            .bind(&chunk.source)
            .bind(chunk.segment_index as i64)
            .bind(chunk.page.map(i64::from))
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .bind(&model)
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        state.entries += chunks.len() as u64;

        Ok(chunks.len())
    }

    /// Return up to `k` entries most similar to `query`, best first.
    ///
    /// Fails with [`RagError::IndexNotReady`] before the first insert,
    /// without calling the embedding provider.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.is_ready().await {
            return Err(RagError::IndexNotReady);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let state = self.state.read().await;
        let pool = state.pool.as_ref().ok_or(RagError::IndexNotReady)?;

        let rows = sqlx::query(
            r#"
            SELECT seq, chunk_id, document_id, source, segment_index, page,
                   chunk_index, text, hash, embedding
            FROM entries
            ORDER BY seq
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut scored: Vec<(i64, ScoredChunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                let page: Option<i64> = row.get("page");
                let chunk = Chunk {
                    id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    source: row.get("source"),
                    segment_index: row.get::<i64, _>("segment_index") as usize,
                    page: page.map(|p| p as u32),
                    chunk_index: row.get::<i64, _>("chunk_index") as usize,
                    text: row.get("text"),
                    hash: row.get("hash"),
                };
                (row.get::<i64, _>("seq"), ScoredChunk { chunk, score })
            })
            .collect();

        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(seq_a.cmp(seq_b))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let state = self.state.read().await;
        match state.pool.as_ref() {
            Some(pool) => read_stats(pool).await,
            None => Ok(IndexStats::empty()),
        }
    }

    /// Statistics for the index at `db_path` without building an embedder.
    /// A missing file reports an empty index and is not created.
    pub async fn stats_at(db_path: &Path) -> Result<IndexStats> {
        if !db_path.exists() {
            return Ok(IndexStats::empty());
        }
        let pool = db::connect(db_path, false).await?;
        migrate::run_migrations(&pool).await?;
        let stats = read_stats(&pool).await;
        pool.close().await;
        stats
    }

    pub async fn close(&self) {
        if let Some(pool) = self.state.write().await.pool.take() {
            pool.close().await;
        }
    }
}

impl IndexStats {
    fn empty() -> Self {
        Self {
            documents: 0,
            entries: 0,
            model: None,
        }
    }
}

async fn read_stats(pool: &SqlitePool) -> Result<IndexStats> {
    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let model: Option<String> =
        sqlx::query_scalar("SELECT model FROM entries ORDER BY seq DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(IndexStats {
        documents: documents as u64,
        entries: count_entries(pool).await?,
        model,
    })
}

async fn count_entries(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}

async fn warn_on_model_mismatch(pool: &SqlitePool, model: &str) -> Result<()> {
    let stored: Vec<String> = sqlx::query_scalar("SELECT DISTINCT model FROM entries")
        .fetch_all(pool)
        .await?;
    for other in stored.iter().filter(|m| m.as_str() != model) {
        tracing::warn!(
            stored = %other,
            current = %model,
            "index contains vectors from a different embedding model; their scores will be meaningless"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hashes words into a small fixed-width vector.
    struct WordEmbedder {
        calls: AtomicUsize,
    }

    impl WordEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0; 32];
            for word in text.split_whitespace() {
                let word = word.to_lowercase();
                let bucket = word.bytes().fold(7usize, |h, b| h * 31 + b as usize) % 32;
                v[bucket] += 1.0;
            }
            v
        }
    }

    #[async_trait::async_trait]
    impl Embedder for WordEmbedder {
        fn model_name(&self) -> &str {
            "words"
        }

        fn dims(&self) -> usize {
            32
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }

    fn chunk(document: &Document, index: usize, text: &str) -> Chunk {
        Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            source: document.display_name(),
            segment_index: 0,
            page: None,
            chunk_index: index,
            text: text.to_string(),
            hash: format!("h{}", index),
        }
    }

    #[tokio::test]
    async fn search_before_first_insert_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = WordEmbedder::new();
        let index = VectorIndex::open(dir.path().join("index.sqlite"), embedder.clone())
            .await
            .unwrap();

        assert!(!index.is_ready().await);
        assert!(matches!(
            index.search("anything", 3).await,
            Err(RagError::IndexNotReady)
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("index.sqlite").exists());
    }

    #[tokio::test]
    async fn best_match_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite"), WordEmbedder::new())
            .await
            .unwrap();
        let doc = Document::new("animals.txt");
        let chunks = vec![
            chunk(&doc, 0, "cats purr and sleep all day"),
            chunk(&doc, 1, "rockets burn fuel to reach orbit"),
            chunk(&doc, 2, "dogs bark at the mail carrier"),
        ];
        assert_eq!(index.insert(&doc, &chunks).await.unwrap(), 3);

        let hits = index.search("rockets orbit fuel", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_index, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn fewer_entries_than_k_returns_all() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite"), WordEmbedder::new())
            .await
            .unwrap();
        let doc = Document::new("one.txt");
        index
            .insert(&doc, &[chunk(&doc, 0, "only entry")])
            .await
            .unwrap();

        assert_eq!(index.search("entry", 3).await.unwrap().len(), 1);
        assert!(index.search("entry", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite"), WordEmbedder::new())
            .await
            .unwrap();
        let doc = Document::new("dup.txt");
        let chunks = vec![
            chunk(&doc, 0, "same words here"),
            chunk(&doc, 1, "same words here"),
        ];
        index.insert(&doc, &chunks).await.unwrap();

        let hits = index.search("same words here", 2).await.unwrap();
        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert_eq!(hits[1].chunk.chunk_index, 1);
    }

    #[tokio::test]
    async fn reopen_restores_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.sqlite");
        {
            let index = VectorIndex::open(&path, WordEmbedder::new()).await.unwrap();
            let doc = Document::new("keep.txt");
            index
                .insert(&doc, &[chunk(&doc, 0, "persisted across restarts")])
                .await
                .unwrap();
            index.close().await;
        }

        let reopened = VectorIndex::open(&path, WordEmbedder::new()).await.unwrap();
        assert!(reopened.is_ready().await);
        let hits = reopened.search("restarts", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "persisted across restarts");

        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.model.as_deref(), Some("words"));
        reopened.close().await;

        assert_eq!(VectorIndex::stats_at(&path).await.unwrap(), stats);
    }

    #[tokio::test]
    async fn stats_at_missing_file_is_empty_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_db").join("index.sqlite");
        let stats = VectorIndex::stats_at(&path).await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.entries, 0);
        assert!(stats.model.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_chunk_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite"), WordEmbedder::new())
            .await
            .unwrap();
        let doc = Document::new("blank.txt");
        assert!(matches!(
            index.insert(&doc, &[]).await,
            Err(RagError::EmptyInput(_))
        ));
        assert!(!index.is_ready().await);
    }
}
