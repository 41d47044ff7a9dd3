//! Deterministic stand-ins for the embedding and generation providers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa::chunk::Chunker;
use docqa::embedding::Embedder;
use docqa::error::{RagError, Result};
use docqa::generation::Generator;
use docqa::index::VectorIndex;
use docqa::session::Session;

pub const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// `DIMS` buckets. Texts sharing words score higher.
pub struct WordEmbedder {
    pub calls: AtomicUsize,
}

impl WordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(5381usize, |h, b| h.wrapping_mul(33) ^ b as usize)
                % DIMS;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "test-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Records every prompt and answers with a numbered reply, or fails while
/// `fail` is set.
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::generation("503 Service Unavailable"));
        }
        Ok(format!("answer #{}", n))
    }

    fn model(&self) -> &str {
        "recording"
    }
}

pub async fn open_index(dir: &Path) -> Arc<VectorIndex> {
    Arc::new(
        VectorIndex::open(dir.join("vector_db").join("index.sqlite"), WordEmbedder::new())
            .await
            .unwrap(),
    )
}

pub async fn open_session(dir: &Path) -> (Session, Arc<RecordingGenerator>) {
    let generator = RecordingGenerator::new();
    let session = Session::new(
        open_index(dir).await,
        Chunker::default(),
        generator.clone(),
        3,
        3,
    );
    (session, generator)
}
