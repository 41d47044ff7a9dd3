//! Query orchestration.
//!
//! A [`Session`] owns everything a conversation needs: the indexer for
//! uploads, the retriever, the generator, and the conversation memory.
//! Each question runs through a fixed sequence of states:
//!
//! ```text
//! Idle → Retrieving → Assembling → Generating → Completed
//!          │              │            │
//!          └──────────────┴────────────┴──────→ Errored
//! ```
//!
//! Only `Completed` touches memory, appending the question/answer pair
//! exactly once. Every failure is turned into a message for the user and
//! the session stays usable for the next question.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::ingest::{IngestReport, Indexer};
use crate::memory::ConversationMemory;
use crate::models::Chunk;
use crate::prompt;
use crate::retrieve::Retriever;

pub const NOT_READY_REPLY: &str = "Please upload documents first.";
pub const NO_CONTEXT_REPLY: &str = "No relevant information found in the documents.";
pub const EMPTY_QUESTION_REPLY: &str = "Please enter a question.";
/// Appended to failures of a provider that may succeed on a later attempt.
pub const RETRY_HINT: &str = "This may be temporary; please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Retrieving,
    Assembling,
    Generating,
    Completed,
    Errored,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryState::Idle => "idle",
            QueryState::Retrieving => "retrieving",
            QueryState::Assembling => "assembling",
            QueryState::Generating => "generating",
            QueryState::Completed => "completed",
            QueryState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// What happened to one question.
#[derive(Debug)]
pub enum Outcome {
    /// The model answered; `sources` are the chunks it was shown.
    Answered { answer: String, sources: Vec<Chunk> },
    /// Blank question, ignored.
    EmptyQuestion,
    /// Nothing has been uploaded yet.
    NotReady,
    /// The index returned no chunks.
    NoContext,
    /// Retrieval or generation failed.
    Failed(RagError),
}

impl Outcome {
    /// The reply shown to the user.
    pub fn message(&self) -> String {
        match self {
            Outcome::Answered { answer, .. } => answer.clone(),
            Outcome::EmptyQuestion => EMPTY_QUESTION_REPLY.to_string(),
            Outcome::NotReady => NOT_READY_REPLY.to_string(),
            Outcome::NoContext => NO_CONTEXT_REPLY.to_string(),
            Outcome::Failed(e) if e.is_retryable() => {
                format!("Error processing query: {}. {}", e, RETRY_HINT)
            }
            Outcome::Failed(e) => format!("Error processing query: {}", e),
        }
    }

    pub fn sources(&self) -> &[Chunk] {
        match self {
            Outcome::Answered { sources, .. } => sources,
            _ => &[],
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Outcome::Answered { .. })
    }
}

pub struct Session {
    indexer: Indexer,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    memory: ConversationMemory,
    top_k: usize,
    state: QueryState,
    last_prompt: Option<String>,
}

impl Session {
    pub fn new(
        index: Arc<VectorIndex>,
        chunker: Chunker,
        generator: Arc<dyn Generator>,
        top_k: usize,
        history_turns: usize,
    ) -> Self {
        Self {
            indexer: Indexer::new(chunker, Arc::clone(&index)),
            retriever: Retriever::new(index),
            generator,
            memory: ConversationMemory::new(history_turns),
            top_k,
            state: QueryState::Idle,
            last_prompt: None,
        }
    }

    /// Open the configured index and wire a session around it.
    pub async fn open(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let index = VectorIndex::open(config.index_db_path(), embedder).await?;
        Ok(Self::new(
            Arc::new(index),
            Chunker::from_config(&config.chunking),
            generator,
            config.retrieval.top_k,
            config.memory.history_turns,
        ))
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.indexer.index()
    }

    pub async fn add_document(&self, path: &Path) -> Result<usize> {
        self.indexer.add_document(path).await
    }

    pub async fn add_documents<P: AsRef<Path>>(&self, paths: &[P]) -> IngestReport {
        self.indexer.add_documents(paths).await
    }

    /// Answer `question`, returning the reply text.
    pub async fn query(&mut self, question: &str) -> String {
        self.ask(question).await.message()
    }

    /// Answer `question`, returning the structured outcome.
    pub async fn ask(&mut self, question: &str) -> Outcome {
        self.state = QueryState::Idle;
        let question = question.trim();
        if question.is_empty() {
            return Outcome::EmptyQuestion;
        }

        match self.run(question).await {
            Ok(outcome) => outcome,
            Err(RagError::IndexNotReady) => {
                self.transition(QueryState::Errored);
                Outcome::NotReady
            }
            Err(e) => {
                self.transition(QueryState::Errored);
                tracing::warn!(error = %e, "query failed");
                Outcome::Failed(e)
            }
        }
    }

    async fn run(&mut self, question: &str) -> Result<Outcome> {
        self.transition(QueryState::Retrieving);
        let chunks = self.retriever.retrieve(question, self.top_k).await?;
        if chunks.is_empty() {
            self.transition(QueryState::Completed);
            return Ok(Outcome::NoContext);
        }

        self.transition(QueryState::Assembling);
        let prompt = prompt::assemble(question, &chunks, &self.memory.recent());
        self.last_prompt = Some(prompt.clone());

        self.transition(QueryState::Generating);
        let answer = self.generator.complete(&prompt).await?;

        self.memory.push(question, answer.as_str());
        self.transition(QueryState::Completed);
        tracing::info!(
            model = self.generator.model(),
            chunks = chunks.len(),
            turns = self.memory.len(),
            "answered question"
        );

        Ok(Outcome::Answered {
            answer,
            sources: chunks,
        })
    }

    fn transition(&mut self, next: QueryState) {
        tracing::debug!(from = %self.state, to = %next, "query state");
        self.state = next;
    }

    /// State reached by the most recent question.
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// The prompt sent for the most recent generated answer.
    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn history_len(&self) -> usize {
        self.memory.len()
    }

    pub fn clear_history(&mut self) {
        self.memory.clear();
        self.last_prompt = None;
        tracing::info!("conversation cleared");
    }
}
