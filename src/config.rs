//! Configuration loading.
//!
//! Settings come from an optional TOML file, then the environment
//! (`GEMINI_API_KEY`, `GEMINI_MODEL`, `VECTOR_DB_DIR`) overrides them.
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration. The API key is the one value without a default;
//! [`Config::require_api_key`] turns its absence into a fatal
//! [`RagError::Configuration`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_INDEX_DIR: &str = "VECTOR_DB_DIR";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./vector_db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `local`, `openai`, `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Read from `GEMINI_API_KEY`; accepted in the file for convenience.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Deadline for one generation call; expiry is a generation failure.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_generation_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    512
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Number of most recent question/answer turns shown to the model.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
        }
    }
}

fn default_history_turns() -> usize {
    3
}

impl Config {
    /// Index database file inside the configured directory.
    pub fn index_db_path(&self) -> PathBuf {
        self.index.dir.join("index.sqlite")
    }

    /// The generative-model API key. Startup must stop if this fails.
    pub fn require_api_key(&self) -> Result<&str> {
        self.generation
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RagError::configuration(format!("{} not found in environment", ENV_API_KEY))
            })
    }

    /// Apply environment overrides from a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.generation.model = model;
        }
        if let Some(dir) = lookup(ENV_INDEX_DIR) {
            self.index.dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::configuration("chunking.chunk_size must be > 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::configuration(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size",
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::configuration("retrieval.top_k must be >= 1"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(RagError::configuration(
                "generation.temperature must be in [0.0, 2.0]",
            ));
        }
        if self.generation.max_output_tokens == 0 {
            return Err(RagError::configuration(
                "generation.max_output_tokens must be > 0",
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::configuration("embedding.batch_size must be > 0"));
        }
        match self.embedding.provider.as_str() {
            "local" | "openai" | "ollama" => {}
            other => {
                return Err(RagError::configuration(format!(
                    "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
                    other
                )))
            }
        }
        if self.embedding.provider != "local" && self.embedding.model.is_none() {
            return Err(RagError::configuration(format!(
                "embedding.model must be specified when provider is '{}'",
                self.embedding.provider
            )));
        }
        Ok(())
    }
}

/// Parse a TOML string and validate it. No environment overrides.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| RagError::configuration(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path` (if given) plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                RagError::configuration(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&content).map_err(|e| {
                RagError::configuration(format!("Failed to parse config file: {}", e))
            })?
        }
        None => Config::default(),
    };
    config.apply_env(|k| std::env::var(k).ok());
    config.validate()?;
    Ok(config)
}
