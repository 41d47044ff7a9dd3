//! # docqa
//!
//! A document question-answering assistant. Uploaded PDF, Word, and text
//! files are split into overlapping chunks, embedded, and stored in a
//! persistent vector index; questions are answered by a generative model
//! grounded in the most similar chunks and the last few turns of the
//! conversation.
//!
//! ## Architecture
//!
//! ```text
//! upload ─▶ extract ─▶ chunk ─▶ embed ─▶ ┌──────────────┐
//!                                        │ VectorIndex  │
//! question ─▶ retrieve ◀──────────────── │  (SQLite)    │
//!                │                       └──────────────┘
//!                ▼
//!            assemble ◀── memory
//!                │
//!                ▼
//!            generate (Gemini) ─▶ answer ─▶ memory
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`chunk`] | Recursive character splitter |
//! | [`embedding`] | Embedding providers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`index`] | Persistent vector index |
//! | [`ingest`] | Indexing pipeline |
//! | [`retrieve`] | Top-k retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`memory`] | Conversation memory |
//! | [`generation`] | Answer generation |
//! | [`session`] | Query orchestration |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod session;
