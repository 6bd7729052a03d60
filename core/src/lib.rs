//! BM25 ranking and relevance-analysis engine.
//!
//! The crate is organised leaf-first: [`tokenizer`] feeds the [`index`] at
//! ingestion time; at query time [`query`] parses the text, [`search`]
//! intersects posting lists and asks [`scorer`] for a BM25 score per
//! candidate. [`analyzer`] and [`explain`] post-process result sets.
//! [`engine::Index`] wraps all of it behind a single thread-safe handle.

pub mod analyzer;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod document;
pub mod engine;
pub mod error;
pub mod explain;
pub mod index;
pub mod persist;
pub mod query;
pub mod scorer;
pub mod search;
pub mod snippet;
pub mod tokenizer;

/// Stable document identifier, assigned at insertion.
pub type DocId = u64;
/// Position of a field within the index [`Schema`](index::Schema).
pub type FieldId = u16;

pub use analyzer::{analyze, Relevance, ScoreBucket, Statistics};
pub use config::EngineConfig;
pub use document::{NewDocument, StoredDocument};
pub use engine::{Index, SearchPage};
pub use error::{Error, ErrorKind, Result};
pub use explain::Explanation;
pub use index::{InvertedIndex, Posting, PostingList, Schema};
pub use query::{Filter, Query};
pub use scorer::Bm25Params;
pub use search::{CancellationToken, ResultSet, ScoredResult, SearchOptions};
pub use tokenizer::Tokenizer;
