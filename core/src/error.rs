//! Error types for the ranking engine.
//!
//! Every failure the engine reports is a variant of [`Error`]; callers that
//! need to branch on the category use [`Error::kind`] instead of matching
//! message text.

use crate::DocId;
use std::path::PathBuf;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category, stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DuplicateDocument,
    EmptyCorpus,
    Schema,
    Cancelled,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("document {0} not found")]
    NotFound(DocId),
    #[error("document {0} already exists")]
    DuplicateDocument(DocId),
    #[error("corpus is empty; index at least one document first")]
    EmptyCorpus,
    #[error("invalid schema: {0}")]
    Schema(String),
    #[error("query cancelled")]
    Cancelled,

    // -- Persistence --
    #[error("failed to {context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode or decode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: bincode::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("corrupt index at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::DuplicateDocument(_) => ErrorKind::DuplicateDocument,
            Error::EmptyCorpus => ErrorKind::EmptyCorpus,
            Error::Schema(_) => ErrorKind::Schema,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io { .. } | Error::Encode { .. } | Error::Json { .. } | Error::Corrupt { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(Error::DuplicateDocument(3).kind(), ErrorKind::DuplicateDocument);
        assert_eq!(Error::EmptyCorpus.kind(), ErrorKind::EmptyCorpus);
        assert_eq!(Error::schema("x").kind(), ErrorKind::Schema);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        let corrupt = Error::Corrupt { path: PathBuf::from("/tmp/x"), reason: "bad".into() };
        assert_eq!(corrupt.kind(), ErrorKind::Storage);
    }

    #[test]
    fn messages_name_the_document() {
        assert_eq!(Error::NotFound(42).to_string(), "document 42 not found");
    }
}
