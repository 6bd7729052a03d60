//! On-disk snapshot of an index.
//!
//! A snapshot directory holds `docs-<gen>.bin` and `postings-<gen>.bin`
//! (bincode flat record vectors) plus `meta.json`, which names the current
//! generation. A save writes the next generation's data files, then swaps
//! `meta.json` through a temp file and a rename, then removes the previous
//! generation. Until the rename lands, `meta.json` still points at a
//! complete older snapshot.

use crate::document::StoredDocument;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, PostingList, Schema};
use crate::tokenizer::TokenizerConfig;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    /// Suffix of the data files this meta file commits.
    pub generation: u64,
    pub schema: Schema,
    /// Analysis the index was built with; queries must use the same.
    pub tokenizer: TokenizerConfig,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub next_doc_id: DocId,
    pub num_docs: u64,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn docs(&self, generation: u64) -> PathBuf {
        self.root.join(format!("docs-{generation}.bin"))
    }

    pub fn postings(&self, generation: u64) -> PathBuf {
        self.root.join(format!("postings-{generation}.bin"))
    }

    /// Whether a snapshot has been committed here.
    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|source| Error::Io { context: "write", path: tmp.clone(), source })?;
    fs::rename(&tmp, path).map_err(|source| Error::Io { context: "rename", path: path.to_path_buf(), source })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::Io { context: "read", path: path.to_path_buf(), source })
}

fn encode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|source| Error::Encode { path: path.to_path_buf(), source })
}

fn decode<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = read(path)?;
    bincode::deserialize(&bytes).map_err(|source| Error::Encode { path: path.to_path_buf(), source })
}

pub fn save_index(
    paths: &IndexPaths,
    index: &InvertedIndex,
    tokenizer: &TokenizerConfig,
    created_at: OffsetDateTime,
) -> Result<MetaFile> {
    fs::create_dir_all(&paths.root)
        .map_err(|source| Error::Io { context: "create", path: paths.root.clone(), source })?;

    // An unreadable previous meta only means there is nothing to supersede.
    let previous = if paths.exists() { load_meta(paths).ok().map(|m| m.generation) } else { None };
    let generation = previous.map_or(1, |g| g + 1);

    let docs: Vec<&StoredDocument> = index.documents().collect();
    let docs_path = paths.docs(generation);
    write_atomic(&docs_path, &encode(&docs_path, &docs)?)?;

    let mut postings: Vec<(&str, &PostingList)> = index.terms().collect();
    postings.sort_unstable_by(|a, b| a.0.cmp(b.0));
    let postings_path = paths.postings(generation);
    write_atomic(&postings_path, &encode(&postings_path, &postings)?)?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        generation,
        schema: index.schema().clone(),
        tokenizer: tokenizer.clone(),
        created_at,
        updated_at: OffsetDateTime::now_utc(),
        next_doc_id: index.next_doc_id(),
        num_docs: index.len() as u64,
    };
    let json = serde_json::to_vec_pretty(&meta)
        .map_err(|source| Error::Json { path: paths.meta(), source })?;
    write_atomic(&paths.meta(), &json)?;

    if let Some(old) = previous {
        for stale in [paths.docs(old), paths.postings(old)] {
            if let Err(err) = fs::remove_file(&stale) {
                tracing::warn!(path = %stale.display(), error = %err, "could not remove superseded snapshot file");
            }
        }
    }

    tracing::info!(
        root = %paths.root.display(),
        docs = meta.num_docs,
        terms = postings.len(),
        generation,
        "saved index snapshot"
    );
    Ok(meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let bytes = read(&path)?;
    let meta: MetaFile = serde_json::from_slice(&bytes).map_err(|source| Error::Json { path: path.clone(), source })?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::Corrupt { path, reason: format!("unsupported format version {}", meta.version) });
    }
    Ok(meta)
}

/// Load a snapshot, rebuilding corpus totals and re-checking every
/// structural invariant.
pub fn load_index(paths: &IndexPaths) -> Result<(InvertedIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    let docs: Vec<StoredDocument> = decode(&paths.docs(meta.generation))?;
    let postings: Vec<(String, PostingList)> = decode(&paths.postings(meta.generation))?;
    if docs.len() as u64 != meta.num_docs {
        return Err(Error::Corrupt {
            path: paths.docs(meta.generation),
            reason: format!("{} documents stored, meta.json records {}", docs.len(), meta.num_docs),
        });
    }
    let index = InvertedIndex::from_parts(meta.schema.clone(), docs, postings, meta.next_doc_id)
        .map_err(|reason| Error::Corrupt { path: paths.root.clone(), reason })?;
    tracing::info!(root = %paths.root.display(), docs = index.len(), terms = index.term_count(), "loaded index snapshot");
    Ok((index, meta))
}
