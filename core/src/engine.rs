//! Thread-safe index handle.
//!
//! [`Index`] owns an [`InvertedIndex`] behind a `parking_lot::RwLock`.
//! Mutations analyse their documents before taking the write lock and hold
//! it for the whole operation, batches included, so readers only ever see
//! committed states. Searches, scoring and explanations share the read lock.

use crate::analyzer::{self, Statistics};
use crate::compare::{self, Comparison};
use crate::config::EngineConfig;
use crate::corpus::{self, CorpusReport};
use crate::document::{NewDocument, StoredDocument};
use crate::error::{Error, Result};
use crate::explain::{self, Explanation};
use crate::index::{AnalyzedDocument, InvertedIndex, Posting, Schema};
use crate::persist::{self, IndexPaths, MetaFile};
use crate::query::{Filter, Query};
use crate::scorer::{self, Bm25Params};
use crate::search::{self, CancellationToken, ResultSet, ScoredResult, SearchOptions};
use crate::snippet;
use crate::tokenizer::Tokenizer;
use crate::{DocId, FieldId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use time::OffsetDateTime;

/// Ranked results together with the documents they refer to, all read
/// under one lock so a concurrent mutation cannot split them.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub query: Query,
    pub results: ResultSet,
    /// One document per entry of `results.results`, in rank order.
    pub documents: Vec<StoredDocument>,
    snippet_field: FieldId,
    snippet_length: usize,
}

impl SearchPage {
    pub fn hits(&self) -> impl Iterator<Item = (&ScoredResult, &StoredDocument)> {
        self.results.iter().zip(&self.documents)
    }

    /// Highlighted excerpt of one of this page's documents.
    pub fn snippet(&self, doc: &StoredDocument) -> String {
        snippet::snippet(doc.field_text(self.snippet_field), &self.query.highlight_terms(), self.snippet_length)
    }
}

pub struct Index {
    inner: RwLock<InvertedIndex>,
    schema: Schema,
    tokenizer: Tokenizer,
    config: EngineConfig,
    created_at: OffsetDateTime,
}

impl Index {
    /// Create an empty index over the named fields with default settings.
    pub fn create<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(Schema::new(fields)?, EngineConfig::default())
    }

    pub fn with_config(schema: Schema, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        for field in &config.tokenizer.keyword_fields {
            if schema.field_id(field).is_none() {
                return Err(Error::schema(format!("keyword field '{field}' is not in the schema")));
            }
        }
        Ok(Self {
            inner: RwLock::new(InvertedIndex::new(schema.clone())),
            schema,
            tokenizer: Tokenizer::new(config.tokenizer.clone()),
            config,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Open a snapshot. The tokenizer settings recorded in the snapshot win
    /// over those in `config`, since the postings were built with them.
    pub fn open(path: &Path, mut config: EngineConfig) -> Result<Self> {
        let (index, meta) = persist::load_index(&IndexPaths::new(path))?;
        if config.tokenizer != meta.tokenizer {
            tracing::warn!(path = %path.display(), "ignoring configured tokenizer; using the one the index was built with");
        }
        config.tokenizer = meta.tokenizer;
        config.validate()?;
        Ok(Self {
            schema: index.schema().clone(),
            inner: RwLock::new(index),
            tokenizer: Tokenizer::new(config.tokenizer.clone()),
            config,
            created_at: meta.created_at,
        })
    }

    /// Open the snapshot at `path` if one exists, else create an empty index.
    pub fn open_or_create(path: &Path, schema: Schema, config: EngineConfig) -> Result<Self> {
        if IndexPaths::new(path).exists() {
            Self::open(path, config)
        } else {
            Self::with_config(schema, config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<MetaFile> {
        let guard = self.inner.read();
        persist::save_index(&IndexPaths::new(path), &guard, self.tokenizer.config(), self.created_at)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run `f` against a consistent snapshot under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&InvertedIndex) -> R) -> R {
        f(&self.inner.read())
    }

    fn analyze(&self, doc: NewDocument) -> Result<AnalyzedDocument> {
        AnalyzedDocument::analyze(&self.schema, &self.tokenizer, doc)
    }

    pub fn insert(&self, doc: NewDocument) -> Result<DocId> {
        let staged = self.analyze(doc)?;
        let id = self.inner.write().insert(staged)?;
        tracing::debug!(doc_id = id, "inserted document");
        Ok(id)
    }

    /// Insert every document or none; the write lock is held for the batch.
    pub fn batch_insert(&self, docs: Vec<NewDocument>) -> Result<Vec<DocId>> {
        let staged = docs.into_iter().map(|d| self.analyze(d)).collect::<Result<Vec<_>>>()?;
        let count = staged.len();
        let ids = self.inner.write().insert_batch(staged)?;
        tracing::info!(count, "inserted document batch");
        Ok(ids)
    }

    pub fn delete(&self, id: DocId) -> Result<StoredDocument> {
        let doc = self.inner.write().delete(id)?;
        tracing::debug!(doc_id = id, "deleted document");
        Ok(doc)
    }

    /// Replace a document, keeping its id. On error the old version stays.
    pub fn update(&self, id: DocId, doc: NewDocument) -> Result<()> {
        let staged = self.analyze(doc)?;
        self.inner.write().replace(id, staged)?;
        tracing::debug!(doc_id = id, "updated document");
        Ok(())
    }

    /// Remove every document and restart id assignment.
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.write();
        let removed = guard.len();
        guard.clear();
        tracing::info!(removed, "cleared index");
        removed
    }

    pub fn document(&self, id: DocId) -> Result<StoredDocument> {
        self.inner.read().document(id).cloned().ok_or(Error::NotFound(id))
    }

    fn resolve_field(&self, name: &str) -> Result<FieldId> {
        self.schema
            .field_id(name)
            .ok_or_else(|| Error::validation(format!("unknown field '{name}'")))
    }

    /// Postings of an analysed term, optionally limited to one field.
    pub fn lookup_postings(&self, term: &str, field: Option<&str>) -> Result<Vec<Posting>> {
        let field = field.map(|f| self.resolve_field(f)).transpose()?;
        Ok(self.inner.read().lookup_postings(term, field))
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.inner.read().document_frequency(term)
    }

    pub fn average_field_length(&self, field: &str) -> Result<f64> {
        let field = self.resolve_field(field)?;
        self.inner.read().average_field_length(field)
    }

    /// Parse query text with this index's schema and analyser.
    pub fn parse(&self, text: &str) -> Result<Query> {
        Query::parse(text, &self.schema, &self.tokenizer)
    }

    /// Search options seeded from the engine configuration.
    pub fn default_options(&self) -> SearchOptions {
        self.config.search_options()
    }

    pub fn search(&self, text: &str, options: &SearchOptions) -> Result<ResultSet> {
        let query = self.parse(text)?;
        search::execute(&self.inner.read(), &query, options, None)
    }

    /// Search and fetch every ranked document from the same snapshot.
    pub fn search_page(&self, text: &str, options: &SearchOptions) -> Result<SearchPage> {
        let query = self.parse(text)?;
        let guard = self.inner.read();
        let results = search::execute(&guard, &query, options, None)?;
        let documents = results
            .iter()
            .map(|r| guard.document(r.doc_id).cloned().ok_or(Error::NotFound(r.doc_id)))
            .collect::<Result<Vec<_>>>()?;
        let snippet_field = self.longest_field(&guard);
        Ok(SearchPage { query, results, documents, snippet_field, snippet_length: self.config.snippet_length })
    }

    pub fn search_with_cancel(
        &self,
        text: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<ResultSet> {
        let query = self.parse(text)?;
        search::execute(&self.inner.read(), &query, options, Some(cancel))
    }

    /// Search restricted to a category, expressed as a query filter.
    pub fn search_in_category(&self, text: &str, category: &str, options: &SearchOptions) -> Result<ResultSet> {
        let query = self.parse(text)?.with_filter(Some(Filter::Category(category.to_string())));
        search::execute(&self.inner.read(), &query, options, None)
    }

    pub fn stats(&self, results: &ResultSet, buckets: usize) -> Result<Statistics> {
        analyzer::analyze(results, buckets)
    }

    /// BM25 score of one document for the required terms of `text`.
    pub fn score(
        &self,
        doc_id: DocId,
        text: &str,
        field_weights: &BTreeMap<String, f64>,
        params: Bm25Params,
    ) -> Result<f64> {
        let query = self.parse(text)?;
        scorer::score(&self.inner.read(), doc_id, &query.required_terms(), field_weights, params)
    }

    pub fn explain(&self, doc_id: DocId, text: &str, options: &SearchOptions) -> Result<Explanation> {
        let query = self.parse(text)?;
        explain::explain(&self.inner.read(), doc_id, &query, options)
    }

    /// Run both strategies against the same snapshot and compare rankings.
    pub fn compare(&self, text: &str, baseline: &SearchOptions, weighted: &SearchOptions) -> Result<Comparison> {
        let query = self.parse(text)?;
        let guard = self.inner.read();
        let a = search::execute(&guard, &query, baseline, None)?;
        let b = search::execute(&guard, &query, weighted, None)?;
        Ok(compare::compare(a, b))
    }

    pub fn corpus_report(&self) -> CorpusReport {
        corpus::report(&self.inner.read())
    }

    /// Field used for snippets: the longest on average, skipping the
    /// category field.
    pub fn snippet_field(&self) -> FieldId {
        self.longest_field(&self.inner.read())
    }

    fn longest_field(&self, index: &InvertedIndex) -> FieldId {
        let totals = index.totals();
        (0..self.schema.len() as FieldId)
            .filter(|f| Some(*f) != self.schema.category_field() || self.schema.len() == 1)
            .max_by(|a, b| {
                let la = totals.field_lengths.get(*a as usize).copied().unwrap_or(0);
                let lb = totals.field_lengths.get(*b as usize).copied().unwrap_or(0);
                la.cmp(&lb).then_with(|| b.cmp(a))
            })
            .unwrap_or(0)
    }

    /// Highlighted excerpt of a document around the first query match.
    pub fn snippet(&self, doc_id: DocId, query: &Query) -> Result<String> {
        let guard = self.inner.read();
        let doc = guard.document(doc_id).ok_or(Error::NotFound(doc_id))?;
        let field = self.longest_field(&guard);
        Ok(snippet::snippet(doc.field_text(field), &query.highlight_terms(), self.config.snippet_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> Index {
        let index = Index::create(["title", "content"]).unwrap();
        index
            .batch_insert(vec![
                NewDocument::new().field("title", "cat").field("content", "the cat sat"),
                NewDocument::new().field("title", "dog").field("content", "the cat and the dog sat and sat"),
            ])
            .unwrap();
        index
    }

    #[test]
    fn empty_schema_is_rejected() {
        assert!(matches!(Index::create(Vec::<String>::new()), Err(Error::Schema(_))));
    }

    #[test]
    fn search_ranks_shorter_document_first() {
        let index = pets();
        let rs = index.search("cat", &SearchOptions::default()).unwrap();
        assert_eq!(rs.doc_ids(), vec![1, 2]);
        let direct = index.score(1, "cat", &BTreeMap::new(), Bm25Params::default()).unwrap();
        assert_eq!(direct, rs.results[0].score);
    }

    #[test]
    fn failed_update_keeps_previous_version() {
        let index = pets();
        let bad = NewDocument::new().field("body", "x");
        assert!(matches!(index.update(1, bad), Err(Error::Validation(_))));
        assert_eq!(index.document(1).unwrap().fields[0], "cat");
        assert_eq!(index.document_frequency("cat"), 2);
    }

    #[test]
    fn update_preserves_id() {
        let index = pets();
        index.update(1, NewDocument::new().field("title", "bird").field("content", "flew")).unwrap();
        assert_eq!(index.search("bird", &SearchOptions::default()).unwrap().doc_ids(), vec![1]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn clear_resets_ids() {
        let index = pets();
        assert_eq!(index.clear(), 2);
        assert!(index.is_empty());
        let id = index.insert(NewDocument::new().field("title", "again")).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn unknown_fields_are_validation_errors() {
        let index = pets();
        assert!(index.lookup_postings("cat", Some("body")).is_err());
        assert!(index.average_field_length("body").is_err());
        assert_eq!(index.lookup_postings("cat", Some("title")).unwrap().len(), 1);
    }

    #[test]
    fn snippet_uses_longest_field() {
        let index = pets();
        let query = index.parse("dog").unwrap();
        assert_eq!(index.snippet_field(), 1);
        assert!(index.snippet(2, &query).unwrap().contains("<em>dog</em>"));
    }

    #[test]
    fn search_page_pairs_results_with_documents() {
        let index = pets();
        let page = index.search_page("cat", &SearchOptions::default()).unwrap();
        assert_eq!(page.results.total_hits, 2);
        assert!(page.hits().all(|(r, d)| r.doc_id == d.id));
        assert_eq!(page.documents.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
        let (_, first) = page.hits().next().unwrap();
        assert_eq!(page.snippet(first), "the <em>cat</em> sat");
    }

    #[test]
    fn save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let index = pets();
        index.save(dir.path()).unwrap();
        let reopened = Index::open(dir.path(), EngineConfig::default()).unwrap();
        assert_eq!(
            reopened.search("cat", &SearchOptions::default()).unwrap(),
            index.search("cat", &SearchOptions::default()).unwrap()
        );
        assert_eq!(reopened.created_at().unix_timestamp(), index.created_at().unix_timestamp());
    }

    #[test]
    fn keyword_fields_must_exist() {
        let mut config = EngineConfig::default();
        config.tokenizer.keyword_fields = vec!["category".into()];
        let schema = Schema::new(["title"]).unwrap();
        assert!(matches!(Index::with_config(schema, config), Err(Error::Schema(_))));
    }
}
