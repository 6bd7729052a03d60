//! Query execution: AND prefilter over posting lists, phrase and exclusion
//! checks, category filter, BM25 ranking, truncation.

use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::query::{Filter, Match, Query};
use crate::scorer::{resolve_weights, Bm25Params, Bm25Scorer, TermFieldScore};
use crate::{DocId, FieldId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

pub const DEFAULT_MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Weight per field name; unnamed fields weigh 1.0.
    pub field_weights: BTreeMap<String, f64>,
    pub category_filter: Option<String>,
    /// Attach a per-(term, field) breakdown to every returned result.
    pub explain: bool,
    pub bm25: Bm25Params,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            field_weights: BTreeMap::new(),
            category_filter: None,
            explain: false,
            bm25: Bm25Params::default(),
        }
    }
}

impl SearchOptions {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_weight(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.field_weights.insert(field.into(), weight);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_filter = Some(category.into());
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub doc_id: DocId,
    /// Higher is more relevant.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<TermFieldScore>>,
}

/// Results sorted by descending score, ties by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub query: String,
    /// Matching documents before truncation.
    pub total_hits: usize,
    pub results: Vec<ScoredResult>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredResult> {
        self.results.iter()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.score).collect()
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.results.iter().map(|r| r.doc_id).collect()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.results.first().map(|r| r.score)
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ScoredResult;
    type IntoIter = std::slice::Iter<'a, ScoredResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Shared flag a caller flips to abort a running search.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

fn intersect(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn positions<'i>(index: &'i InvertedIndex, term: &str, doc: DocId, field: FieldId) -> &'i [u32] {
    index
        .postings(term)
        .and_then(|list| list.for_doc(doc).iter().find(|p| p.field == field))
        .map(|p| p.positions.as_slice())
        .unwrap_or_default()
}

/// Whether the phrase occurs at consecutive positions within one field.
fn phrase_in_doc(index: &InvertedIndex, m: &Match, doc: DocId) -> bool {
    let fields: Vec<FieldId> = match m.field {
        Some(f) => vec![f],
        None => (0..index.schema().len() as FieldId).collect(),
    };
    fields.into_iter().any(|field| {
        let anchors = positions(index, &m.terms[0], doc, field);
        anchors.iter().any(|start| {
            m.terms.iter().zip(&m.offsets).skip(1).all(|(term, offset)| {
                positions(index, term, doc, field).binary_search(&(start + offset)).is_ok()
            })
        })
    })
}

/// Documents satisfying one clause, ascending.
fn match_docs(index: &InvertedIndex, m: &Match) -> Vec<DocId> {
    let mut docs: Option<Vec<DocId>> = None;
    for term in &m.terms {
        let ids = index.postings(term).map(|l| l.doc_ids(m.field)).unwrap_or_default();
        docs = Some(match docs {
            Some(prev) => intersect(&prev, &ids),
            None => ids,
        });
        if docs.as_ref().is_some_and(Vec::is_empty) {
            return Vec::new();
        }
    }
    let docs = docs.unwrap_or_default();
    if m.is_phrase() {
        docs.into_iter().filter(|d| phrase_in_doc(index, m, *d)).collect()
    } else {
        docs
    }
}

fn rarest_df(index: &InvertedIndex, m: &Match) -> u32 {
    m.terms.iter().map(|t| index.document_frequency(t)).min().unwrap_or(0)
}

/// Candidate ids passing every required and excluded clause, ascending.
fn candidates(index: &InvertedIndex, query: &Query) -> Vec<DocId> {
    let mut required: Vec<&Match> = query.required().collect();
    required.sort_by_key(|m| rarest_df(index, m));
    let mut docs: Option<Vec<DocId>> = None;
    for m in required {
        let ids = match_docs(index, m);
        let next = match docs {
            Some(prev) => intersect(&prev, &ids),
            None => ids,
        };
        if next.is_empty() {
            return next;
        }
        docs = Some(next);
    }
    let mut docs = docs.unwrap_or_default();
    for m in query.excluded() {
        let excluded = match_docs(index, m);
        docs.retain(|d| excluded.binary_search(d).is_err());
    }
    docs
}

/// Whether `doc_id` passes the boolean prefilter of `query`.
pub fn matches(index: &InvertedIndex, query: &Query, doc_id: DocId) -> bool {
    candidates(index, query).binary_search(&doc_id).is_ok()
}

fn effective_filter(query: &Query, options: &SearchOptions) -> Option<Filter> {
    options
        .category_filter
        .as_ref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| Filter::Category(c.clone()))
        .or_else(|| query.filter.clone())
}

pub fn execute(
    index: &InvertedIndex,
    query: &Query,
    options: &SearchOptions,
    cancel: Option<&CancellationToken>,
) -> Result<ResultSet> {
    if options.max_results == 0 {
        return Err(Error::validation("max_results must be at least 1"));
    }
    options.bm25.validate()?;
    let schema = index.schema();
    let weights = resolve_weights(schema, &options.field_weights)?;
    let filter = effective_filter(query, options);
    if filter.is_some() && schema.category_field().is_none() {
        return Err(Error::validation("category filter requires a schema category field"));
    }
    let scorer = Bm25Scorer::new(index, &query.required_terms(), weights, options.bm25)?;

    let mut ids = candidates(index, query);
    let candidate_count = ids.len();
    if let Some(filter) = &filter {
        ids.retain(|id| index.document(*id).is_some_and(|doc| filter.matches(schema, doc)));
    }

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(query = %query.text, "search cancelled");
            return Err(Error::Cancelled);
        }
        let category = index
            .document(id)
            .and_then(|doc| schema.category_of(doc))
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        results.push(ScoredResult { doc_id: id, score: scorer.score(id), category, breakdown: None });
    }
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    let total_hits = results.len();
    results.truncate(options.max_results);
    if options.explain {
        for r in &mut results {
            r.breakdown = Some(scorer.breakdown(r.doc_id));
        }
    }
    tracing::debug!(
        query = %query.text,
        candidates = candidate_count,
        hits = total_hits,
        returned = results.len(),
        "search executed"
    );
    Ok(ResultSet { query: query.text.clone(), total_hits, results })
}
