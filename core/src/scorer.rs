//! BM25 scoring with per-field weights.
//!
//! ```text
//! idf(t)       = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
//! norm(f)      = k1 * ((1 - b) + b * len(f) / avglen(f))
//! contribution = w(f) * idf(t) * tf * (k1 + 1) / (tf + norm(f))
//! score        = sum of contributions over (term, field) pairs with tf > 0
//! ```
//!
//! Fields are scored separately and summed, the way FTS5's column-weighted
//! `bm25()` behaves, rather than concatenated into one bag of words.

use crate::error::{Error, Result};
use crate::index::{InvertedIndex, Schema};
use crate::query::QueryTerm;
use crate::{DocId, FieldId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Term-frequency saturation (`k1`) and length normalisation (`b`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::validation(format!("k1 must be a non-negative number, got {}", self.k1)));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(Error::validation(format!("b must be within [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

/// Inverse document frequency; never negative thanks to the `+ 1`.
pub fn idf(document_count: u64, doc_freq: u32) -> f64 {
    let n = document_count as f64;
    let df = f64::from(doc_freq);
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Length normalisation of one field. Falls back to `k1 * (1 - b)` when
/// the corpus average is zero so empty fields never produce NaN.
pub fn length_norm(field_len: f64, avg_field_len: f64, params: Bm25Params) -> f64 {
    if avg_field_len > 0.0 {
        params.k1 * ((1.0 - params.b) + params.b * field_len / avg_field_len)
    } else {
        params.k1 * (1.0 - params.b)
    }
}

/// Contribution of one (term, field) pair.
pub fn contribution(weight: f64, idf: f64, tf: f64, norm: f64, params: Bm25Params) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    weight * idf * tf * (params.k1 + 1.0) / (tf + norm)
}

/// Resolve a name-keyed weight map against the schema. Missing fields
/// default to 1.0.
pub fn resolve_weights(schema: &Schema, weights: &BTreeMap<String, f64>) -> Result<Vec<f64>> {
    let mut resolved = vec![1.0; schema.len()];
    for (name, weight) in weights {
        let field = schema
            .field_id(name)
            .ok_or_else(|| Error::validation(format!("weight given for unknown field '{name}'")))?;
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::validation(format!(
                "weight for '{name}' must be a non-negative number, got {weight}"
            )));
        }
        resolved[field as usize] = *weight;
    }
    Ok(resolved)
}

/// Per-(term, field) breakdown of a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermFieldScore {
    pub term: String,
    pub field: String,
    pub weight: f64,
    pub tf: u32,
    pub idf: f64,
    pub field_length: u32,
    pub avg_field_length: f64,
    pub length_norm: f64,
    pub score: f64,
}

/// Scores documents of one index snapshot against a fixed set of terms.
pub struct Bm25Scorer<'a> {
    index: &'a InvertedIndex,
    params: Bm25Params,
    weights: Vec<f64>,
    averages: Vec<f64>,
    terms: Vec<(QueryTerm, f64)>,
}

impl<'a> Bm25Scorer<'a> {
    pub fn new(
        index: &'a InvertedIndex,
        terms: &[QueryTerm],
        weights: Vec<f64>,
        params: Bm25Params,
    ) -> Result<Self> {
        params.validate()?;
        let n = index.totals().document_count;
        if n == 0 {
            return Err(Error::EmptyCorpus);
        }
        if weights.len() != index.schema().len() {
            return Err(Error::validation("one weight per schema field is required"));
        }
        let averages = (0..index.schema().len())
            .map(|f| index.average_field_length(f as FieldId))
            .collect::<Result<Vec<_>>>()?;
        let mut scored: Vec<(QueryTerm, f64)> = Vec::with_capacity(terms.len());
        for term in terms {
            if scored.iter().any(|(t, _)| t == term) {
                continue;
            }
            let df = index.document_frequency(&term.term);
            scored.push((term.clone(), idf(n, df)));
        }
        Ok(Self { index, params, weights, averages, terms: scored })
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn weight(&self, field: FieldId) -> f64 {
        self.weights.get(field as usize).copied().unwrap_or(1.0)
    }

    pub fn average(&self, field: FieldId) -> f64 {
        self.averages.get(field as usize).copied().unwrap_or(0.0)
    }

    /// Visit every (term, field) pair of `doc_id` with a non-zero term
    /// frequency, in query-term order then field order. `score` and
    /// `breakdown` are both built on this walk so they can never disagree.
    fn walk(&self, doc_id: DocId, mut visit: impl FnMut(&QueryTerm, f64, FieldId, u32, u32, f64, f64)) {
        let Some(doc) = self.index.document(doc_id) else { return };
        for (qt, idf) in &self.terms {
            let Some(list) = self.index.postings(&qt.term) else { continue };
            for posting in list.for_doc(doc_id) {
                if qt.field.is_some_and(|f| f != posting.field) {
                    continue;
                }
                let field = posting.field;
                let tf = posting.term_frequency();
                let len = doc.field_length(field);
                let norm = length_norm(f64::from(len), self.average(field), self.params);
                let c = contribution(self.weight(field), *idf, f64::from(tf), norm, self.params);
                visit(qt, *idf, field, tf, len, norm, c);
            }
        }
    }

    pub fn score(&self, doc_id: DocId) -> f64 {
        let mut total = 0.0;
        self.walk(doc_id, |_, _, _, _, _, _, c| total += c);
        total
    }

    pub fn breakdown(&self, doc_id: DocId) -> Vec<TermFieldScore> {
        let schema = self.index.schema();
        let mut out = Vec::new();
        self.walk(doc_id, |qt, idf, field, tf, len, norm, c| {
            out.push(TermFieldScore {
                term: qt.term.clone(),
                field: schema.field_name(field).to_string(),
                weight: self.weight(field),
                tf,
                idf,
                field_length: len,
                avg_field_length: self.average(field),
                length_norm: norm,
                score: c,
            });
        });
        out
    }
}

/// Score one document against plain query terms.
pub fn score(
    index: &InvertedIndex,
    doc_id: DocId,
    terms: &[QueryTerm],
    field_weights: &BTreeMap<String, f64>,
    params: Bm25Params,
) -> Result<f64> {
    let weights = resolve_weights(index.schema(), field_weights)?;
    let scorer = Bm25Scorer::new(index, terms, weights, params)?;
    if !index.contains(doc_id) {
        return Err(Error::NotFound(doc_id));
    }
    Ok(scorer.score(doc_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NewDocument;
    use crate::index::AnalyzedDocument;
    use crate::tokenizer::Tokenizer;

    fn corpus() -> InvertedIndex {
        let schema = Schema::new(["title", "content"]).unwrap();
        let mut idx = InvertedIndex::new(schema);
        for (t, c) in [("cat", "the cat sat"), ("dog", "the cat and the dog sat and sat")] {
            let doc = NewDocument::new().field("title", t).field("content", c);
            let doc = AnalyzedDocument::analyze(idx.schema(), &Tokenizer::default(), doc).unwrap();
            idx.insert(doc).unwrap();
        }
        idx
    }

    fn cat() -> Vec<QueryTerm> {
        vec![QueryTerm::any_field("cat")]
    }

    #[test]
    fn idf_is_never_negative() {
        assert!(idf(2, 2) > 0.0);
        assert!(idf(1, 1) > 0.0);
        assert!(idf(100, 1) > idf(100, 50));
    }

    #[test]
    fn shorter_document_outranks_diluted_one() {
        let idx = corpus();
        let w = BTreeMap::new();
        let d1 = score(&idx, 1, &cat(), &w, Bm25Params::default()).unwrap();
        let d2 = score(&idx, 2, &cat(), &w, Bm25Params::default()).unwrap();
        assert!(d1 > d2, "{d1} should exceed {d2}");
    }

    #[test]
    fn matches_hand_computed_value() {
        let idx = corpus();
        let p = Bm25Params::default();
        let i = idf(2, 2);
        // title: tf 1, len 1, avg 1; content: tf 1, len 3, avg 5.5
        let title = i * 2.2 / (1.0 + 1.2 * (0.25 + 0.75));
        let content = i * 2.2 / (1.0 + 1.2 * (0.25 + 0.75 * 3.0 / 5.5));
        let got = score(&idx, 1, &cat(), &BTreeMap::new(), p).unwrap();
        assert!((got - (title + content)).abs() < 1e-12);
    }

    #[test]
    fn field_weights_scale_contributions() {
        let idx = corpus();
        let p = Bm25Params::default();
        let base = score(&idx, 2, &cat(), &BTreeMap::new(), p).unwrap();
        let doubled = score(&idx, 2, &cat(), &BTreeMap::from([("content".to_string(), 2.0)]), p).unwrap();
        assert!((doubled - 2.0 * base).abs() < 1e-12);
        let muted = score(&idx, 2, &cat(), &BTreeMap::from([("content".to_string(), 0.0)]), p).unwrap();
        assert_eq!(muted, 0.0);
    }

    #[test]
    fn field_restricted_terms_only_score_that_field() {
        let idx = corpus();
        let p = Bm25Params::default();
        let restricted = vec![QueryTerm { term: "cat".into(), field: Some(0) }];
        let scorer = Bm25Scorer::new(&idx, &restricted, vec![1.0, 1.0], p).unwrap();
        let parts = scorer.breakdown(1);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].field, "title");
        assert_eq!(scorer.score(2), 0.0);
    }

    #[test]
    fn breakdown_sums_to_score() {
        let idx = corpus();
        let terms = vec![QueryTerm::any_field("cat"), QueryTerm::any_field("sat")];
        let scorer = Bm25Scorer::new(&idx, &terms, vec![2.0, 0.5], Bm25Params::default()).unwrap();
        for id in [1, 2] {
            let sum: f64 = scorer.breakdown(id).iter().map(|c| c.score).sum();
            assert_eq!(sum, scorer.score(id));
        }
    }

    #[test]
    fn rejects_empty_corpus_and_bad_input() {
        let empty = InvertedIndex::new(Schema::new(["title"]).unwrap());
        let err = score(&empty, 1, &cat(), &BTreeMap::new(), Bm25Params::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));

        let idx = corpus();
        let bad = Bm25Params { k1: -1.0, b: 0.75 };
        assert!(matches!(score(&idx, 1, &cat(), &BTreeMap::new(), bad), Err(Error::Validation(_))));
        let weights = BTreeMap::from([("body".to_string(), 1.0)]);
        let p = Bm25Params::default();
        assert!(matches!(score(&idx, 1, &cat(), &weights, p), Err(Error::Validation(_))));
        assert!(matches!(score(&idx, 9, &cat(), &BTreeMap::new(), p), Err(Error::NotFound(9))));
    }

    #[test]
    fn zero_average_length_is_guarded() {
        let p = Bm25Params::default();
        let norm = length_norm(0.0, 0.0, p);
        assert!((norm - 1.2 * 0.25).abs() < 1e-12);
        assert_eq!(contribution(1.0, 1.0, 0.0, norm, p), 0.0);
    }
}
