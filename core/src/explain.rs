use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::query::Query;
use crate::scorer::{length_norm, resolve_weights, Bm25Scorer, TermFieldScore};
use crate::search::{self, SearchOptions};
use crate::DocId;
use serde::Serialize;

/// Per-field view of a document's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldExplanation {
    pub field: String,
    pub weight: f64,
    pub length: u32,
    pub avg_length: f64,
    /// `k1 * ((1 - b) + b * length / avg_length)`, as used for every term
    /// in this field.
    pub length_norm: f64,
    pub score: f64,
    pub terms: Vec<TermFieldScore>,
}

/// Decomposition of one document's BM25 score.
///
/// `contributions` are listed in the order the scorer adds them, so their
/// sum is bit-for-bit the reported `score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub doc_id: DocId,
    pub query: String,
    pub score: f64,
    /// Whether the document passes the query's boolean prefilter.
    pub matched: bool,
    pub total_length: u64,
    pub avg_document_length: f64,
    pub fields: Vec<FieldExplanation>,
    pub contributions: Vec<TermFieldScore>,
}

impl Explanation {
    pub fn contribution_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.score).sum()
    }
}

pub fn explain(
    index: &InvertedIndex,
    doc_id: DocId,
    query: &Query,
    options: &SearchOptions,
) -> Result<Explanation> {
    let weights = resolve_weights(index.schema(), &options.field_weights)?;
    let scorer = Bm25Scorer::new(index, &query.required_terms(), weights, options.bm25)?;
    let doc = index.document(doc_id).ok_or(Error::NotFound(doc_id))?;
    let contributions = scorer.breakdown(doc_id);
    let params = scorer.params();

    let fields = index
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(fid, name)| {
            let fid = fid as crate::FieldId;
            let length = doc.field_length(fid);
            let avg_length = scorer.average(fid);
            let terms: Vec<TermFieldScore> =
                contributions.iter().filter(|c| &c.field == name).cloned().collect();
            FieldExplanation {
                field: name.clone(),
                weight: scorer.weight(fid),
                length,
                avg_length,
                length_norm: length_norm(f64::from(length), avg_length, params),
                score: terms.iter().map(|t| t.score).sum(),
                terms,
            }
        })
        .collect();

    Ok(Explanation {
        doc_id,
        query: query.text.clone(),
        score: scorer.score(doc_id),
        matched: search::matches(index, query, doc_id),
        total_length: doc.total_length,
        avg_document_length: index.totals().average_document_length().unwrap_or(0.0),
        fields,
        contributions,
    })
}
