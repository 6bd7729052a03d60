//! Side-by-side comparison of two ranking strategies over one query.

use crate::search::{ResultSet, ScoredResult};
use crate::DocId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Score differences below this count as unchanged.
pub const SCORE_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "delta", rename_all = "lowercase")]
pub enum RankChange {
    Same,
    Up(f64),
    Down(f64),
    Reordered,
    Dropped,
    New,
}

impl fmt::Display for RankChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankChange::Same => f.write_str("same"),
            RankChange::Up(d) => write!(f, "+{d:.3}"),
            RankChange::Down(d) => write!(f, "{d:.3}"),
            RankChange::Reordered => f.write_str("reordered"),
            RankChange::Dropped => f.write_str("dropped"),
            RankChange::New => f.write_str("new"),
        }
    }
}

/// One rank position across both result lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRow {
    pub rank: usize,
    pub baseline: Option<ScoredResult>,
    pub weighted: Option<ScoredResult>,
    pub change: RankChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub query: String,
    pub baseline: ResultSet,
    pub weighted: ResultSet,
    pub rows: Vec<RankRow>,
    pub common: Vec<DocId>,
    pub only_baseline: Vec<DocId>,
    pub only_weighted: Vec<DocId>,
}

fn change(baseline: Option<&ScoredResult>, weighted: Option<&ScoredResult>) -> RankChange {
    match (baseline, weighted) {
        (Some(a), Some(b)) if a.doc_id == b.doc_id => {
            let diff = b.score - a.score;
            if diff > SCORE_EPSILON {
                RankChange::Up(diff)
            } else if diff < -SCORE_EPSILON {
                RankChange::Down(diff)
            } else {
                RankChange::Same
            }
        }
        (Some(_), Some(_)) => RankChange::Reordered,
        (Some(_), None) => RankChange::Dropped,
        (None, _) => RankChange::New,
    }
}

/// Compare two result sets rank by rank.
pub fn compare(baseline: ResultSet, weighted: ResultSet) -> Comparison {
    let rows = (0..baseline.len().max(weighted.len()))
        .map(|i| {
            let a = baseline.results.get(i);
            let b = weighted.results.get(i);
            RankRow { rank: i + 1, baseline: a.cloned(), weighted: b.cloned(), change: change(a, b) }
        })
        .collect();
    let left: BTreeSet<DocId> = baseline.doc_ids().into_iter().collect();
    let right: BTreeSet<DocId> = weighted.doc_ids().into_iter().collect();
    Comparison {
        query: baseline.query.clone(),
        common: left.intersection(&right).copied().collect(),
        only_baseline: left.difference(&right).copied().collect(),
        only_weighted: right.difference(&left).copied().collect(),
        rows,
        baseline,
        weighted,
    }
}
