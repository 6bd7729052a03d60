//! Statistical summaries of scored result sets.

use crate::error::{Error, Result};
use crate::search::ResultSet;
use crate::DocId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const PERCENTILES: [u8; 6] = [25, 50, 75, 90, 95, 99];
pub const DEFAULT_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentile {
    pub rank: u8,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub label: String,
}

impl ScoreBucket {
    fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper, count: 0, label: format!("{lower:.2} to {upper:.2}") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Quartiles with Tukey fences at 1.5 IQR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub percentiles: Vec<Percentile>,
    pub quartiles: Quartiles,
    /// Results outside the Tukey fences.
    pub outliers: Vec<DocId>,
    pub histogram: Vec<ScoreBucket>,
    pub categories: Vec<CategoryStats>,
}

impl Statistics {
    fn empty() -> Self {
        Self {
            percentiles: PERCENTILES.iter().map(|&rank| Percentile { rank, value: 0.0 }).collect(),
            ..Default::default()
        }
    }

    pub fn percentile(&self, rank: u8) -> Option<f64> {
        self.percentiles.iter().find(|p| p.rank == rank).map(|p| p.value)
    }
}

/// Linear interpolation between order statistics of an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let idx = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = idx.floor() as usize;
            let hi = idx.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (idx - lo as f64)
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Equal-width buckets over `[min, max]`; a single bucket when they coincide.
pub fn histogram(sorted: &[f64], buckets: usize) -> Vec<ScoreBucket> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if buckets == 0 {
        return Vec::new();
    }
    if min == max {
        let mut only = ScoreBucket::new(min, max);
        only.count = sorted.len();
        return vec![only];
    }
    let width = (max - min) / buckets as f64;
    let mut out: Vec<ScoreBucket> = (0..buckets)
        .map(|i| {
            let lower = min + width * i as f64;
            let upper = if i + 1 == buckets { max } else { min + width * (i + 1) as f64 };
            ScoreBucket::new(lower, upper)
        })
        .collect();
    for v in sorted {
        let i = (((v - min) / width) as usize).min(buckets - 1);
        out[i].count += 1;
    }
    out
}

fn categories(results: &ResultSet) -> Vec<CategoryStats> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in results {
        if let Some(c) = &r.category {
            groups.entry(c.as_str()).or_default().push(r.score);
        }
    }
    let mut out: Vec<CategoryStats> = groups
        .into_iter()
        .map(|(category, scores)| {
            let m = mean(&scores);
            CategoryStats {
                category: category.to_string(),
                count: scores.len(),
                mean: m,
                min: scores.iter().copied().fold(f64::INFINITY, f64::min),
                max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                std_dev: std_dev(&scores, m),
            }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    out
}

/// Summarise the scores of `results`. An empty set yields zeroed statistics.
pub fn analyze(results: &ResultSet, buckets: usize) -> Result<Statistics> {
    if buckets == 0 {
        return Err(Error::validation("bucket count must be at least 1"));
    }
    if results.is_empty() {
        return Ok(Statistics::empty());
    }
    let mut sorted = results.scores();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let m = mean(&sorted);

    let q1 = percentile(&sorted, 25.0);
    let q2 = percentile(&sorted, 50.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let quartiles = Quartiles {
        q1,
        q2,
        q3,
        iqr,
        lower_fence: q1 - 1.5 * iqr,
        upper_fence: q3 + 1.5 * iqr,
    };
    let outliers = results
        .iter()
        .filter(|r| r.score < quartiles.lower_fence || r.score > quartiles.upper_fence)
        .map(|r| r.doc_id)
        .collect();

    Ok(Statistics {
        count: n,
        min: sorted[0],
        max: sorted[n - 1],
        mean: m,
        median: q2,
        std_dev: std_dev(&sorted, m),
        percentiles: PERCENTILES
            .iter()
            .map(|&rank| Percentile { rank, value: percentile(&sorted, f64::from(rank)) })
            .collect(),
        quartiles,
        outliers,
        histogram: histogram(&sorted, buckets),
        categories: categories(results),
    })
}

/// Coarse label of a score relative to the best score in its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Relevance {
    pub fn classify(score: f64, best: f64) -> Self {
        if best <= 0.0 {
            return Relevance::Poor;
        }
        match score / best {
            r if r >= 0.75 => Relevance::Excellent,
            r if r >= 0.5 => Relevance::Good,
            r if r >= 0.25 => Relevance::Fair,
            _ => Relevance::Poor,
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relevance::Excellent => "excellent",
            Relevance::Good => "good",
            Relevance::Fair => "fair",
            Relevance::Poor => "poor",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ScoredResult;

    fn results(scores: &[(f64, Option<&str>)]) -> ResultSet {
        ResultSet {
            query: "q".into(),
            total_hits: scores.len(),
            results: scores
                .iter()
                .enumerate()
                .map(|(i, (score, cat))| ScoredResult {
                    doc_id: i as DocId + 1,
                    score: *score,
                    category: cat.map(str::to_string),
                    breakdown: None,
                })
                .collect(),
        }
    }

    #[test]
    fn five_scores() {
        let rs = results(&[(5.0, None), (4.0, None), (3.0, None), (2.0, None), (1.0, None)]);
        let s = analyze(&rs, DEFAULT_BUCKETS).unwrap();
        assert_eq!(s.count, 5);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 3.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert!((s.std_dev - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.percentile(25), Some(2.0));
        assert!((s.percentile(90).unwrap() - 4.6).abs() < 1e-12);
        assert_eq!(s.histogram.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(s.histogram.len(), 10);
        assert_eq!(s.histogram[9].count, 1);
    }

    #[test]
    fn empty_set_is_zeroed_not_an_error() {
        let s = analyze(&ResultSet::default(), 10).unwrap();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean, 0.0);
        assert!(s.histogram.is_empty());
        assert_eq!(s.percentiles.len(), PERCENTILES.len());
        assert!(s.percentiles.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn identical_scores_use_one_bucket() {
        let rs = results(&[(2.0, None), (2.0, None), (2.0, None)]);
        let s = analyze(&rs, 4).unwrap();
        assert_eq!(s.histogram.len(), 1);
        assert_eq!(s.histogram[0].count, 3);
        assert_eq!(s.histogram[0].label, "2.00 to 2.00");
        assert_eq!(s.std_dev, 0.0);
    }

    #[test]
    fn zero_buckets_is_invalid() {
        let rs = results(&[(1.0, None)]);
        assert!(matches!(analyze(&rs, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn categories_are_grouped() {
        let rs = results(&[(4.0, Some("tech")), (3.0, Some("science")), (2.0, Some("tech")), (1.0, None)]);
        let s = analyze(&rs, 2).unwrap();
        assert_eq!(s.categories.len(), 2);
        let tech = &s.categories[0];
        assert_eq!((tech.category.as_str(), tech.count, tech.mean), ("tech", 2, 3.0));
        assert_eq!((tech.min, tech.max, tech.std_dev), (2.0, 4.0, 1.0));
    }

    #[test]
    fn fences_flag_outliers() {
        let rs = results(&[(100.0, None), (3.0, None), (2.9, None), (2.8, None), (2.7, None)]);
        let s = analyze(&rs, 10).unwrap();
        assert_eq!(s.outliers, vec![1]);
        assert!(s.quartiles.upper_fence < 100.0);
    }

    #[test]
    fn relevance_labels() {
        assert_eq!(Relevance::classify(10.0, 10.0), Relevance::Excellent);
        assert_eq!(Relevance::classify(5.0, 10.0), Relevance::Good);
        assert_eq!(Relevance::classify(2.5, 10.0), Relevance::Fair);
        assert_eq!(Relevance::classify(1.0, 10.0), Relevance::Poor);
        assert_eq!(Relevance::classify(0.0, 0.0), Relevance::Poor);
        assert_eq!(Relevance::Good.to_string(), "good");
    }
}
