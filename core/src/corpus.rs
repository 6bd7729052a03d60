//! Corpus-level reporting and synthetic corpus generation.

use crate::analyzer::percentile;
use crate::document::NewDocument;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, Schema};
use crate::FieldId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusReport {
    pub total_documents: u64,
    pub total_tokens: u64,
    pub avg_document_length: f64,
    pub median_document_length: f64,
    pub min_document_length: u64,
    pub max_document_length: u64,
    pub unique_terms: usize,
    /// Average token count per schema field.
    pub avg_field_lengths: BTreeMap<String, f64>,
    pub categories: BTreeMap<String, usize>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub oldest: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub newest: Option<OffsetDateTime>,
}

pub fn report(index: &InvertedIndex) -> CorpusReport {
    let schema = index.schema();
    let totals = index.totals();
    let mut lengths: Vec<f64> = index.documents().map(|d| d.total_length as f64).collect();
    lengths.sort_by(f64::total_cmp);

    let mut categories = BTreeMap::new();
    for doc in index.documents() {
        if let Some(c) = schema.category_of(doc).filter(|c| !c.is_empty()) {
            *categories.entry(c.to_string()).or_insert(0) += 1;
        }
    }
    let avg_field_lengths = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), totals.average_field_length(i as FieldId).unwrap_or(0.0)))
        .collect();

    CorpusReport {
        total_documents: totals.document_count,
        total_tokens: totals.total_length,
        avg_document_length: totals.average_document_length().unwrap_or(0.0),
        median_document_length: percentile(&lengths, 50.0),
        min_document_length: index.documents().map(|d| d.total_length).min().unwrap_or(0),
        max_document_length: index.documents().map(|d| d.total_length).max().unwrap_or(0),
        unique_terms: index.term_count(),
        avg_field_lengths,
        categories,
        oldest: index.documents().map(|d| d.created_at).min(),
        newest: index.documents().map(|d| d.created_at).max(),
    }
}

pub const DEFAULT_CATEGORIES: [&str; 5] = ["technology", "science", "programming", "database", "algorithms"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub size: usize,
    pub categories: Vec<String>,
    pub min_tokens: usize,
    pub max_tokens: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            size: 100,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            min_tokens: 50,
            max_tokens: 500,
        }
    }
}

impl GeneratorOptions {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::validation("corpus size must be at least 1"));
        }
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            return Err(Error::validation("at least one category is required"));
        }
        if self.min_tokens == 0 || self.min_tokens >= self.max_tokens {
            return Err(Error::validation(format!(
                "token range must satisfy 0 < min < max, got {}..{}",
                self.min_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

struct Vocabulary {
    templates: &'static [&'static str],
    subjects: &'static [&'static str],
    words: &'static [&'static str],
}

fn vocabulary(category: &str) -> Vocabulary {
    match category {
        "science" => Vocabulary {
            templates: &[
                "Research in {} Methods",
                "Scientific Analysis of {}",
                "Experimental {} Studies",
                "Theoretical {} Frameworks",
                "Applications of {} Theory",
            ],
            subjects: &["Data", "Machine Learning", "Statistics", "Analytics", "Research"],
            words: &[
                "research", "analysis", "methodology", "hypothesis", "experiment", "data", "results",
                "conclusion", "theory", "evidence", "statistical", "empirical", "quantitative",
                "qualitative", "validation",
            ],
        },
        "programming" => Vocabulary {
            templates: &[
                "Mastering {} Algorithms",
                "Efficient {} Implementation",
                "Advanced {} Patterns",
                "Learning {} Programming",
                "{} Code Optimization",
            ],
            subjects: &["Object-Oriented", "Functional", "Concurrent", "Distributed", "Reactive"],
            words: &[
                "function", "variable", "algorithm", "optimization", "performance", "debugging",
                "testing", "refactoring", "maintainable", "readable", "efficient", "scalable",
                "object", "method", "interface",
            ],
        },
        "database" => Vocabulary {
            templates: &[
                "Optimizing {} Queries",
                "Advanced {} Indexing",
                "{} Transaction Management",
                "Scaling {} Systems",
                "{} Performance Tuning",
            ],
            subjects: &["SQL", "NoSQL", "Relational", "Graph", "Time-Series"],
            words: &[
                "query", "index", "transaction", "optimization", "performance", "schema",
                "normalization", "relational", "primary", "foreign", "key", "table", "column",
                "constraint", "integrity",
            ],
        },
        "algorithms" => Vocabulary {
            templates: &[
                "Efficient {} Algorithms",
                "Complex {} Analysis",
                "Optimized {} Solutions",
                "Advanced {} Techniques",
                "Comparative {} Study",
            ],
            subjects: &["Sorting", "Search", "Graph", "Dynamic Programming", "Greedy"],
            words: &[
                "complexity", "efficiency", "optimization", "iteration", "recursion", "sorting",
                "searching", "traversal", "comparison", "analysis", "space", "time", "linear",
                "logarithmic", "polynomial",
            ],
        },
        // technology, and the fallback for unknown categories
        _ => Vocabulary {
            templates: &[
                "Advanced {} Development Techniques",
                "Understanding {} Architecture",
                "Modern {} Best Practices",
                "Introduction to {} Programming",
                "{} Performance Optimization",
            ],
            subjects: &["Cloud", "Mobile", "Web", "AI", "Blockchain", "IoT"],
            words: &[
                "system", "development", "architecture", "framework", "platform", "solution",
                "design", "implementation", "scalable", "efficient", "robust", "secure", "modern",
                "advanced", "innovative",
            ],
        },
    }
}

const CONNECTORS: &[&str] = &[
    "and", "the", "of", "in", "to", "for", "with", "by", "from", "on", "at", "as", "is", "are",
    "can", "will", "this", "that", "these", "those",
];

/// Share of content words drawn from the category vocabulary.
const CATEGORY_WORD_RATIO: f64 = 0.3;
const CREATED_WINDOW_MINUTES: i64 = 30 * 24 * 60;

/// Deterministic synthetic document source for a given seed.
pub struct CorpusGenerator {
    options: GeneratorOptions,
    categories: Vec<String>,
    rng: StdRng,
    anchor: OffsetDateTime,
}

impl CorpusGenerator {
    pub fn new(options: GeneratorOptions, seed: u64) -> Result<Self> {
        options.validate()?;
        let categories = options
            .categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(Self { options, categories, rng: StdRng::seed_from_u64(seed), anchor: OffsetDateTime::now_utc() })
    }

    /// Creation times fall within the 30 days before `anchor`.
    pub fn with_anchor(mut self, anchor: OffsetDateTime) -> Self {
        self.anchor = anchor;
        self
    }

    /// Schema the generated documents conform to.
    pub fn schema() -> Result<Schema> {
        Schema::new(["title", "content", "category"])?.with_category_field("category")
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.gen_range(0..items.len())]
    }

    pub fn document(&mut self) -> NewDocument {
        let category = self.categories[self.rng.gen_range(0..self.categories.len())].clone();
        let vocab = vocabulary(&category);
        let template = self.pick(vocab.templates);
        let subject = self.pick(vocab.subjects);
        let title = template.replace("{}", subject);

        let target = self.rng.gen_range(self.options.min_tokens..=self.options.max_tokens);
        let mut words = Vec::with_capacity(target);
        while words.len() < target {
            let word = if self.rng.gen_bool(CATEGORY_WORD_RATIO) {
                self.pick(vocab.words)
            } else {
                self.pick(CONNECTORS)
            };
            words.push(word);
        }

        let offset = Duration::minutes(self.rng.gen_range(0..CREATED_WINDOW_MINUTES));
        NewDocument::new()
            .field("title", title)
            .field("content", words.join(" "))
            .field("category", category)
            .created_at(self.anchor - offset)
    }

    pub fn generate(&mut self) -> Vec<NewDocument> {
        (0..self.options.size).map(|_| self.document()).collect()
    }
}
