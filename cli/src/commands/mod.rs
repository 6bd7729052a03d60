pub mod corpus;
pub mod doc;
pub mod search;
pub mod visualize;

use crate::output::Format;
use anyhow::{Context, Result};
use bm25_core::corpus::CorpusGenerator;
use bm25_core::{EngineConfig, Index, SearchOptions};
use clap::Args;
use std::path::{Path, PathBuf};

/// An opened index plus the settings every command shares.
pub struct App {
    pub index: Index,
    pub dir: PathBuf,
    pub format: Format,
}

impl App {
    pub fn open(dir: &Path, config: Option<&Path>, format: Format) -> Result<Self> {
        let config = EngineConfig::load_or_default(config)?;
        let index = Index::open_or_create(dir, CorpusGenerator::schema()?, config)
            .with_context(|| format!("opening index at {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), docs = index.len(), "opened index");
        Ok(Self { index, dir: dir.to_path_buf(), format })
    }

    /// Persist after a mutation.
    pub fn commit(&self) -> Result<()> {
        self.index.save(&self.dir)?;
        Ok(())
    }
}

pub fn parse_weight(s: &str) -> std::result::Result<(String, f64), String> {
    let (field, weight) = s.split_once('=').ok_or_else(|| format!("expected FIELD=WEIGHT, got '{s}'"))?;
    let weight: f64 = weight.trim().parse().map_err(|_| format!("invalid weight '{weight}'"))?;
    Ok((field.trim().to_string(), weight))
}

/// Query text plus the ranking knobs shared by search-style commands.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Query text: words, field:word, "phrases", -exclusions
    pub query: String,
    /// Maximum number of results
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    /// Field weight, e.g. --weight title=2.0 (repeatable)
    #[arg(long = "weight", value_parser = parse_weight)]
    pub weights: Vec<(String, f64)>,
    /// Only documents in this category
    #[arg(long)]
    pub category: Option<String>,
    /// Term-frequency saturation
    #[arg(long)]
    pub k1: Option<f64>,
    /// Length normalisation strength
    #[arg(long)]
    pub b: Option<f64>,
}

impl QueryArgs {
    pub fn options(&self, index: &Index, default_limit: Option<usize>) -> SearchOptions {
        let mut opts = index.default_options();
        if let Some(limit) = self.limit.or(default_limit) {
            opts.max_results = limit;
        }
        opts.field_weights = self.weights.iter().cloned().collect();
        opts.category_filter = self.category.clone();
        if let Some(k1) = self.k1 {
            opts.bm25.k1 = k1;
        }
        if let Some(b) = self.b {
            opts.bm25.b = b;
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_parse() {
        assert_eq!(parse_weight("title=2.5").unwrap(), ("title".to_string(), 2.5));
        assert!(parse_weight("title").is_err());
        assert!(parse_weight("title=x").is_err());
    }
}
