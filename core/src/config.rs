use crate::analyzer::DEFAULT_BUCKETS;
use crate::error::{Error, Result};
use crate::scorer::Bm25Params;
use crate::search::{SearchOptions, DEFAULT_MAX_RESULTS};
use crate::tokenizer::TokenizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SNIPPET_LENGTH: usize = 200;

/// Engine-wide defaults, loadable from a JSON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub default_max_results: usize,
    pub histogram_buckets: usize,
    pub snippet_length: usize,
    pub tokenizer: TokenizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            default_max_results: DEFAULT_MAX_RESULTS,
            histogram_buckets: DEFAULT_BUCKETS,
            snippet_length: DEFAULT_SNIPPET_LENGTH,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            context: "read config",
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| Error::Json { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bm25.validate()?;
        if self.default_max_results == 0 {
            return Err(Error::validation("default_max_results must be at least 1"));
        }
        if self.histogram_buckets == 0 {
            return Err(Error::validation("histogram_buckets must be at least 1"));
        }
        if self.snippet_length == 0 {
            return Err(Error::validation("snippet_length must be at least 1"));
        }
        Ok(())
    }

    /// Search options seeded from this configuration.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions { max_results: self.default_max_results, bm25: self.bm25, ..SearchOptions::default() }
    }
}
