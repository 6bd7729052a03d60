use super::App;
use crate::chart;
use crate::import;
use crate::output::{self, Format};
use anyhow::Result;
use bm25_core::corpus::{CorpusGenerator, CorpusReport, GeneratorOptions, DEFAULT_CATEGORIES};
use clap::Subcommand;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Subcommand)]
pub enum CorpusCommand {
    /// Generate a synthetic corpus and add it to the index
    Generate {
        /// Number of documents
        #[arg(long, default_value_t = 100)]
        size: usize,
        /// Comma-separated categories
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CATEGORIES.map(String::from))]
        categories: Vec<String>,
        #[arg(long, default_value_t = 50)]
        min_tokens: usize,
        #[arg(long, default_value_t = 500)]
        max_tokens: usize,
        /// RNG seed; defaults to the current time
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Import documents from a JSON/JSONL file or directory
    Import {
        input: PathBuf,
    },
    /// Show corpus statistics
    Stats,
    /// Remove every document
    Clear,
}

pub fn run(app: &App, cmd: CorpusCommand) -> Result<()> {
    match cmd {
        CorpusCommand::Generate { size, categories, min_tokens, max_tokens, seed } => {
            let seed = seed.unwrap_or_else(|| {
                SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
            });
            let options = GeneratorOptions { size, categories, min_tokens, max_tokens };
            let docs = CorpusGenerator::new(options, seed)?.generate();
            let ids = app.index.batch_insert(docs)?;
            app.commit()?;
            tracing::info!(seed, count = ids.len(), "generated corpus");
            println!("Generated {} documents (seed {seed}); corpus now holds {}", ids.len(), app.index.len());
        }
        CorpusCommand::Import { input } => {
            let docs = import::load(&input)?;
            let ids = app.index.batch_insert(docs)?;
            app.commit()?;
            println!("Imported {} documents from {}", ids.len(), input.display());
        }
        CorpusCommand::Stats => print_report(app.format, &app.index.corpus_report())?,
        CorpusCommand::Clear => {
            let removed = app.index.clear();
            app.commit()?;
            println!("Removed {removed} documents");
        }
    }
    Ok(())
}

fn print_report(format: Format, r: &CorpusReport) -> Result<()> {
    match format {
        Format::Json => output::print_json(r),
        Format::Csv => output::print_csv(
            &["metric", "value"],
            [
                ["total_documents".to_string(), r.total_documents.to_string()],
                ["total_tokens".to_string(), r.total_tokens.to_string()],
                ["avg_document_length".to_string(), format!("{:.2}", r.avg_document_length)],
                ["median_document_length".to_string(), format!("{:.2}", r.median_document_length)],
                ["min_document_length".to_string(), r.min_document_length.to_string()],
                ["max_document_length".to_string(), r.max_document_length.to_string()],
                ["unique_terms".to_string(), r.unique_terms.to_string()],
            ],
        ),
        Format::Text => {
            println!("Corpus Statistics");
            println!("=================");
            println!("Documents:      {}", r.total_documents);
            println!("Total tokens:   {}", r.total_tokens);
            println!("Unique terms:   {}", r.unique_terms);
            println!(
                "Doc length:     avg {:.1}, median {:.1}, min {}, max {}",
                r.avg_document_length, r.median_document_length, r.min_document_length, r.max_document_length
            );
            for (field, avg) in &r.avg_field_lengths {
                println!("  {field:<12} avg {avg:.1} tokens");
            }
            if let (Some(oldest), Some(newest)) = (r.oldest, r.newest) {
                println!("Created:        {} .. {}", output::rfc3339(oldest), output::rfc3339(newest));
            }
            if !r.categories.is_empty() {
                println!("\nCategories:");
                let labels: Vec<String> = r.categories.keys().cloned().collect();
                let counts: Vec<f64> = r.categories.values().map(|c| *c as f64).collect();
                print!("{}", chart::render(&labels, &counts, 40));
            }
            Ok(())
        }
    }
}
