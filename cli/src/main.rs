use anyhow::Result;
use bm25_core::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

mod chart;
mod commands;
mod import;
mod output;

use commands::{corpus::CorpusCommand, doc::DocCommand, search::SearchCommand, visualize::VisualizeCommand};
use output::Format;

#[derive(Parser)]
#[command(name = "bm25")]
#[command(about = "Index documents and explore BM25 relevance rankings", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, global = true, default_value = "./index")]
    index: PathBuf,
    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, import, inspect or clear the corpus
    #[command(subcommand)]
    Corpus(CorpusCommand),
    /// Add, update, delete or show single documents
    #[command(subcommand)]
    Doc(DocCommand),
    /// Run, analyse, explain and compare searches
    #[command(subcommand)]
    Search(SearchCommand),
    /// ASCII charts of score distributions
    #[command(subcommand)]
    Visualize(VisualizeCommand),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(cli: Cli) -> Result<()> {
    let app = commands::App::open(&cli.index, cli.config.as_deref(), cli.format)?;
    match cli.command {
        Commands::Corpus(cmd) => commands::corpus::run(&app, cmd),
        Commands::Doc(cmd) => commands::doc::run(&app, cmd),
        Commands::Search(cmd) => commands::search::run(&app, cmd),
        Commands::Visualize(cmd) => commands::visualize::run(&app, cmd),
    }
}

/// Category-specific guidance for engine errors.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.downcast_ref::<bm25_core::Error>()?;
    Some(match err.kind() {
        ErrorKind::Validation => "check the query syntax: words, field:word, \"phrases\" and -exclusions",
        ErrorKind::NotFound => "list documents with `bm25 search query <words>` to find valid ids",
        ErrorKind::DuplicateDocument => "omit the id to let the index assign one",
        ErrorKind::EmptyCorpus => "populate the index first with `bm25 corpus generate` or `bm25 corpus import`",
        ErrorKind::Schema => "documents use the fields title, content and category",
        ErrorKind::Cancelled => "the search was aborted; run it again",
        ErrorKind::Storage => "the index directory may be damaged; remove it to start over",
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = hint(&err) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
