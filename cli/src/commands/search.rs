use super::{parse_weight, App, QueryArgs};
use crate::output::{self, Format};
use anyhow::Result;
use bm25_core::compare::Comparison;
use bm25_core::{DocId, Explanation, Relevance, ResultSet, SearchPage, Statistics};
use clap::Subcommand;
use serde::Serialize;

#[derive(Subcommand)]
pub enum SearchCommand {
    /// Rank documents for a query
    Query {
        #[command(flatten)]
        args: QueryArgs,
        /// Attach per-term score breakdowns
        #[arg(long)]
        explain: bool,
        /// Show a highlighted excerpt under each result
        #[arg(long)]
        snippets: bool,
    },
    /// Score distribution of a query's results
    Stats {
        #[command(flatten)]
        args: QueryArgs,
        #[arg(long)]
        buckets: Option<usize>,
    },
    /// Break one document's score into per-term, per-field parts
    Explain {
        id: DocId,
        #[command(flatten)]
        args: QueryArgs,
    },
    /// Compare equal weighting against the given field weights
    Compare {
        #[command(flatten)]
        args: QueryArgs,
        /// Weights of the baseline strategy (equal weighting when omitted)
        #[arg(long = "baseline-weight", value_parser = parse_weight)]
        baseline_weights: Vec<(String, f64)>,
    },
}

#[derive(Serialize)]
struct ResultRow {
    rank: usize,
    doc_id: DocId,
    score: f64,
    relevance: Relevance,
    category: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snippet: Option<String>,
}

pub fn run(app: &App, cmd: SearchCommand) -> Result<()> {
    match cmd {
        SearchCommand::Query { args, explain, snippets } => {
            let opts = args.options(&app.index, None).with_explain(explain);
            let page = app.index.search_page(&args.query, &opts)?;
            print_results(app.format, &page.results, &rows(&page, snippets))
        }
        SearchCommand::Stats { args, buckets } => {
            let opts = args.options(&app.index, Some(100));
            let rs = app.index.search(&args.query, &opts)?;
            let stats = app.index.stats(&rs, buckets.unwrap_or(app.index.config().histogram_buckets))?;
            print_stats(app.format, &args.query, &stats)
        }
        SearchCommand::Explain { id, args } => {
            let opts = args.options(&app.index, None);
            let e = app.index.explain(id, &args.query, &opts)?;
            print_explanation(app.format, &e)
        }
        SearchCommand::Compare { args, baseline_weights } => {
            let weighted = args.options(&app.index, None);
            let mut baseline = weighted.clone();
            baseline.field_weights = baseline_weights.into_iter().collect();
            let c = app.index.compare(&args.query, &baseline, &weighted)?;
            print_comparison(app, &c)
        }
    }
}

fn rows(page: &SearchPage, snippets: bool) -> Vec<ResultRow> {
    let best = page.results.best_score().unwrap_or(0.0);
    page.hits()
        .enumerate()
        .map(|(i, (r, doc))| ResultRow {
            rank: i + 1,
            doc_id: r.doc_id,
            score: r.score,
            relevance: Relevance::classify(r.score, best),
            category: r.category.clone().unwrap_or_default(),
            title: doc.field_text(0).to_string(),
            snippet: snippets.then(|| page.snippet(doc)),
        })
        .collect()
}

fn print_results(format: Format, rs: &ResultSet, rows: &[ResultRow]) -> Result<()> {
    match format {
        Format::Json => {
            #[derive(Serialize)]
            struct Out<'a> {
                results: &'a ResultSet,
                rows: &'a [ResultRow],
            }
            output::print_json(&Out { results: rs, rows })
        }
        Format::Csv => output::print_csv(
            &["rank", "doc_id", "score", "relevance", "category", "title"],
            rows.iter().map(|r| {
                [
                    r.rank.to_string(),
                    r.doc_id.to_string(),
                    format!("{:.6}", r.score),
                    r.relevance.to_string(),
                    r.category.clone(),
                    r.title.clone(),
                ]
            }),
        ),
        Format::Text => {
            println!("Query: {:?}  ({} of {} matches)\n", rs.query, rows.len(), rs.total_hits);
            if rows.is_empty() {
                println!("No documents matched.");
                return Ok(());
            }
            println!("{:<5} {:<6} {:<10} {:<10} {:<12} Title", "Rank", "ID", "Score", "Relevance", "Category");
            println!("{}", "-".repeat(76));
            for (row, result) in rows.iter().zip(rs) {
                println!(
                    "{:<5} {:<6} {:<10.4} {:<10} {:<12} {}",
                    row.rank,
                    row.doc_id,
                    row.score,
                    row.relevance.to_string(),
                    output::truncate(&row.category, 12),
                    output::truncate(&row.title, 40)
                );
                if let Some(snippet) = &row.snippet {
                    println!("      {snippet}");
                }
                for part in result.breakdown.iter().flatten() {
                    println!(
                        "      {:<14} {:<10} tf={:<3} idf={:.4} norm={:.4} -> {:.4}",
                        part.term, part.field, part.tf, part.idf, part.length_norm, part.score
                    );
                }
            }
            Ok(())
        }
    }
}

fn print_stats(format: Format, query: &str, s: &Statistics) -> Result<()> {
    match format {
        Format::Json => output::print_json(s),
        Format::Csv => {
            let mut rows = vec![
                ["count".to_string(), s.count.to_string()],
                ["min".into(), s.min.to_string()],
                ["max".into(), s.max.to_string()],
                ["mean".into(), s.mean.to_string()],
                ["median".into(), s.median.to_string()],
                ["std_dev".into(), s.std_dev.to_string()],
            ];
            rows.extend(s.percentiles.iter().map(|p| [format!("p{}", p.rank), p.value.to_string()]));
            output::print_csv(&["metric", "value"], rows)
        }
        Format::Text => {
            println!("Score statistics for {query:?}");
            println!("Results: {}", s.count);
            if s.count == 0 {
                return Ok(());
            }
            println!("Min: {:.4}  Max: {:.4}  Mean: {:.4}  Median: {:.4}  Std dev: {:.4}", s.min, s.max, s.mean, s.median, s.std_dev);
            let ps: Vec<String> = s.percentiles.iter().map(|p| format!("p{}={:.4}", p.rank, p.value)).collect();
            println!("Percentiles: {}", ps.join("  "));
            println!("\nHistogram:");
            for b in &s.histogram {
                println!("  {:<18} {}", b.label, b.count);
            }
            if !s.categories.is_empty() {
                println!("\nCategories:");
                for c in &s.categories {
                    println!("  {:<14} n={:<4} mean={:.4} min={:.4} max={:.4}", c.category, c.count, c.mean, c.min, c.max);
                }
            }
            Ok(())
        }
    }
}

fn print_explanation(format: Format, e: &Explanation) -> Result<()> {
    match format {
        Format::Json => output::print_json(e),
        Format::Csv => output::print_csv(
            &["term", "field", "weight", "tf", "idf", "field_length", "avg_field_length", "length_norm", "score"],
            e.contributions.iter().map(|c| {
                [
                    c.term.clone(),
                    c.field.clone(),
                    c.weight.to_string(),
                    c.tf.to_string(),
                    c.idf.to_string(),
                    c.field_length.to_string(),
                    c.avg_field_length.to_string(),
                    c.length_norm.to_string(),
                    c.score.to_string(),
                ]
            }),
        ),
        Format::Text => {
            println!("Document {} for {:?}", e.doc_id, e.query);
            println!("Total score: {:.6}{}", e.score, if e.matched { "" } else { "  (does not match the query)" });
            println!("Length: {} tokens (corpus average {:.1})\n", e.total_length, e.avg_document_length);
            for f in &e.fields {
                println!(
                    "{:<10} weight={:<5} len={:<4} avg={:<8.2} norm={:.4} score={:.6}",
                    f.field, f.weight, f.length, f.avg_length, f.length_norm, f.score
                );
                for t in &f.terms {
                    println!("    {:<16} tf={:<3} idf={:.4} -> {:.6}", t.term, t.tf, t.idf, t.score);
                }
            }
            Ok(())
        }
    }
}

fn print_comparison(app: &App, c: &Comparison) -> Result<()> {
    match app.format {
        Format::Json => output::print_json(c),
        Format::Csv => output::print_csv(
            &["rank", "baseline_id", "baseline_score", "weighted_id", "weighted_score", "change"],
            c.rows.iter().map(|r| {
                let side = |s: &Option<bm25_core::ScoredResult>| {
                    s.as_ref().map_or((String::new(), String::new()), |s| (s.doc_id.to_string(), s.score.to_string()))
                };
                let (bid, bs) = side(&r.baseline);
                let (wid, ws) = side(&r.weighted);
                [r.rank.to_string(), bid, bs, wid, ws, r.change.to_string()]
            }),
        ),
        Format::Text => {
            println!("Strategy comparison for {:?}", c.query);
            println!("Baseline: {} results, weighted: {} results\n", c.baseline.len(), c.weighted.len());
            println!("{:<4} {:<30} {:<12} {:<12} {:<10}", "Rank", "Document", "Baseline", "Weighted", "Change");
            println!("{}", "-".repeat(70));
            for r in &c.rows {
                let id = r.baseline.as_ref().or(r.weighted.as_ref()).map(|s| s.doc_id);
                let title = id
                    .and_then(|id| app.index.document(id).ok())
                    .map(|d| output::truncate(d.field_text(0), 28))
                    .unwrap_or_else(|| "N/A".into());
                let score = |s: &Option<bm25_core::ScoredResult>| s.as_ref().map_or(0.0, |s| s.score);
                println!(
                    "{:<4} {:<30} {:<12.4} {:<12.4} {:<10}",
                    r.rank,
                    title,
                    score(&r.baseline),
                    score(&r.weighted),
                    r.change.to_string()
                );
            }
            println!("\nCommon documents: {}", c.common.len());
            if !c.only_baseline.is_empty() {
                println!("Unique to baseline: {}", c.only_baseline.len());
            }
            if !c.only_weighted.is_empty() {
                println!("Unique to weighted: {}", c.only_weighted.len());
            }
            Ok(())
        }
    }
}
