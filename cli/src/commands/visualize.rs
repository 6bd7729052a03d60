use super::{App, QueryArgs};
use crate::chart;
use crate::output::{self, Format};
use anyhow::Result;
use bm25_core::{Relevance, ResultSet, Statistics};
use clap::Subcommand;
use std::collections::BTreeMap;

const WIDTH: usize = 40;

#[derive(Subcommand)]
pub enum VisualizeCommand {
    /// Histogram of result scores
    Distribution {
        #[command(flatten)]
        args: QueryArgs,
        #[arg(long)]
        buckets: Option<usize>,
    },
    /// Mean score per category
    Categories {
        #[command(flatten)]
        args: QueryArgs,
    },
    /// Score of each result in rank order, with quartiles and outliers
    Range {
        #[command(flatten)]
        args: QueryArgs,
    },
}

pub fn run(app: &App, cmd: VisualizeCommand) -> Result<()> {
    match cmd {
        VisualizeCommand::Distribution { args, buckets } => {
            let (rs, stats) = analyse(app, &args, buckets)?;
            if non_text(app.format, &stats)? || empty(&rs) {
                return Ok(());
            }
            println!("Score distribution for {:?} ({} results)\n", rs.query, stats.count);
            let labels: Vec<String> = stats.histogram.iter().map(|b| b.label.clone()).collect();
            let counts: Vec<f64> = stats.histogram.iter().map(|b| b.count as f64).collect();
            print!("{}", chart::render(&labels, &counts, WIDTH));
            println!("\nmean {:.4}  median {:.4}  std dev {:.4}", stats.mean, stats.median, stats.std_dev);
        }
        VisualizeCommand::Categories { args } => {
            let (rs, stats) = analyse(app, &args, None)?;
            if non_text(app.format, &stats)? || empty(&rs) {
                return Ok(());
            }
            println!("Mean score by category for {:?}\n", rs.query);
            let labels: Vec<String> =
                stats.categories.iter().map(|c| format!("{} (n={})", c.category, c.count)).collect();
            let means: Vec<f64> = stats.categories.iter().map(|c| c.mean).collect();
            print!("{}", chart::render(&labels, &means, WIDTH));
        }
        VisualizeCommand::Range { args } => {
            let (rs, stats) = analyse(app, &args, None)?;
            if non_text(app.format, &stats)? || empty(&rs) {
                return Ok(());
            }
            let q = stats.quartiles;
            println!("Scores in rank order for {:?}\n", rs.query);
            print!("{}", chart::series(&rs.scores(), WIDTH));
            println!("\nmin {:.4}  q1 {:.4}  median {:.4}  q3 {:.4}  max {:.4}", stats.min, q.q1, q.q2, q.q3, stats.max);
            println!("IQR {:.4}, fences [{:.4}, {:.4}]", q.iqr, q.lower_fence, q.upper_fence);
            if !stats.outliers.is_empty() {
                let ids: Vec<String> = stats.outliers.iter().map(|id| id.to_string()).collect();
                println!("Outliers: {}", ids.join(", "));
            }
            let best = rs.best_score().unwrap_or(0.0);
            let mut tiers: BTreeMap<String, usize> = BTreeMap::new();
            for r in &rs {
                *tiers.entry(Relevance::classify(r.score, best).to_string()).or_default() += 1;
            }
            let tiers: Vec<String> = tiers.iter().map(|(t, n)| format!("{t} {n}")).collect();
            println!("Relevance: {}", tiers.join(", "));
        }
    }
    Ok(())
}

fn analyse(app: &App, args: &QueryArgs, buckets: Option<usize>) -> Result<(ResultSet, Statistics)> {
    let opts = args.options(&app.index, Some(100));
    let rs = app.index.search(&args.query, &opts)?;
    let stats = app.index.stats(&rs, buckets.unwrap_or(app.index.config().histogram_buckets))?;
    Ok((rs, stats))
}

/// Charts are text-only; other formats get the underlying statistics.
fn non_text(format: Format, stats: &Statistics) -> Result<bool> {
    match format {
        Format::Text => Ok(false),
        Format::Json => output::print_json(stats).map(|_| true),
        Format::Csv => output::print_csv(
            &["lower", "upper", "count"],
            stats.histogram.iter().map(|b| [b.lower.to_string(), b.upper.to_string(), b.count.to_string()]),
        )
        .map(|_| true),
    }
}

fn empty(rs: &ResultSet) -> bool {
    if rs.is_empty() {
        println!("No documents matched {:?}.", rs.query);
    }
    rs.is_empty()
}
