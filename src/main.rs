use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use colored::Colorize;

mod collector;
mod error;
mod evidence;
mod finder;
mod format;
mod options;
mod record;
mod traverse;
mod tree;

use options::{FindOptions, SummaryMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root directory containing package.json
    #[arg(index = 1, value_name = "DIRECTORY", default_value = ".")]
    directory: PathBuf,

    /// Only include production dependencies (exclude devDependencies)
    #[arg(long, action = ArgAction::SetTrue)]
    production: bool,

    /// Traversal depth; omit to walk the whole tree
    #[arg(long, value_name = "DEPTH")]
    depth: Option<usize>,

    /// Collapse multiple versions of the same package into one record
    #[arg(long = "prune-forks", action = ArgAction::SetTrue)]
    prune_forks: bool,

    /// Summary mode: simple or detail (detail prints traversal statistics)
    #[arg(long, value_name = "MODE", default_value = "simple")]
    summary: String,

    /// Output the report as CSV
    #[arg(long, action = ArgAction::SetTrue)]
    csv: bool,

    /// Output file path (defaults to stdout)
    #[arg(short, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,

    /// Per-file read timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,
}

fn main() {
    let args = Args::parse();

    let summary_mode = match SummaryMode::parse(&args.summary) {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let options = FindOptions {
        directory: args.directory,
        production: args.production,
        depth: args.depth,
        prune_forks: args.prune_forks,
        summary_mode,
        read_timeout: Duration::from_secs(args.timeout),
    };

    let report = match finder::find(&options) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    // Keep the note on stderr; an empty report still renders (header-only
    // CSV, empty standard output) so pipelines and -o targets see a result
    if report.is_empty() {
        eprintln!("{}", "No packages found.".yellow());
    }

    let rendered = if args.csv {
        format::render_csv(&report)
    } else {
        format::render_standard(&report)
    };

    match args.output {
        Some(path) => {
            if let Err(err) = fs::write(&path, rendered) {
                eprintln!(
                    "{} failed to write {}: {}",
                    "error:".red().bold(),
                    path.display(),
                    err
                );
                std::process::exit(1);
            }
            eprintln!("Report written to {}", path.display());
        }
        None => {
            print!("{}", rendered);
        }
    }
}
