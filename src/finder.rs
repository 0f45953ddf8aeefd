use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use colored::Colorize;

use crate::collector;
use crate::error::ScanError;
use crate::options::{FindOptions, SummaryMode};
use crate::record::{self, PackageRecord};
use crate::traverse::{self, TraverseOptions, TraverseOutcome};
use crate::tree::{self, PackageNode};

/// Run one full license scan: read the installed tree, walk it, gather the
/// license evidence for every unique package and return the sorted report.
pub fn find(options: &FindOptions) -> Result<Vec<PackageRecord>, ScanError> {
    options.validate()?;

    // Refuse early rather than walking a directory that is not a project root
    if !options.directory.join("package.json").is_file() {
        return Err(ScanError::MissingManifest {
            directory: options.directory.clone(),
        });
    }

    let root = tree::read_installed(&options.directory)?;

    let outcome = traverse::traverse(
        &root,
        &TraverseOptions {
            depth: options.depth,
            include_dev: !options.production,
            prune_forks: options.prune_forks,
        },
    );

    if options.summary_mode == SummaryMode::Detail {
        print_traversal_stats(&outcome);
    }

    let records = collect_all(&outcome.modules, options.read_timeout)?;
    Ok(assemble(records))
}

/// Fan the evidence collection out, one worker per unique package, and join
/// them all. The first error (in module order) wins, but only after every
/// sibling has settled; later results are simply discarded.
fn collect_all(
    modules: &[&PackageNode],
    read_timeout: Duration,
) -> Result<Vec<PackageRecord>, ScanError> {
    thread::scope(|scope| {
        let workers: Vec<_> = modules
            .iter()
            .map(|node| {
                let node: &PackageNode = node;
                scope.spawn(move || collector::collect(node, read_timeout))
            })
            .collect();

        let mut records = Vec::with_capacity(modules.len());
        let mut first_error: Option<ScanError> = None;

        for (worker, node) in workers.into_iter().zip(modules) {
            match worker.join() {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Err(_) => {
                    if first_error.is_none() {
                        first_error = Some(ScanError::Join {
                            package: node.effective_id(),
                        });
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(records),
        }
    })
}

/// Merge completed records by identity key, then order the report.
fn assemble(records: Vec<PackageRecord>) -> Vec<PackageRecord> {
    let mut merged: HashMap<String, PackageRecord> = HashMap::new();
    for record in records {
        merged.insert(record.id.clone(), record);
    }

    let mut report: Vec<PackageRecord> = merged.into_values().collect();
    report.sort_by(record::compare_module_names);
    report
}

/// Detail-mode diagnostics, kept on stderr so stdout stays machine-readable.
fn print_traversal_stats(outcome: &TraverseOutcome) {
    eprintln!(
        "{}",
        "============================ STATS ===========================".bold()
    );
    eprintln!("deep module count:   {}", outcome.deep_count);
    eprintln!("unique module count: {}", outcome.modules.len());

    let extraneous = outcome.modules.iter().filter(|m| m.extraneous).count();
    if extraneous > 0 {
        eprintln!("extraneous modules:  {}", extraneous);
    }

    if !outcome.forks.is_empty() {
        eprintln!(
            "{}",
            "============================ FORKS ===========================".bold()
        );
        for (name, versions) in &outcome.forks {
            eprintln!("{}: {}", name.yellow(), versions.join(", "));
        }
    }

    eprintln!(
        "{}",
        "==============================================================".bold()
    );
}
