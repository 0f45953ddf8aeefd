use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::evidence::{normalize_license_fields, EvidenceItem};
use crate::record::PackageRecord;
use crate::tree::PackageNode;

// Matches license/licence (and the lisense/lisence misspellings seen in
// published packages) anywhere in a file name, case-insensitively
static LICENSE_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)li[cs]en[cs]e").unwrap()
});

static README_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)readme").unwrap()
});

// Dependency-manager directories are never part of a package's own evidence
const EXCLUDED_DIRS: [&str; 2] = ["node_modules", "bower_components"];

/// Gather the license evidence for one package.
///
/// Stages run in order: license-file search, license reads, readme search,
/// readme reads, manifest extraction. Any failed stage fails the package.
pub fn collect(node: &PackageNode, read_timeout: Duration) -> Result<PackageRecord, ScanError> {
    let mut record = PackageRecord::from_node(node);

    let license_files = find_evidence_files(&node.path, &LICENSE_FILE_PATTERN)?;
    record.license_sources.license = read_file_sources(license_files, read_timeout, &node.path)?;

    let readme_files = find_evidence_files(&node.path, &README_FILE_PATTERN)?;
    record.license_sources.readme = read_file_sources(readme_files, read_timeout, &node.path)?;

    for expr in normalize_license_fields(&node.manifest) {
        record
            .license_sources
            .package
            .push(EvidenceItem::PackageDeclaration(expr));
    }

    Ok(record)
}

/// Search a package's directory subtree for regular files whose name matches
/// `pattern`, skipping dependency-manager directories at any depth.
/// Results come back in sorted path order.
pub fn find_evidence_files(directory: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, ScanError> {
    let walker = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry));

    let mut matches = Vec::new();
    for entry in walker {
        let entry = entry.map_err(ScanError::glob)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if pattern.is_match(&file_name) {
            matches.push(entry.into_path());
        }
    }

    Ok(matches)
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    EXCLUDED_DIRS.iter().any(|excluded| name == *excluded)
}

/// Read every matched file, fanning the reads out on threads and joining
/// them through a channel.
///
/// All reads settle before any error is reported; the error for the earliest
/// path wins. A read that exceeds `timeout` fails the package outright.
fn read_file_sources(
    paths: Vec<PathBuf>,
    timeout: Duration,
    directory: &Path,
) -> Result<Vec<EvidenceItem>, ScanError> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }

    let (sender, receiver) = mpsc::channel();
    for (index, path) in paths.iter().cloned().enumerate() {
        let sender = sender.clone();
        thread::spawn(move || {
            let result = fs::read_to_string(&path);
            // receiver may be gone already if a sibling timed out
            let _ = sender.send((index, result));
        });
    }
    drop(sender);

    let mut settled: Vec<(usize, std::io::Result<String>)> = Vec::with_capacity(paths.len());
    for _ in 0..paths.len() {
        match receiver.recv_timeout(timeout) {
            Ok(outcome) => settled.push(outcome),
            Err(_) => {
                return Err(ScanError::ReadTimeout {
                    directory: directory.to_path_buf(),
                })
            }
        }
    }

    // Restore matched-path order before deciding which error surfaces
    settled.sort_by_key(|(index, _)| *index);

    let mut items = Vec::with_capacity(paths.len());
    for (index, result) in settled {
        let path = paths[index].clone();
        let text = result.map_err(|source| ScanError::FileAccess {
            path: path.clone(),
            source,
        })?;
        items.push(EvidenceItem::FileContent { path, text });
    }

    Ok(items)
}
