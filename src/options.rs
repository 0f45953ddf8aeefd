use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScanError;

/// How much diagnostic output the scan emits alongside the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    Simple,
    Detail,
}

impl SummaryMode {
    pub fn parse(value: &str) -> Result<Self, ScanError> {
        match value.to_lowercase().as_str() {
            "simple" => Ok(SummaryMode::Simple),
            "detail" => Ok(SummaryMode::Detail),
            other => Err(ScanError::Configuration {
                reason: format!("summary mode must be 'simple' or 'detail', got '{}'", other),
            }),
        }
    }
}

/// Options for one license scan.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Project root to scan; must contain a package.json
    pub directory: PathBuf,
    /// Exclude packages reachable only through devDependencies edges
    pub production: bool,
    /// Traversal depth; None walks until the tree is exhausted
    pub depth: Option<usize>,
    /// Collapse distinct versions of the same package name into one record
    pub prune_forks: bool,
    pub summary_mode: SummaryMode,
    /// Upper bound on any single evidence-file read
    pub read_timeout: Duration,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            directory: PathBuf::from("."),
            production: false,
            depth: None,
            prune_forks: false,
            summary_mode: SummaryMode::Simple,
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl FindOptions {
    /// Check option values before any traversal work starts.
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.directory.is_dir() {
            return Err(ScanError::Configuration {
                reason: format!("'{}' is not a directory", self.directory.display()),
            });
        }

        if self.read_timeout.is_zero() {
            return Err(ScanError::Configuration {
                reason: "read timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
