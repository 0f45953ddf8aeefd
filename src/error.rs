use std::path::PathBuf;

/// Top-level error type for a license scan.
///
/// Every failure mode surfaces as exactly one of these variants; nothing in
/// the pipeline panics or returns a partial report.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Malformed option values (bad directory, nonsense depth, etc.)
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The target directory has no package.json
    #[error("no package.json file found in {}", directory.display())]
    MissingManifest { directory: PathBuf },

    /// Reading the installed package tree failed outright
    #[error("failed to read installed tree: {reason}")]
    TreeRead { reason: String },

    /// A matched license/readme file could not be read
    #[error("failed to read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a matched file exceeded the configured timeout
    #[error("timed out reading license evidence under {}", directory.display())]
    ReadTimeout { directory: PathBuf },

    /// The directory search itself failed (unreadable directory, broken walk)
    #[error("file search failed: {reason}")]
    Glob { reason: String },

    /// A collection worker thread panicked
    #[error("license collection worker panicked for {package}")]
    Join { package: String },
}

impl ScanError {
    pub fn tree_read(err: impl std::fmt::Display) -> Self {
        ScanError::TreeRead {
            reason: err.to_string(),
        }
    }

    pub fn glob(err: impl std::fmt::Display) -> Self {
        ScanError::Glob {
            reason: err.to_string(),
        }
    }
}
