use std::cmp::Ordering;
use std::path::PathBuf;

use crate::evidence::LicenseCollection;
use crate::tree::PackageNode;

/// Sentinel for packages whose manifest declares no repository.
pub const NO_REPOSITORY: &str = "(none)";

/// One resolved package with its gathered license evidence.
///
/// Immutable once the collection phase finishes; the report only reads it.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    /// Identity key, unique within one scan's output
    pub id: String,
    pub name: String,
    pub version: String,
    pub directory: PathBuf,
    pub repository: String,
    pub license_sources: LicenseCollection,
}

impl PackageRecord {
    pub fn from_node(node: &PackageNode) -> Self {
        let id = node.effective_id();
        let name = if node.name.is_empty() {
            id.clone()
        } else {
            node.name.clone()
        };

        PackageRecord {
            id,
            name,
            version: node.version.clone(),
            directory: node.path.clone(),
            repository: node
                .repository
                .clone()
                .unwrap_or_else(|| NO_REPOSITORY.to_string()),
            license_sources: LicenseCollection::new(),
        }
    }
}

/// Total, deterministic ordering for the final report: case-insensitive
/// lexicographic by name, then version ascending for equal names.
pub fn compare_module_names(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    let by_name = a.name.to_lowercase().cmp(&b.name.to_lowercase());
    match by_name {
        Ordering::Equal => a.version.cmp(&b.version),
        other => other,
    }
}
