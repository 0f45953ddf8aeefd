use std::path::PathBuf;

use serde_json::Value;

/// One license expression as declared in a manifest.
///
/// Manifests in the wild value their license fields as either a bare string
/// or a `{type, url}` object; both shapes normalize to this union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpr {
    Simple(String),
    Structured {
        kind: Option<String>,
        url: Option<String>,
    },
}

impl LicenseExpr {
    fn from_value(value: &Value) -> Option<LicenseExpr> {
        match value {
            Value::String(text) => Some(LicenseExpr::Simple(text.clone())),
            Value::Object(fields) => Some(LicenseExpr::Structured {
                kind: fields
                    .get("type")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                url: fields
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            }),
            _ => None,
        }
    }

    /// Render the expression for report output.
    pub fn summary(&self) -> String {
        match self {
            LicenseExpr::Simple(text) => text.clone(),
            LicenseExpr::Structured { kind, url } => match (kind, url) {
                (Some(kind), Some(url)) => format!("{} ({})", kind, url),
                (Some(kind), None) => kind.clone(),
                (None, Some(url)) => url.clone(),
                (None, None) => "(unspecified)".to_string(),
            },
        }
    }
}

/// One discrete piece of license-relevant data, tagged by where it came from.
#[derive(Debug, Clone)]
pub enum EvidenceItem {
    /// A license expression declared in the package manifest
    PackageDeclaration(LicenseExpr),
    /// The full contents of a matched license/readme file
    FileContent { path: PathBuf, text: String },
}

/// The evidence gathered for one package, bucketed by source category.
///
/// Buckets are append-only and keep insertion order. Items are never
/// deduplicated across buckets: a license legitimately shows up both as a
/// manifest declaration and as a file on disk.
#[derive(Debug, Clone, Default)]
pub struct LicenseCollection {
    pub package: Vec<EvidenceItem>,
    pub license: Vec<EvidenceItem>,
    pub readme: Vec<EvidenceItem>,
}

impl LicenseCollection {
    pub fn new() -> Self {
        LicenseCollection::default()
    }

    /// Declared expressions from the manifest, in encounter order.
    pub fn declared(&self) -> Vec<&LicenseExpr> {
        self.package
            .iter()
            .filter_map(|item| match item {
                EvidenceItem::PackageDeclaration(expr) => Some(expr),
                EvidenceItem::FileContent { .. } => None,
            })
            .collect()
    }

    /// Paths of the matched files in a category bucket.
    pub fn file_paths(bucket: &[EvidenceItem]) -> Vec<&PathBuf> {
        bucket
            .iter()
            .filter_map(|item| match item {
                EvidenceItem::FileContent { path, .. } => Some(path),
                EvidenceItem::PackageDeclaration(_) => None,
            })
            .collect()
    }
}

/// Normalize the license fields of a parsed manifest into a flat list.
///
/// Accepted shapes, in encounter order:
/// - `license` as a string or object (one expression)
/// - `licenses` as an array of strings/objects (one expression per element)
/// - `licenses` as a bare string/object — malformed but observed in the wild,
///   still accepted as a single expression
pub fn normalize_license_fields(manifest: &Value) -> Vec<LicenseExpr> {
    let mut expressions = Vec::new();

    if let Some(license) = manifest.get("license") {
        if let Some(expr) = LicenseExpr::from_value(license) {
            expressions.push(expr);
        }
    }

    match manifest.get("licenses") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                if let Some(expr) = LicenseExpr::from_value(entry) {
                    expressions.push(expr);
                }
            }
        }
        Some(other) => {
            if let Some(expr) = LicenseExpr::from_value(other) {
                expressions.push(expr);
            }
        }
        None => {}
    }

    expressions
}
