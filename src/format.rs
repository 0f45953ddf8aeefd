use std::fmt::Write as _;

use crate::evidence::LicenseCollection;
use crate::record::PackageRecord;

/// Render the report as human-readable blocks, one per package.
pub fn render_standard(records: &[PackageRecord]) -> String {
    let mut output = String::new();

    for record in records {
        let _ = writeln!(output, "{}@{}", record.name, record.version);
        let _ = writeln!(output, "  directory:  {}", record.directory.display());
        let _ = writeln!(output, "  repository: {}", record.repository);
        let _ = writeln!(output, "  declared:   {}", declared_summary(record));

        let license_files = LicenseCollection::file_paths(&record.license_sources.license);
        for path in license_files {
            let _ = writeln!(output, "  license file: {}", path.display());
        }
        let readme_files = LicenseCollection::file_paths(&record.license_sources.readme);
        for path in readme_files {
            let _ = writeln!(output, "  readme file:  {}", path.display());
        }

        output.push('\n');
    }

    output
}

/// Render the report as CSV: name,version,directory,repository,licenses.
pub fn render_csv(records: &[PackageRecord]) -> String {
    let mut output = String::from("name,version,directory,repository,licenses\n");

    for record in records {
        let _ = writeln!(
            output,
            "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"",
            csv_field(&record.name),
            csv_field(&record.version),
            csv_field(&record.directory.display().to_string()),
            csv_field(&record.repository),
            csv_field(&declared_summary(record)),
        );
    }

    output
}

fn declared_summary(record: &PackageRecord) -> String {
    let declared = record.license_sources.declared();
    if declared.is_empty() {
        return "(none declared)".to_string();
    }
    declared
        .iter()
        .map(|expr| expr.summary())
        .collect::<Vec<String>>()
        .join("; ")
}

// Commas and quotes inside a field would break naive CSV consumers
fn csv_field(value: &str) -> String {
    value.replace(',', " ").replace('"', "'")
}
