use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ScanError;

/// One installed package in the raw dependency tree.
///
/// The two dependency maps hold the *declared* names from the manifest; a
/// `None` value means the dependency was declared but could not be resolved
/// on disk. Installed-but-undeclared packages land in the runtime map with
/// the `extraneous` flag set, so they traverse as production dependencies.
#[derive(Debug, Clone)]
pub struct PackageNode {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// Identity key (name@version); None when the manifest gave us nothing
    pub id: Option<String>,
    pub repository: Option<String>,
    pub extraneous: bool,
    /// The parsed package.json, kept for license-field extraction later
    pub manifest: Value,
    pub dependencies: BTreeMap<String, Option<PackageNode>>,
    pub dev_dependencies: BTreeMap<String, Option<PackageNode>>,
}

impl PackageNode {
    /// The identity key, synthesizing a fallback when the manifest had no
    /// usable name/version.
    pub fn effective_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() && id != "@" => id.clone(),
            _ => format!("unknown({})@0.0.0", self.path.display()),
        }
    }

    /// The dedup key used when collapsing forks by name.
    pub fn name_key(&self) -> String {
        if self.name.is_empty() {
            self.effective_id()
        } else {
            self.name.clone()
        }
    }

    /// Resolved children to consider at one traversal level.
    pub fn candidate_children(&self, include_dev: bool) -> Vec<&PackageNode> {
        let mut children: Vec<&PackageNode> = self.dependencies.values().flatten().collect();

        if include_dev {
            children.extend(self.dev_dependencies.values().flatten());
        }

        children
    }
}

/// A package directory as it physically sits on disk, before any declared
/// names have been resolved against the node_modules scope chain.
#[derive(Debug)]
struct RawNode {
    name: String,
    version: String,
    path: PathBuf,
    manifest: Value,
    /// Packages physically installed under this package's node_modules
    installed: BTreeMap<String, RawNode>,
    /// Every name declared by this package or any package nested below it.
    /// A leftover install whose name appears here is hoisted, not extraneous.
    subtree_declared: HashSet<String>,
}

/// Read the installed package tree rooted at `root`.
///
/// The root directory must contain a package.json; nested packages are
/// discovered under node_modules directories (scoped packages included).
/// Declared names resolve npm-style: a package's own node_modules first,
/// then each ancestor's in turn, so hoisted (flat) installs attach to the
/// package that declares them rather than surfacing at the root.
pub fn read_installed(root: &Path) -> Result<PackageNode, ScanError> {
    let raw = read_physical(root)?;
    let mut in_progress = HashSet::new();
    Ok(resolve_node(&raw, &[], &mut in_progress, false))
}

fn read_physical(directory: &Path) -> Result<RawNode, ScanError> {
    let manifest_path = directory.join("package.json");
    let content = fs::read_to_string(&manifest_path).map_err(|e| {
        ScanError::tree_read(format!("{}: {}", manifest_path.display(), e))
    })?;
    let manifest: Value = serde_json::from_str(&content).map_err(|e| {
        ScanError::tree_read(format!("{}: {}", manifest_path.display(), e))
    })?;

    let name = manifest
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let version = manifest
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string();

    let installed = read_installed_children(directory)?;

    let mut subtree_declared: HashSet<String> = declared_names(&manifest, "dependencies")
        .into_iter()
        .chain(declared_names(&manifest, "devDependencies"))
        .collect();
    for child in installed.values() {
        subtree_declared.extend(child.subtree_declared.iter().cloned());
    }

    Ok(RawNode {
        name,
        version,
        path: directory.to_path_buf(),
        manifest,
        installed,
        subtree_declared,
    })
}

/// Build the resolved node for one physical package.
///
/// `outer_scopes` is the node_modules chain visible at this package's
/// physical location, nearest first. `in_progress` holds the directories on
/// the current resolution path; a declared name that loops back onto the
/// path resolves to None instead of recursing forever.
fn resolve_node(
    raw: &RawNode,
    outer_scopes: &[&BTreeMap<String, RawNode>],
    in_progress: &mut HashSet<PathBuf>,
    extraneous: bool,
) -> PackageNode {
    in_progress.insert(raw.path.clone());

    let mut scopes: Vec<&BTreeMap<String, RawNode>> = Vec::with_capacity(outer_scopes.len() + 1);
    scopes.push(&raw.installed);
    scopes.extend_from_slice(outer_scopes);

    let mut dependencies = BTreeMap::new();
    for name in declared_names(&raw.manifest, "dependencies") {
        let child = resolve_name(&name, &scopes, in_progress);
        dependencies.insert(name, child);
    }

    let mut dev_dependencies = BTreeMap::new();
    for name in declared_names(&raw.manifest, "devDependencies") {
        let child = resolve_name(&name, &scopes, in_progress);
        dev_dependencies.insert(name, child);
    }

    // Leftover installs nobody in this subtree declares are extraneous and
    // traverse as production dependencies. Installs some descendant declares
    // are hoisted; the declaring package picks them up through its scope
    // chain, so attaching them here would duplicate the edge.
    for (name, child_raw) in &raw.installed {
        if dependencies.contains_key(name) || dev_dependencies.contains_key(name) {
            continue;
        }
        if raw.subtree_declared.contains(name) {
            continue;
        }
        let child = resolve_node(child_raw, &scopes, in_progress, true);
        dependencies.insert(name.clone(), Some(child));
    }

    in_progress.remove(&raw.path);

    let id = if raw.name.is_empty() {
        None
    } else {
        Some(format!("{}@{}", raw.name, raw.version))
    };

    PackageNode {
        name: raw.name.clone(),
        version: raw.version.clone(),
        path: raw.path.clone(),
        id,
        repository: repository_url(&raw.manifest),
        extraneous,
        manifest: raw.manifest.clone(),
        dependencies,
        dev_dependencies,
    }
}

/// Look a declared name up through the scope chain, innermost first.
fn resolve_name(
    name: &str,
    scopes: &[&BTreeMap<String, RawNode>],
    in_progress: &mut HashSet<PathBuf>,
) -> Option<PackageNode> {
    for (index, scope) in scopes.iter().enumerate() {
        if let Some(raw) = scope.get(name) {
            if in_progress.contains(&raw.path) {
                // dependency cycle; the package already sits on the path
                return None;
            }
            // the found package's own lookups start at its physical parent
            return Some(resolve_node(raw, &scopes[index..], in_progress, false));
        }
    }
    None
}

fn declared_names(manifest: &Value, section: &str) -> Vec<String> {
    manifest
        .get(section)
        .and_then(|v| v.as_object())
        .map(|declared| declared.keys().cloned().collect())
        .unwrap_or_default()
}

/// Enumerate the packages installed directly under `directory`/node_modules.
fn read_installed_children(directory: &Path) -> Result<BTreeMap<String, RawNode>, ScanError> {
    let modules_dir = directory.join("node_modules");
    let mut installed = BTreeMap::new();

    if !modules_dir.is_dir() {
        return Ok(installed);
    }

    for entry_path in list_subdirectories(&modules_dir)? {
        let dir_name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // .bin and friends are not packages
        if dir_name.starts_with('.') {
            continue;
        }

        if dir_name.starts_with('@') {
            // Scope directory: the packages are one level down, named scope/name
            for scoped_path in list_subdirectories(&entry_path)? {
                let scoped_name = scoped_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if scoped_name.starts_with('.') || !scoped_path.join("package.json").is_file() {
                    continue;
                }
                let full_name = format!("{}/{}", dir_name, scoped_name);
                installed.insert(full_name, read_physical(&scoped_path)?);
            }
            continue;
        }

        if !entry_path.join("package.json").is_file() {
            continue;
        }

        installed.insert(dir_name, read_physical(&entry_path)?);
    }

    Ok(installed)
}

fn list_subdirectories(directory: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(directory).map_err(|e| {
        ScanError::tree_read(format!("{}: {}", directory.display(), e))
    })?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ScanError::tree_read(format!("{}: {}", directory.display(), e))
        })?;
        // file_type() does not follow symlinks, so a symlinked node_modules
        // (pnpm-style layout) cannot recurse back into an ancestor
        let file_type = entry.file_type().map_err(|e| {
            ScanError::tree_read(format!("{}: {}", entry.path().display(), e))
        })?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }

    // Directory listing order is filesystem-dependent; sort for determinism
    subdirs.sort();
    Ok(subdirs)
}

/// Extract the repository URL from a manifest's repository field, which may
/// be a bare string or a {type, url} object.
fn repository_url(manifest: &Value) -> Option<String> {
    match manifest.get("repository") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Object(fields)) => fields
            .get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_simple_tree() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "left-pad": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/left-pad"),
            &json!({ "name": "left-pad", "version": "1.3.0", "license": "WTFPL" }),
        );

        let root = read_installed(dir.path()).unwrap();
        assert_eq!(root.name, "root-app");
        assert_eq!(root.effective_id(), "root-app@1.0.0");

        let child = root.dependencies.get("left-pad").unwrap().as_ref().unwrap();
        assert_eq!(child.version, "1.3.0");
        assert!(!child.extraneous);
    }

    #[test]
    fn test_missing_root_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_installed(dir.path()),
            Err(ScanError::TreeRead { .. })
        ));
    }

    #[test]
    fn test_declared_but_uninstalled_dependency_is_none() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "ghost": "^2.0.0" }
            }),
        );

        let root = read_installed(dir.path()).unwrap();
        assert!(root.dependencies.get("ghost").unwrap().is_none());
    }

    #[test]
    fn test_extraneous_package_lands_in_runtime_map() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({ "name": "root-app", "version": "1.0.0" }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/stowaway"),
            &json!({ "name": "stowaway", "version": "0.1.0" }),
        );

        let root = read_installed(dir.path()).unwrap();
        let child = root.dependencies.get("stowaway").unwrap().as_ref().unwrap();
        assert!(child.extraneous);
    }

    #[test]
    fn test_hoisted_transitive_dependency_attaches_to_declaring_parent() {
        // npm v3+ flat layout: root declares a, a declares b, but b is
        // physically installed at the root node_modules
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "a": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/a"),
            &json!({
                "name": "a",
                "version": "1.0.0",
                "dependencies": { "b": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/b"),
            &json!({ "name": "b", "version": "1.0.0" }),
        );

        let root = read_installed(dir.path()).unwrap();

        // b is a's edge, not a root-level extraneous package
        let names: Vec<&String> = root.dependencies.keys().collect();
        assert_eq!(names, vec!["a"]);

        let a = root.dependencies.get("a").unwrap().as_ref().unwrap();
        let b = a.dependencies.get("b").unwrap().as_ref().unwrap();
        assert_eq!(b.effective_id(), "b@1.0.0");
        assert!(!b.extraneous);
    }

    #[test]
    fn test_nested_install_shadows_hoisted_one() {
        // a has its own node_modules/b@2; the root-level b@1 belongs to the
        // root's other consumers
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "a": "^1.0.0", "b": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/b"),
            &json!({ "name": "b", "version": "1.0.0" }),
        );
        let a_dir = dir.path().join("node_modules/a");
        fixtures::write_manifest(
            &a_dir,
            &json!({
                "name": "a",
                "version": "1.0.0",
                "dependencies": { "b": "^2.0.0" }
            }),
        );
        fixtures::write_manifest(
            &a_dir.join("node_modules/b"),
            &json!({ "name": "b", "version": "2.0.0" }),
        );

        let root = read_installed(dir.path()).unwrap();
        let a = root.dependencies.get("a").unwrap().as_ref().unwrap();
        let nested_b = a.dependencies.get("b").unwrap().as_ref().unwrap();
        assert_eq!(nested_b.version, "2.0.0");

        let root_b = root.dependencies.get("b").unwrap().as_ref().unwrap();
        assert_eq!(root_b.version, "1.0.0");
    }

    #[test]
    fn test_hoisted_dependency_cycle_terminates() {
        // a and b declare each other, both installed flat at the root
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "a": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/a"),
            &json!({
                "name": "a",
                "version": "1.0.0",
                "dependencies": { "b": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/b"),
            &json!({
                "name": "b",
                "version": "1.0.0",
                "dependencies": { "a": "^1.0.0" }
            }),
        );

        let root = read_installed(dir.path()).unwrap();
        let a = root.dependencies.get("a").unwrap().as_ref().unwrap();
        let b = a.dependencies.get("b").unwrap().as_ref().unwrap();
        // the back-edge onto the resolution path stays unresolved
        assert!(b.dependencies.get("a").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_node_modules_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({ "name": "root-app", "version": "1.0.0" }),
        );
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        // symlink cycle back to the project root
        std::os::unix::fs::symlink(dir.path(), dir.path().join("node_modules/loopback"))
            .unwrap();

        let root = read_installed(dir.path()).unwrap();
        assert!(root.dependencies.is_empty());
    }

    #[test]
    fn test_scoped_packages() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "dependencies": { "@scope/tool": "^1.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/@scope/tool"),
            &json!({ "name": "@scope/tool", "version": "1.2.3" }),
        );

        let root = read_installed(dir.path()).unwrap();
        let child = root
            .dependencies
            .get("@scope/tool")
            .unwrap()
            .as_ref()
            .unwrap();
        assert_eq!(child.effective_id(), "@scope/tool@1.2.3");
    }

    #[test]
    fn test_dev_dependency_classification() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(
            dir.path(),
            &json!({
                "name": "root-app",
                "version": "1.0.0",
                "devDependencies": { "test-runner": "^5.0.0" }
            }),
        );
        fixtures::write_manifest(
            &dir.path().join("node_modules/test-runner"),
            &json!({ "name": "test-runner", "version": "5.1.0" }),
        );

        let root = read_installed(dir.path()).unwrap();
        assert!(root.dependencies.is_empty());
        assert!(root
            .dev_dependencies
            .get("test-runner")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_repository_field_shapes() {
        let as_string = json!({ "repository": "https://github.com/a/b" });
        assert_eq!(
            repository_url(&as_string),
            Some("https://github.com/a/b".to_string())
        );

        let as_object = json!({ "repository": { "type": "git", "url": "git://github.com/a/b.git" } });
        assert_eq!(
            repository_url(&as_object),
            Some("git://github.com/a/b.git".to_string())
        );

        assert_eq!(repository_url(&json!({})), None);
    }

    #[test]
    fn test_synthesized_id_fallback() {
        let dir = TempDir::new().unwrap();
        fixtures::write_manifest(dir.path(), &json!({ "version": "1.0.0" }));

        let root = read_installed(dir.path()).unwrap();
        assert_eq!(
            root.effective_id(),
            format!("unknown({})@0.0.0", dir.path().display())
        );
    }
}
