use std::collections::{BTreeMap, HashSet};

use crate::tree::PackageNode;

#[derive(Debug, Clone)]
pub struct TraverseOptions {
    /// Number of dependency levels to walk; None exhausts the tree
    pub depth: Option<usize>,
    /// Follow devDependencies edges as well as runtime ones
    pub include_dev: bool,
    /// Dedup by package name instead of name@version, collapsing forks
    pub prune_forks: bool,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        TraverseOptions {
            depth: None,
            include_dev: true,
            prune_forks: false,
        }
    }
}

/// The result of one levelwise walk.
#[derive(Debug)]
pub struct TraverseOutcome<'a> {
    /// Unique packages in first-seen (shallowest-first) order
    pub modules: Vec<&'a PackageNode>,
    /// Count of accepted nodes before the final dedup by name
    pub deep_count: usize,
    /// Forked package names and their distinct versions, sorted; only
    /// populated when forks are preserved. Diagnostic only.
    pub forks: BTreeMap<String, Vec<String>>,
}

/// Walk the installed tree breadth-first by depth level.
///
/// Level 0's parent set is the root itself, so level 0 holds the project's
/// direct dependencies; a bounded depth of N therefore runs N+1 levels. The
/// global seen-set bounds diamond-shaped graphs to one visit per unique
/// package, keyed by identity (or by bare name when pruning forks, so the
/// shallowest version of a forked name wins).
pub fn traverse<'a>(root: &'a PackageNode, options: &TraverseOptions) -> TraverseOutcome<'a> {
    let mut levels: Vec<Vec<&'a PackageNode>> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current_depth = 0usize;

    loop {
        if let Some(max_depth) = options.depth {
            // one extra level: level 0 is the root's own dependencies
            if current_depth >= max_depth + 1 {
                break;
            }
        }

        let parents: Vec<&'a PackageNode> = if current_depth == 0 {
            vec![root]
        } else {
            levels[current_depth - 1].clone()
        };

        let mut level: Vec<&'a PackageNode> = Vec::new();
        for parent in parents {
            for child in parent.candidate_children(options.include_dev) {
                let key = if options.prune_forks {
                    child.name_key()
                } else {
                    child.effective_id()
                };
                if seen.insert(key) {
                    level.push(child);
                }
            }
        }

        // Same child required by multiple parents within one level
        let mut level_ids = HashSet::new();
        level.retain(|node| level_ids.insert(node.effective_id()));

        // Tree exhausted; in unbounded mode this is the only way out
        if level.is_empty() {
            break;
        }

        levels.push(level);
        current_depth += 1;
    }

    let flat: Vec<&'a PackageNode> = levels.into_iter().flatten().collect();
    let deep_count = flat.len();

    let forks = if options.prune_forks {
        BTreeMap::new()
    } else {
        fork_table(&flat)
    };

    // Final dedup by name, first occurrence (shallowest level) wins
    let mut names = HashSet::new();
    let modules: Vec<&'a PackageNode> = flat
        .into_iter()
        .filter(|node| names.insert(node.name_key()))
        .collect();

    TraverseOutcome {
        modules,
        deep_count,
        forks,
    }
}

/// Names appearing more than once in the flat results, with their versions.
fn fork_table<'a>(flat: &[&'a PackageNode]) -> BTreeMap<String, Vec<String>> {
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in flat {
        by_name
            .entry(node.name_key())
            .or_default()
            .push(node.version.clone());
    }

    by_name.retain(|_, versions| versions.len() > 1);
    for versions in by_name.values_mut() {
        versions.sort();
    }

    by_name
}
