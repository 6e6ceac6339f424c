use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;

/// A workspace crate and the packages it must never reach, directly or
/// transitively.
struct Boundary {
    package: &'static str,
    forbidden: &'static [&'static str],
}

const BOUNDARIES: &[Boundary] = &[
    Boundary {
        package: "arena-policy",
        forbidden: &["arena-store", "arena-gateway", "axum", "reqwest"],
    },
    Boundary {
        package: "arena-contracts",
        forbidden: &["arena-policy", "arena-store", "axum"],
    },
    Boundary {
        package: "arena-store",
        forbidden: &["arena-gateway", "axum", "reqwest"],
    },
];

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    let names: HashMap<_, _> = metadata
        .packages
        .iter()
        .map(|p| (p.id.clone(), p.name.as_str()))
        .collect();

    let adjacency: HashMap<_, _> = resolve
        .nodes
        .iter()
        .map(|node| {
            let deps: Vec<_> = node.deps.iter().map(|dep| dep.pkg.clone()).collect();
            (node.id.clone(), deps)
        })
        .collect();

    let mut failed = false;
    for boundary in BOUNDARIES {
        let root = metadata
            .packages
            .iter()
            .find(|p| p.name == boundary.package)
            .with_context(|| format!("package `{}` not found in workspace", boundary.package))?;

        let violations = forbidden_paths(&adjacency, &names, &root.id, boundary.forbidden);
        if violations.is_empty() {
            println!(
                "OK: `{}` has no dependency edge to {}",
                boundary.package,
                boundary.forbidden.join(", ")
            );
            continue;
        }

        failed = true;
        for path in violations {
            eprintln!(
                "FAIL: `{}` reaches forbidden crate via {}",
                boundary.package,
                path.join(" -> ")
            );
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Breadth-first walk from `root`; returns the shortest dependency path to
/// each forbidden package that is reachable.
fn forbidden_paths<Id: Clone + Eq + Hash>(
    adjacency: &HashMap<Id, Vec<Id>>,
    names: &HashMap<Id, &str>,
    root: &Id,
    forbidden: &[&str],
) -> Vec<Vec<String>> {
    let name_of = |id: &Id| names.get(id).copied().unwrap_or("?").to_string();

    let mut parent: HashMap<Id, Id> = HashMap::new();
    let mut visited = HashSet::from([root.clone()]);
    let mut queue = VecDeque::from([root.clone()]);
    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(deps) = adjacency.get(&current) else {
            continue;
        };

        for dep in deps {
            if !visited.insert(dep.clone()) {
                continue;
            }
            parent.insert(dep.clone(), current.clone());

            if names.get(dep).is_some_and(|name| forbidden.contains(name)) {
                let mut path = vec![name_of(dep)];
                let mut cursor = dep;
                while let Some(up) = parent.get(cursor) {
                    path.push(name_of(up));
                    cursor = up;
                }
                path.reverse();
                found.push(path);
                continue;
            }

            queue.push_back(dep.clone());
        }
    }

    found.sort();
    found
}
