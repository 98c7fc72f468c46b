use crate::project::{PackageInfo, PackageType};
use crate::version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub mod cycles;
pub mod layout;

pub use cycles::{CycleReport, CycleSeverity, detect_cycles, detect_cycles_in};
pub use layout::{LayoutAlgorithm, PositionedNode, layout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PackageType,
    /// Declared dependencies of every kind, internal or not.
    pub dependency_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub range: String,
}

/// Packages and the dependency edges between them. Edges come from production
/// `dependencies` only and only ever point at names in `nodes`; external
/// libraries are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DependencyGraph {
    pub fn from_packages(packages: &[PackageInfo]) -> Self {
        let known: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();

        let nodes = packages
            .iter()
            .map(|package| GraphNode {
                name: package.name.clone(),
                version: package.version.clone(),
                kind: package.kind,
                dependency_count: package.dependency_count(),
            })
            .collect();

        let mut edges = Vec::new();

        for package in packages {
            for (name, range) in &package.dependencies {
                if !known.contains(name.as_str()) {
                    continue;
                }

                edges.push(GraphEdge {
                    from: package.name.clone(),
                    to: name.clone(),
                    range: range.clone(),
                });
            }
        }

        DependencyGraph { nodes, edges }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node.name == name)
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.from == name)
            .map(|edge| edge.to.as_str())
            .collect()
    }

    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.to == name)
            .map(|edge| edge.from.as_str())
            .collect()
    }

    /// Internal adjacency in node order, edges in declaration order.
    pub(crate) fn adjacency(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = self
            .nodes
            .iter()
            .map(|node| (node.name.as_str(), Vec::new()))
            .collect();

        for edge in &self.edges {
            if let Some(targets) = adjacency.get_mut(edge.from.as_str()) {
                targets.push(edge.to.as_str());
            }
        }

        adjacency
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMismatch {
    pub from: String,
    pub to: String,
    pub range: String,
    pub actual: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_packages: usize,
    pub total_dependencies: usize,
    pub leaf_packages: usize,
    pub root_packages: usize,
    pub max_depth: usize,
    pub avg_dependencies: f64,
    #[serde(default)]
    pub version_mismatches: Vec<VersionMismatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphAnalysis {
    pub graph: DependencyGraph,
    pub stats: GraphStats,
}

pub fn build_graph(packages: &[PackageInfo]) -> GraphAnalysis {
    let graph = DependencyGraph::from_packages(packages);
    let stats = compute_stats(packages, &graph);
    GraphAnalysis { graph, stats }
}

/// Who depends on each name, across prod, dev and peer maps. External names
/// get entries too even though they never become graph nodes.
pub fn dependents_index(packages: &[PackageInfo]) -> BTreeMap<String, BTreeSet<String>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for package in packages {
        for name in package.all_dependency_names() {
            index
                .entry(name.clone())
                .or_default()
                .insert(package.name.clone());
        }
    }

    index
}

fn compute_stats(packages: &[PackageInfo], graph: &DependencyGraph) -> GraphStats {
    let total_packages = packages.len();
    let total_dependencies: usize = packages.iter().map(PackageInfo::dependency_count).sum();

    let leaf_packages = packages
        .iter()
        .filter(|package| package.dependency_count() == 0)
        .count();

    let dependents = dependents_index(packages);
    let root_packages = packages
        .iter()
        .filter(|package| {
            dependents
                .get(&package.name)
                .is_none_or(|parents| parents.is_empty())
        })
        .count();

    let avg_dependencies = if total_packages == 0 {
        0.0
    } else {
        round_one_decimal(total_dependencies as f64 / total_packages as f64)
    };

    GraphStats {
        total_packages,
        total_dependencies,
        leaf_packages,
        root_packages,
        max_depth: max_depth(graph),
        avg_dependencies,
        version_mismatches: version_mismatches(graph),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Deepest dependency chain, in edges, found by a DFS from every unvisited
/// node. The visited set is shared across roots, so a node is measured only
/// from whichever root reaches it first and deeper paths through it found
/// later are not counted.
pub fn max_depth(graph: &DependencyGraph) -> usize {
    let adjacency = graph.adjacency();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut deepest = 0;

    for node in &graph.nodes {
        if !visited.contains(node.name.as_str()) {
            walk_depth(&adjacency, node.name.as_str(), 0, &mut visited, &mut deepest);
        }
    }

    deepest
}

fn walk_depth<'a>(
    adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
    current: &'a str,
    depth: usize,
    visited: &mut HashSet<&'a str>,
    deepest: &mut usize,
) {
    if !visited.insert(current) {
        return;
    }

    *deepest = (*deepest).max(depth);

    if let Some(targets) = adjacency.get(current) {
        for target in targets {
            walk_depth(adjacency, *target, depth + 1, visited, deepest);
        }
    }
}

fn version_mismatches(graph: &DependencyGraph) -> Vec<VersionMismatch> {
    let versions: BTreeMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|node| (node.name.as_str(), node.version.as_str()))
        .collect();

    graph
        .edges
        .iter()
        .filter_map(|edge| {
            let actual = versions.get(edge.to.as_str())?;
            match version::satisfies(&edge.range, actual) {
                Some(false) => Some(VersionMismatch {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    range: edge.range.clone(),
                    actual: actual.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::path::PathBuf;

    pub fn package(name: &str, deps: &[&str]) -> PackageInfo {
        PackageInfo {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            kind: PackageType::Lib,
            path: PathBuf::from(format!("/repo/packages/{}", name)),
            dependencies: deps
                .iter()
                .map(|dep| (dep.to_string(), "^1.0.0".to_string()))
                .collect(),
            dev_dependencies: BTreeMap::new(),
            peer_dependencies: BTreeMap::new(),
            scripts: BTreeMap::new(),
            maintainers: Vec::new(),
            description: None,
            license: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::package;
    use super::*;

    #[test]
    fn empty_input_builds_empty_graph() {
        let analysis = build_graph(&[]);

        assert!(analysis.graph.nodes.is_empty());
        assert!(analysis.graph.edges.is_empty());
        assert_eq!(analysis.stats.total_packages, 0);
        assert_eq!(analysis.stats.avg_dependencies, 0.0);
        assert_eq!(analysis.stats.max_depth, 0);
    }

    #[test]
    fn external_dependencies_are_counted_but_not_linked() {
        let packages = vec![
            package("app", &["core", "react"]),
            package("core", &["lodash"]),
        ];

        let analysis = build_graph(&packages);

        assert_eq!(analysis.graph.edges.len(), 1);
        assert_eq!(analysis.graph.edges[0].from, "app");
        assert_eq!(analysis.graph.edges[0].to, "core");
        assert_eq!(analysis.stats.total_dependencies, 3);
        assert_eq!(analysis.stats.avg_dependencies, 1.5);
        assert!(!analysis.graph.contains("react"));
    }

    #[test]
    fn edges_only_reference_known_nodes() {
        let packages = vec![
            package("a", &["b", "x"]),
            package("b", &["c", "y"]),
            package("c", &[]),
        ];

        let graph = DependencyGraph::from_packages(&packages);

        for edge in &graph.edges {
            assert!(graph.contains(&edge.from));
            assert!(graph.contains(&edge.to));
            let from = packages.iter().find(|p| p.name == edge.from).unwrap();
            assert!(from.declared_range(&edge.to).is_some());
        }
    }

    #[test]
    fn leaf_and_root_counts_partition_packages() {
        let packages = vec![
            package("a", &["b"]),
            package("b", &["c"]),
            package("c", &[]),
            package("d", &["left-pad"]),
        ];

        let stats = build_graph(&packages).stats;
        let with_deps = packages.iter().filter(|p| p.dependency_count() > 0).count();
        let with_dependents = dependents_index(&packages)
            .iter()
            .filter(|(name, _)| packages.iter().any(|p| &p.name == *name))
            .count();

        assert_eq!(stats.leaf_packages, 1);
        assert_eq!(stats.leaf_packages + with_deps, stats.total_packages);
        assert_eq!(stats.root_packages, 2);
        assert_eq!(stats.root_packages + with_dependents, stats.total_packages);
    }

    #[test]
    fn dependents_index_keeps_external_names() {
        let packages = vec![package("a", &["react"]), package("b", &["react", "a"])];

        let index = dependents_index(&packages);

        assert_eq!(index["react"].len(), 2);
        assert!(index["a"].contains("b"));
    }

    #[test]
    fn max_depth_follows_longest_first_chain() {
        let packages = vec![
            package("a", &["b"]),
            package("b", &["c"]),
            package("c", &["d"]),
            package("d", &[]),
        ];

        assert_eq!(build_graph(&packages).stats.max_depth, 3);
    }

    #[test]
    fn max_depth_is_measured_from_first_root_only() {
        // "short" reaches "c" first at depth 1, so the longer path
        // long -> mid -> c -> d is never re-walked.
        let packages = vec![
            package("short", &["c"]),
            package("c", &["d"]),
            package("d", &[]),
            package("long", &["mid"]),
            package("mid", &["c"]),
        ];

        assert_eq!(build_graph(&packages).stats.max_depth, 2);
    }

    #[test]
    fn max_depth_terminates_on_cycles() {
        let packages = vec![package("a", &["b"]), package("b", &["a"])];
        assert_eq!(build_graph(&packages).stats.max_depth, 1);
    }

    #[test]
    fn reports_internal_version_drift() {
        let mut app = package("app", &[]);
        app.dependencies.insert("core".into(), "^2.0.0".into());
        let core = package("core", &[]);

        let stats = build_graph(&[app, core]).stats;

        assert_eq!(stats.version_mismatches.len(), 1);
        assert_eq!(stats.version_mismatches[0].actual, "1.0.0");
    }

    #[test]
    fn prod_and_dev_declaration_produce_one_edge() {
        let mut app = package("app", &["core"]);
        app.dev_dependencies.insert("core".into(), "^1.0.0".into());

        let graph = DependencyGraph::from_packages(&[app, package("core", &[])]);

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.dependents_of("core"), vec!["app"]);
        assert_eq!(graph.dependencies_of("app"), vec!["core"]);
    }

    #[test]
    fn dev_only_back_reference_is_not_an_edge() {
        let mut a = package("a", &[]);
        a.dev_dependencies.insert("b".into(), "^1.0.0".into());
        let b = package("b", &["a"]);
        let packages = vec![a, b];

        let analysis = build_graph(&packages);

        assert_eq!(analysis.graph.edges.len(), 1);
        assert_eq!(analysis.graph.edges[0].from, "b");
        assert_eq!(analysis.graph.edges[0].to, "a");
        assert!(analysis.graph.dependencies_of("a").is_empty());
        assert!(detect_cycles(&packages).is_empty());

        // Still counted as a declared dependency and a dependent.
        assert_eq!(analysis.stats.total_dependencies, 2);
        assert!(dependents_index(&packages)["b"].contains("a"));
    }
}
