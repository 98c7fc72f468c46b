use super::DependencyGraph;
use crate::project::PackageInfo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSeverity {
    Low,
    Medium,
    High,
}

impl CycleSeverity {
    pub fn for_length(length: usize) -> Self {
        if length > 5 {
            CycleSeverity::High
        } else if length > 3 {
            CycleSeverity::Medium
        } else {
            CycleSeverity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleSeverity::Low => "low",
            CycleSeverity::Medium => "medium",
            CycleSeverity::High => "high",
        }
    }
}

impl fmt::Display for CycleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: Vec<String>,
    pub severity: CycleSeverity,
    pub impact: String,
}

impl CycleReport {
    fn new(cycle: Vec<String>) -> Self {
        let length = cycle.len();
        let noun = if length == 1 { "package" } else { "packages" };

        CycleReport {
            severity: CycleSeverity::for_length(length),
            impact: format!("{} {} involved in circular dependency", length, noun),
            cycle,
        }
    }

    pub fn len(&self) -> usize {
        self.cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycle.is_empty()
    }
}

pub fn detect_cycles(packages: &[PackageInfo]) -> Vec<CycleReport> {
    detect_cycles_in(&DependencyGraph::from_packages(packages))
}

/// Depth-first search with a recursion stack over the internal edges.
///
/// Reports come out in discovery order. The same loop entered from a
/// different node is not merged, so rotations can appear more than once.
pub fn detect_cycles_in(graph: &DependencyGraph) -> Vec<CycleReport> {
    let adjacency = graph.adjacency();
    let mut search = CycleSearch::default();

    for node in &graph.nodes {
        if !search.visited.contains(node.name.as_str()) {
            search.visit(&adjacency, node.name.as_str());
        }
    }

    search.found
}

#[derive(Default)]
struct CycleSearch<'a> {
    visited: HashSet<&'a str>,
    on_stack: HashSet<&'a str>,
    path: Vec<&'a str>,
    found: Vec<CycleReport>,
}

impl<'a> CycleSearch<'a> {
    fn visit(&mut self, adjacency: &BTreeMap<&'a str, Vec<&'a str>>, current: &'a str) {
        self.visited.insert(current);
        self.on_stack.insert(current);
        self.path.push(current);

        if let Some(targets) = adjacency.get(current) {
            for &next in targets {
                if self.on_stack.contains(next) {
                    if let Some(start) = self.path.iter().position(|name| *name == next) {
                        let cycle = self.path[start..].iter().map(|s| s.to_string()).collect();
                        self.found.push(CycleReport::new(cycle));
                    }
                } else if !self.visited.contains(next) {
                    self.visit(adjacency, next);
                }
            }
        }

        self.path.pop();
        self.on_stack.remove(current);
    }
}
