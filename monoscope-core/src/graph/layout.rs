use super::DependencyGraph;
use crate::{MonoscopeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

pub const FORCE_ITERATIONS: usize = 50;
const REPULSION: f64 = 5_000.0;
const SPRING: f64 = 0.05;
const SPRING_LENGTH: f64 = 100.0;
const DAMPING: f64 = 0.85;
const MIN_DISTANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    Layered,
    Radial,
    Force,
}

impl LayoutAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutAlgorithm::Layered => "layered",
            LayoutAlgorithm::Radial => "radial",
            LayoutAlgorithm::Force => "force",
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutAlgorithm {
    type Err = MonoscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "layered" | "hierarchical" | "tree" => Ok(LayoutAlgorithm::Layered),
            "radial" | "circular" | "circle" => Ok(LayoutAlgorithm::Radial),
            "force" | "force-directed" | "forcedirected" => Ok(LayoutAlgorithm::Force),
            _ => Err(MonoscopeError::UnknownLayout {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<usize>,
}

/// Positions every node of `graph` on a `width` x `height` canvas.
pub fn layout(
    graph: &DependencyGraph,
    algorithm: LayoutAlgorithm,
    width: f64,
    height: f64,
) -> Vec<PositionedNode> {
    if graph.nodes.is_empty() {
        return Vec::new();
    }

    match algorithm {
        LayoutAlgorithm::Layered => layered(graph, width, height),
        LayoutAlgorithm::Radial => radial(graph, width, height),
        LayoutAlgorithm::Force => force(graph, width, height),
    }
}

/// Layer numbers by breadth-first propagation from packages with no internal
/// dependencies, moving forward along dependents so a package sits one layer
/// past its deepest dependency. Nodes only reachable through a cycle stay on
/// layer 0.
pub fn assign_layers(graph: &DependencyGraph) -> Vec<usize> {
    let count = graph.nodes.len();
    let index: BTreeMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut out_degree = vec![0usize; count];

    for edge in &graph.edges {
        let from = index.get(edge.from.as_str());
        let to = index.get(edge.to.as_str());
        if let (Some(&from), Some(&to)) = (from, to) {
            dependents[to].push(from);
            out_degree[from] += 1;
        }
    }

    let mut layers = vec![0usize; count];
    let mut queue: VecDeque<usize> = (0..count).filter(|&i| out_degree[i] == 0).collect();

    while let Some(current) = queue.pop_front() {
        let next = layers[current] + 1;

        // A layer can never exceed the node count on an acyclic path; the cap
        // stops propagation around cycles.
        if next >= count {
            continue;
        }

        for &dependent in &dependents[current] {
            if next > layers[dependent] {
                layers[dependent] = next;
                queue.push_back(dependent);
            }
        }
    }

    layers
}

fn layered(graph: &DependencyGraph, width: f64, height: f64) -> Vec<PositionedNode> {
    let layers = assign_layers(graph);
    let layer_count = layers.iter().copied().max().unwrap_or(0) + 1;

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for (node, &layer) in layers.iter().enumerate() {
        members[layer].push(node);
    }

    let x_step = width / (layer_count as f64 + 1.0);
    let mut positioned: Vec<Option<PositionedNode>> = vec![None; graph.nodes.len()];

    for (layer, nodes) in members.iter().enumerate() {
        let y_step = height / (nodes.len() as f64 + 1.0);

        for (slot, &node) in nodes.iter().enumerate() {
            positioned[node] = Some(PositionedNode {
                name: graph.nodes[node].name.clone(),
                x: x_step * (layer as f64 + 1.0),
                y: y_step * (slot as f64 + 1.0),
                layer: Some(layer),
            });
        }
    }

    positioned.into_iter().flatten().collect()
}

fn radial(graph: &DependencyGraph, width: f64, height: f64) -> Vec<PositionedNode> {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let radius = width.min(height) / 3.0;
    let count = graph.nodes.len() as f64;

    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let angle = 2.0 * PI * i as f64 / count;
            PositionedNode {
                name: node.name.clone(),
                x: cx + radius * angle.cos(),
                y: cy + radius * angle.sin(),
                layer: None,
            }
        })
        .collect()
}

/// Spring embedder seeded from the radial layout so results are
/// reproducible. O(n²) per iteration.
fn force(graph: &DependencyGraph, width: f64, height: f64) -> Vec<PositionedNode> {
    let count = graph.nodes.len();
    let index: BTreeMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();

    let springs: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .filter_map(|edge| Some((*index.get(edge.from.as_str())?, *index.get(edge.to.as_str())?)))
        .filter(|(from, to)| from != to)
        .collect();

    let mut positions: Vec<(f64, f64)> = radial(graph, width, height)
        .into_iter()
        .map(|node| (node.x, node.y))
        .collect();
    let mut velocities = vec![(0.0f64, 0.0f64); count];

    for _ in 0..FORCE_ITERATIONS {
        let mut forces = vec![(0.0f64, 0.0f64); count];

        for i in 0..count {
            for j in (i + 1)..count {
                let (dx, dy, distance) = separation(positions[i], positions[j], i, j);
                let push = REPULSION / (distance * distance);
                let (fx, fy) = (push * dx / distance, push * dy / distance);

                forces[i].0 -= fx;
                forces[i].1 -= fy;
                forces[j].0 += fx;
                forces[j].1 += fy;
            }
        }

        for &(from, to) in &springs {
            let (dx, dy, distance) = separation(positions[from], positions[to], from, to);
            let pull = SPRING * (distance - SPRING_LENGTH);
            let (fx, fy) = (pull * dx / distance, pull * dy / distance);

            forces[from].0 += fx;
            forces[from].1 += fy;
            forces[to].0 -= fx;
            forces[to].1 -= fy;
        }

        for i in 0..count {
            velocities[i].0 = (velocities[i].0 + forces[i].0) * DAMPING;
            velocities[i].1 = (velocities[i].1 + forces[i].1) * DAMPING;
            positions[i].0 += velocities[i].0;
            positions[i].1 += velocities[i].1;
        }
    }

    graph
        .nodes
        .iter()
        .zip(positions)
        .map(|(node, (x, y))| PositionedNode {
            name: node.name.clone(),
            x: clamp(x, width),
            y: clamp(y, height),
            layer: None,
        })
        .collect()
}

/// Vector from `a` to `b` and its length, never zero. Coincident points are
/// split along a direction derived from their indices.
fn separation(a: (f64, f64), b: (f64, f64), i: usize, j: usize) -> (f64, f64, f64) {
    let (mut dx, mut dy) = (b.0 - a.0, b.1 - a.1);
    let mut distance = (dx * dx + dy * dy).sqrt();

    if distance < MIN_DISTANCE {
        let angle = (i * 31 + j * 17) as f64;
        dx = MIN_DISTANCE * angle.cos();
        dy = MIN_DISTANCE * angle.sin();
        distance = MIN_DISTANCE;
    }

    (dx, dy, distance)
}

fn clamp(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return max / 2.0;
    }
    value.clamp(0.0, max.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::package;

    fn chain() -> DependencyGraph {
        DependencyGraph::from_packages(&[
            package("app", &["ui", "core"]),
            package("ui", &["core"]),
            package("core", &["lodash"]),
        ])
    }

    #[test]
    fn empty_graph_has_no_positions() {
        let graph = DependencyGraph::default();

        for algorithm in [
            LayoutAlgorithm::Layered,
            LayoutAlgorithm::Radial,
            LayoutAlgorithm::Force,
        ] {
            assert!(layout(&graph, algorithm, 800.0, 600.0).is_empty());
        }
    }

    #[test]
    fn layers_follow_longest_dependency_chain() {
        let graph = chain();
        assert_eq!(assign_layers(&graph), vec![2, 1, 0]);
    }

    #[test]
    fn layered_positions_are_evenly_spaced() {
        let nodes = layout(&chain(), LayoutAlgorithm::Layered, 400.0, 300.0);

        let core = nodes.iter().find(|n| n.name == "core").unwrap();
        let app = nodes.iter().find(|n| n.name == "app").unwrap();

        assert_eq!(core.layer, Some(0));
        assert_eq!(core.x, 100.0);
        assert_eq!(core.y, 150.0);
        assert_eq!(app.x, 300.0);
    }

    #[test]
    fn cycles_do_not_hang_layering() {
        let graph = DependencyGraph::from_packages(&[
            package("a", &["b"]),
            package("b", &["a"]),
            package("c", &["a"]),
        ]);

        assert_eq!(assign_layers(&graph), vec![0, 0, 0]);
        assert_eq!(layout(&graph, LayoutAlgorithm::Layered, 100.0, 100.0).len(), 3);
    }

    #[test]
    fn radial_nodes_sit_on_the_circle() {
        let nodes = layout(&chain(), LayoutAlgorithm::Radial, 600.0, 300.0);

        for node in &nodes {
            let distance = ((node.x - 300.0).powi(2) + (node.y - 150.0).powi(2)).sqrt();
            assert!((distance - 100.0).abs() < 1e-9);
        }
        assert_eq!(nodes[0].x, 400.0);
    }

    #[test]
    fn force_layout_stays_on_canvas() {
        let packages: Vec<_> = (0..12)
            .map(|i| package(&format!("p{}", i), &[]))
            .collect();
        let graph = DependencyGraph::from_packages(&packages);

        let nodes = layout(&graph, LayoutAlgorithm::Force, 200.0, 100.0);

        assert_eq!(nodes.len(), 12);
        for node in nodes {
            assert!((0.0..=200.0).contains(&node.x));
            assert!((0.0..=100.0).contains(&node.y));
        }
    }

    #[test]
    fn force_layout_is_deterministic() {
        let graph = chain();
        let first = layout(&graph, LayoutAlgorithm::Force, 800.0, 600.0);
        let second = layout(&graph, LayoutAlgorithm::Force, 800.0, 600.0);
        assert_eq!(first, second);
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("Radial".parse::<LayoutAlgorithm>().unwrap(), LayoutAlgorithm::Radial);
        assert_eq!(
            "force-directed".parse::<LayoutAlgorithm>().unwrap(),
            LayoutAlgorithm::Force
        );
        assert!("spiral".parse::<LayoutAlgorithm>().is_err());
    }
}
