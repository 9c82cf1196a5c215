use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::types::IncludeGraph;

/// Thin wrapper around `petgraph::DiGraph` keyed by absolute header path,
/// generalized from `boundary-core::graph::DependencyGraph`'s
/// component-dependency graph to a header-include graph.
#[derive(Debug, Clone)]
pub struct HeaderGraph {
    graph: DiGraph<PathBuf, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl HeaderGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build from the full header set plus the direct include graph. Every
    /// header is added as a node even if it has no edges, per spec.md §3
    /// invariant 1 ("every key of include_graph is in all_headers").
    pub fn build(all_headers: &std::collections::BTreeSet<PathBuf>, include_graph: &IncludeGraph) -> Self {
        let mut g = Self::new();
        for header in all_headers {
            g.add_node(header);
        }
        for (src, deps) in include_graph {
            g.add_node(src);
            for dep in deps {
                g.add_node(dep);
                g.add_edge(src, dep);
            }
        }
        g
    }

    pub fn add_node(&mut self, path: &Path) -> NodeIndex {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.to_path_buf());
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    pub fn add_edge(&mut self, from: &Path, to: &Path) {
        let a = self.add_node(from);
        let b = self.add_node(to);
        if !self.graph.contains_edge(a, b) {
            self.graph.add_edge(a, b, ());
        }
    }

    pub fn node_index(&self, path: &Path) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }

    pub fn path_of(&self, idx: NodeIndex) -> &Path {
        &self.graph[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PathBuf> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn fan_out(&self, idx: NodeIndex) -> usize {
        self.graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .count()
    }

    pub fn fan_in(&self, idx: NodeIndex) -> usize {
        self.graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .count()
    }

    pub fn successors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|e| e.target())
    }

    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|e| e.source())
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.graph.edge_references().map(|e| (e.source(), e.target()))
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.graph.contains_edge(from, to)
    }

    /// Strongly connected components via Kosaraju's algorithm, in the
    /// order petgraph returns them.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeIndex>> {
        kosaraju_scc(&self.graph)
    }

    pub fn inner(&self) -> &DiGraph<PathBuf, ()> {
        &self.graph
    }
}

impl Default for HeaderGraph {
    fn default() -> Self {
        Self::new()
    }
}
