use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

use petgraph::algo::{condensation, toposort};
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{AdvancedMetricsConfig, SeverityThresholds};
use crate::graph::HeaderGraph;
use crate::types::{
    AdvancedMetrics, DsmAnalysisResults, DsmMetrics, Health, IncludeGraph, MatrixStatistics,
};

/// Run the full DSM analysis of spec.md §4.4 over a header set and direct
/// include graph. This is the single entry point L3 exposes to L4 and to
/// the CLI.
pub fn run_dsm_analysis(
    all_headers: &BTreeSet<PathBuf>,
    include_graph: &IncludeGraph,
    advanced: &AdvancedMetricsConfig,
    severity: &SeverityThresholds,
) -> DsmAnalysisResults {
    let graph = HeaderGraph::build(all_headers, include_graph);

    let sorted_headers: Vec<PathBuf> = all_headers.iter().cloned().collect();

    let mut metrics: BTreeMap<PathBuf, DsmMetrics> = BTreeMap::new();
    for header in &sorted_headers {
        let idx = graph.node_index(header).expect("header was added to graph");
        metrics.insert(header.clone(), DsmMetrics::new(graph.fan_out(idx), graph.fan_in(idx)));
    }

    let sccs = graph.strongly_connected_components();
    let mut cycles: Vec<BTreeSet<PathBuf>> = Vec::new();
    let mut headers_in_cycles: BTreeSet<PathBuf> = BTreeSet::new();
    let mut feedback_edges: BTreeSet<(PathBuf, PathBuf)> = BTreeSet::new();

    for scc in &sccs {
        let is_self_loop = scc.len() == 1 && graph.has_edge(scc[0], scc[0]);
        if scc.len() >= 2 || is_self_loop {
            let members: BTreeSet<PathBuf> = scc.iter().map(|&idx| graph.path_of(idx).to_path_buf()).collect();
            headers_in_cycles.extend(members.iter().cloned());
            cycles.push(members);

            if is_self_loop {
                let p = graph.path_of(scc[0]).to_path_buf();
                feedback_edges.insert((p.clone(), p));
            } else if let Some(edge) = select_feedback_edge(scc, &graph, &metrics) {
                feedback_edges.insert(edge);
            }
        }
    }
    cycles.sort_by(|a, b| {
        let av: Vec<&PathBuf> = a.iter().collect();
        let bv: Vec<&PathBuf> = b.iter().collect();
        av.cmp(&bv)
    });

    let (layers, header_to_layer) = compute_layers(&graph, &sccs);

    let header_to_headers: IncludeGraph = include_graph
        .iter()
        .map(|(k, v)| (k.clone(), v.iter().cloned().collect::<BTreeSet<_>>()))
        .collect();

    let mut reverse_deps: IncludeGraph = IncludeGraph::new();
    for header in &sorted_headers {
        reverse_deps.entry(header.clone()).or_default();
    }
    for (src, deps) in include_graph {
        for dep in deps {
            reverse_deps.entry(dep.clone()).or_default().insert(src.clone());
        }
    }

    let total_headers = sorted_headers.len();
    let total_actual_deps = graph.edge_count();
    let has_cycles = !cycles.is_empty();

    let god_object_count = metrics
        .values()
        .filter(|m| m.fan_out >= severity.god_object_fan_out)
        .count();
    let sparsity_preview = if total_headers > 1 {
        1.0 - (total_actual_deps as f64
            / (total_headers as f64 * (total_headers as f64 - 1.0)))
    } else {
        0.0
    };
    let avg_coupling = if total_headers > 0 {
        metrics.values().map(|m| m.coupling as f64).sum::<f64>() / total_headers as f64
    } else {
        0.0
    };
    let max_cycle_size = cycles.iter().map(|c| c.len()).max().unwrap_or(0);
    let health = bucket_health(cycles.len(), max_cycle_size, sparsity_preview, avg_coupling, god_object_count);

    let stats = MatrixStatistics::compute(total_headers, total_actual_deps, health);

    let advanced_metrics = if advanced.enabled {
        Some(compute_advanced_metrics(&graph, &metrics, advanced, severity))
    } else {
        None
    };

    DsmAnalysisResults {
        sorted_headers,
        metrics,
        include_graph: include_graph.clone(),
        cycles,
        headers_in_cycles,
        feedback_edges,
        layers,
        header_to_layer,
        header_to_headers,
        reverse_deps,
        stats,
        has_cycles,
        advanced: advanced_metrics,
    }
}

/// Within an SCC, pick the edge whose removal reduces the number of edges
/// still participating in a cycle the most (spec.md §4.4 "Cycle
/// detection"). Ties: lower combined coupling of endpoints, then
/// lexicographic order of (source, target) paths.
fn select_feedback_edge(
    scc: &[NodeIndex],
    graph: &HeaderGraph,
    metrics: &BTreeMap<PathBuf, DsmMetrics>,
) -> Option<(PathBuf, PathBuf)> {
    let members: BTreeSet<NodeIndex> = scc.iter().copied().collect();
    let scc_edges: Vec<(NodeIndex, NodeIndex)> = graph
        .edges()
        .filter(|(a, b)| members.contains(a) && members.contains(b))
        .collect();

    if scc_edges.is_empty() {
        return None;
    }

    let baseline_cycle_edges = count_edges_in_cycles(&members, &scc_edges, None);

    let mut best: Option<(usize, usize, PathBuf, PathBuf)> = None;
    for &(a, b) in &scc_edges {
        let remaining = count_edges_in_cycles(&members, &scc_edges, Some((a, b)));
        let reduction = baseline_cycle_edges.saturating_sub(remaining);

        let pa = graph.path_of(a).to_path_buf();
        let pb = graph.path_of(b).to_path_buf();
        let combined_coupling = metrics.get(&pa).map(|m| m.coupling).unwrap_or(0)
            + metrics.get(&pb).map(|m| m.coupling).unwrap_or(0);

        let candidate = (usize::MAX - reduction, combined_coupling, pa, pb);
        best = Some(match best {
            None => candidate,
            Some(current) => std::cmp::min(current, candidate),
        });
    }

    best.map(|(_, _, a, b)| (a, b))
}

/// Count edges within `scc_edges` (restricted to `members`) that still
/// belong to a cycle of size >= 2, after optionally removing one edge.
fn count_edges_in_cycles(
    members: &BTreeSet<NodeIndex>,
    scc_edges: &[(NodeIndex, NodeIndex)],
    removed: Option<(NodeIndex, NodeIndex)>,
) -> usize {
    let edges: Vec<(NodeIndex, NodeIndex)> = scc_edges
        .iter()
        .copied()
        .filter(|e| Some(*e) != removed)
        .collect();

    let mut adj: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for &m in members {
        adj.entry(m).or_default();
    }
    for &(a, b) in &edges {
        adj.entry(a).or_default().push(b);
    }

    let sub_sccs = tarjan_like_scc(members, &adj);
    let mut count = 0;
    for component in &sub_sccs {
        let comp_set: BTreeSet<NodeIndex> = component.iter().copied().collect();
        let is_self_loop = component.len() == 1 && adj.get(&component[0]).map(|v| v.contains(&component[0])).unwrap_or(false);
        if component.len() >= 2 || is_self_loop {
            count += edges
                .iter()
                .filter(|(a, b)| comp_set.contains(a) && comp_set.contains(b))
                .count();
        }
    }
    count
}

/// Minimal iterative Tarjan SCC over a small induced subgraph, used only by
/// the feedback-edge search (which needs SCCs of arbitrary vertex subsets,
/// not the whole graph that `HeaderGraph` indexes).
fn tarjan_like_scc(
    members: &BTreeSet<NodeIndex>,
    adj: &HashMap<NodeIndex, Vec<NodeIndex>>,
) -> Vec<Vec<NodeIndex>> {
    let mut index_counter = 0usize;
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut on_stack: HashMap<NodeIndex, bool> = HashMap::new();
    let mut indices: HashMap<NodeIndex, usize> = HashMap::new();
    let mut lowlink: HashMap<NodeIndex, usize> = HashMap::new();
    let mut result: Vec<Vec<NodeIndex>> = Vec::new();

    fn strongconnect(
        v: NodeIndex,
        index_counter: &mut usize,
        stack: &mut Vec<NodeIndex>,
        on_stack: &mut HashMap<NodeIndex, bool>,
        indices: &mut HashMap<NodeIndex, usize>,
        lowlink: &mut HashMap<NodeIndex, usize>,
        adj: &HashMap<NodeIndex, Vec<NodeIndex>>,
        result: &mut Vec<Vec<NodeIndex>>,
    ) {
        indices.insert(v, *index_counter);
        lowlink.insert(v, *index_counter);
        *index_counter += 1;
        stack.push(v);
        on_stack.insert(v, true);

        if let Some(neighbors) = adj.get(&v) {
            for &w in neighbors {
                if !indices.contains_key(&w) {
                    strongconnect(w, index_counter, stack, on_stack, indices, lowlink, adj, result);
                    let wl = lowlink[&w];
                    let vl = lowlink[&v];
                    lowlink.insert(v, vl.min(wl));
                } else if *on_stack.get(&w).unwrap_or(&false) {
                    let wi = indices[&w];
                    let vl = lowlink[&v];
                    lowlink.insert(v, vl.min(wi));
                }
            }
        }

        if lowlink[&v] == indices[&v] {
            let mut component = Vec::new();
            loop {
                let w = stack.pop().unwrap();
                on_stack.insert(w, false);
                component.push(w);
                if w == v {
                    break;
                }
            }
            result.push(component);
        }
    }

    for &v in members {
        if !indices.contains_key(&v) {
            strongconnect(v, &mut index_counter, &mut stack, &mut on_stack, &mut indices, &mut lowlink, adj, &mut result);
        }
    }

    result
}

/// Condense by SCC, topologically sort, and assign layer numbers starting
/// at 0 for sinks (spec.md §4.4 "Layering").
fn compute_layers(
    graph: &HeaderGraph,
    sccs: &[Vec<NodeIndex>],
) -> (Vec<BTreeSet<PathBuf>>, BTreeMap<PathBuf, usize>) {
    let condensed = condensation(graph.inner().clone(), true);

    let order = toposort(&condensed, None).unwrap_or_default();

    let mut layer_of_condensed: HashMap<NodeIndex, usize> = HashMap::new();
    for &node in order.iter().rev() {
        let max_successor_layer = condensed
            .neighbors(node)
            .filter_map(|succ| layer_of_condensed.get(&succ).copied())
            .max();
        let layer = match max_successor_layer {
            Some(l) => l + 1,
            None => 0,
        };
        layer_of_condensed.insert(node, layer);
    }

    let max_layer = layer_of_condensed.values().copied().max().unwrap_or(0);
    let mut layers: Vec<BTreeSet<PathBuf>> = vec![BTreeSet::new(); max_layer + 1];
    let mut header_to_layer: BTreeMap<PathBuf, usize> = BTreeMap::new();

    for node in condensed.node_indices() {
        let layer = *layer_of_condensed.get(&node).unwrap_or(&0);
        for path in &condensed[node] {
            layers[layer].insert(path.clone());
            header_to_layer.insert(path.clone(), layer);
        }
    }

    let _ = sccs;
    (layers, header_to_layer)
}

fn bucket_health(
    cycle_count: usize,
    max_cycle_size: usize,
    sparsity: f64,
    avg_coupling: f64,
    god_object_count: usize,
) -> Health {
    let mut score = 0i32;
    if cycle_count == 0 {
        score += 3;
    } else if max_cycle_size <= 3 {
        score += 1;
    } else {
        score -= 1;
    }
    if sparsity > 0.9 {
        score += 2;
    } else if sparsity > 0.7 {
        score += 1;
    }
    if avg_coupling < 5.0 {
        score += 2;
    } else if avg_coupling < 15.0 {
        score += 1;
    } else {
        score -= 1;
    }
    if god_object_count == 0 {
        score += 1;
    } else {
        score -= god_object_count as i32;
    }

    match score {
        s if s >= 6 => Health::Excellent,
        s if s >= 3 => Health::Good,
        s if s >= 0 => Health::Fair,
        _ => Health::Poor,
    }
}

/// PageRank of the reverse graph, betweenness centrality (exact below the
/// configured vertex-count threshold, sampled above it with a deterministic
/// seed), and pattern detection (hubs/god-objects/stable-interfaces/
/// outliers) (spec.md §4.4 "Advanced metrics").
fn compute_advanced_metrics(
    graph: &HeaderGraph,
    metrics: &BTreeMap<PathBuf, DsmMetrics>,
    config: &AdvancedMetricsConfig,
    severity: &SeverityThresholds,
) -> AdvancedMetrics {
    let pagerank = compute_pagerank(graph);
    let betweenness = compute_betweenness(graph, config);

    let mut hubs = BTreeSet::new();
    let mut god_objects = BTreeSet::new();
    let mut stable_interfaces = BTreeSet::new();

    for (path, m) in metrics {
        if m.coupling >= severity.hub_threshold {
            hubs.insert(path.clone());
        }
        if m.fan_out >= severity.god_object_fan_out {
            god_objects.insert(path.clone());
        }
        if m.stability < severity.stable_interface_max {
            stable_interfaces.insert(path.clone());
        }
    }

    let couplings: Vec<f64> = metrics.values().map(|m| m.coupling as f64).collect();
    let mean = if couplings.is_empty() {
        0.0
    } else {
        couplings.iter().sum::<f64>() / couplings.len() as f64
    };
    let variance = if couplings.is_empty() {
        0.0
    } else {
        couplings.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / couplings.len() as f64
    };
    let stddev = variance.sqrt();

    let mut z_scores = BTreeMap::new();
    let mut outliers = BTreeSet::new();
    for (path, m) in metrics {
        let z = if stddev > 0.0 {
            (m.coupling as f64 - mean) / stddev
        } else {
            0.0
        };
        z_scores.insert(path.clone(), z);
        if z > severity.outlier_z_score {
            outliers.insert(path.clone());
        }
    }

    AdvancedMetrics {
        pagerank,
        betweenness,
        hubs,
        god_objects,
        stable_interfaces,
        outliers,
        z_scores,
    }
}

fn compute_pagerank(graph: &HeaderGraph) -> BTreeMap<PathBuf, f64> {
    let n = graph.node_count();
    if n == 0 {
        return BTreeMap::new();
    }
    let nodes: Vec<NodeIndex> = (0..n).map(NodeIndex::new).collect();
    let damping = 0.85;
    let mut rank: HashMap<NodeIndex, f64> = nodes.iter().map(|&i| (i, 1.0 / n as f64)).collect();

    for _ in 0..100 {
        let mut next: HashMap<NodeIndex, f64> = HashMap::new();
        let base = (1.0 - damping) / n as f64;
        for &node in &nodes {
            // Reverse graph: a header's importance accrues from headers
            // that depend on it, i.e. its predecessors in the include
            // graph (spec.md §4.4: "PageRank of the reverse graph").
            let mut sum = 0.0;
            for pred in graph.predecessors(node) {
                let out_degree = graph.fan_out(pred).max(1);
                sum += rank[&pred] / out_degree as f64;
            }
            next.insert(node, base + damping * sum);
        }
        rank = next;
    }

    nodes
        .iter()
        .map(|&i| (graph.path_of(i).to_path_buf(), rank[&i]))
        .collect()
}

/// Brandes' betweenness centrality, sampled over `k = min(cap,
/// |V|)` source pivots when `|V|` exceeds the exact threshold (spec.md
/// §4.4), using a seeded RNG so the result is reproducible for a fixed
/// seed (spec.md §9 Open Question 3).
fn compute_betweenness(graph: &HeaderGraph, config: &AdvancedMetricsConfig) -> BTreeMap<PathBuf, f64> {
    let n = graph.node_count();
    if n == 0 {
        return BTreeMap::new();
    }
    let all_nodes: Vec<NodeIndex> = (0..n).map(NodeIndex::new).collect();

    let sources: Vec<NodeIndex> = if n > config.betweenness_exact_below {
        let k = config.betweenness_sample_cap.min(n);
        let mut rng = StdRng::seed_from_u64(config.betweenness_seed);
        let mut pool = all_nodes.clone();
        pool.shuffle(&mut rng);
        pool.into_iter().take(k).collect()
    } else {
        all_nodes.clone()
    };

    let scale = n as f64 / sources.len().max(1) as f64;
    let mut centrality: HashMap<NodeIndex, f64> = all_nodes.iter().map(|&i| (i, 0.0)).collect();

    for &s in &sources {
        brandes_single_source(graph, s, &mut centrality);
    }

    all_nodes
        .iter()
        .map(|&i| (graph.path_of(i).to_path_buf(), centrality[&i] * scale))
        .collect()
}

fn brandes_single_source(graph: &HeaderGraph, s: NodeIndex, centrality: &mut HashMap<NodeIndex, f64>) {
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut predecessors: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    let mut sigma: HashMap<NodeIndex, f64> = HashMap::new();
    let mut dist: HashMap<NodeIndex, i64> = HashMap::new();

    for i in 0..graph.node_count() {
        let node = NodeIndex::new(i);
        predecessors.insert(node, Vec::new());
        sigma.insert(node, 0.0);
        dist.insert(node, -1);
    }
    sigma.insert(s, 1.0);
    dist.insert(s, 0);

    let mut queue: VecDeque<NodeIndex> = VecDeque::new();
    queue.push_back(s);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for w in graph.successors(v) {
            if dist[&w] < 0 {
                dist.insert(w, dist[&v] + 1);
                queue.push_back(w);
            }
            if dist[&w] == dist[&v] + 1 {
                let new_sigma = sigma[&w] + sigma[&v];
                sigma.insert(w, new_sigma);
                predecessors.get_mut(&w).unwrap().push(v);
            }
        }
    }

    let mut delta: HashMap<NodeIndex, f64> = HashMap::new();
    for &node in &stack {
        delta.insert(node, 0.0);
    }

    while let Some(w) = stack.pop() {
        for &v in &predecessors[&w] {
            let contrib = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
            *delta.get_mut(&v).unwrap() += contrib;
        }
        if w != s {
            *centrality.get_mut(&w).unwrap() += delta[&w];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioBuilder;

    fn advanced_off() -> AdvancedMetricsConfig {
        AdvancedMetricsConfig { enabled: false, ..Default::default() }
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "c.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert!(!result.has_cycles);
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h"])
            .edge("a.h", "a.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert!(result.has_cycles);
        assert_eq!(result.cycles.len(), 1);
        assert!(result.headers_in_cycles.contains(&PathBuf::from("a.h")));
    }

    #[test]
    fn test_three_cycle_detected_with_feedback_edge() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "c.h")
            .edge("c.h", "a.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert!(result.has_cycles);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].len(), 3);
        assert_eq!(result.feedback_edges.len(), 1);
    }

    #[test]
    fn test_metrics_fan_in_fan_out() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "c.h")
            .edge("b.h", "c.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert_eq!(result.metrics[&PathBuf::from("c.h")].fan_in, 2);
        assert_eq!(result.metrics[&PathBuf::from("a.h")].fan_out, 1);
    }

    #[test]
    fn test_layering_sinks_are_layer_zero() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h"])
            .edge("a.h", "b.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert_eq!(result.header_to_layer[&PathBuf::from("b.h")], 0);
        assert!(result.header_to_layer[&PathBuf::from("a.h")] > result.header_to_layer[&PathBuf::from("b.h")]);
    }

    #[test]
    fn test_coupling_sum_equals_edge_count_times_two() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "c.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        let sum_fan_out: usize = result.metrics.values().map(|m| m.fan_out).sum();
        let sum_fan_in: usize = result.metrics.values().map(|m| m.fan_in).sum();
        assert_eq!(sum_fan_out, sum_fan_in);
        assert_eq!(sum_fan_out, 2);
    }

    #[test]
    fn test_stability_always_in_unit_interval() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "c.h")
            .edge("c.h", "b.h")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        for m in result.metrics.values() {
            assert!(m.stability >= 0.0 && m.stability <= 1.0);
        }
    }

    #[test]
    fn test_advanced_metrics_when_enabled() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h", "c.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "c.h")
            .build();
        let config = AdvancedMetricsConfig { enabled: true, ..Default::default() };
        let result = run_dsm_analysis(&headers, &graph, &config, &SeverityThresholds::default());
        let advanced = result.advanced.expect("advanced metrics requested");
        assert_eq!(advanced.pagerank.len(), 3);
        assert_eq!(advanced.betweenness.len(), 3);
    }

    #[test]
    fn test_e5_bridge_edges_merge_two_sccs_into_one_cycle() {
        // spec.md §8 Scenario E5: two SCCs {Core, Shader, Renderer} and
        // {Pipeline, Texture, Physics} linked by Core->Pipeline and
        // Pipeline->Renderer. Because Renderer already reaches Core inside
        // the first SCC, the two bridge edges complete a longer cycle
        // through both groups (Core->Pipeline->Renderer->Core), so they
        // merge into a single six-member SCC rather than staying separate
        // (spec.md §4.4: a component "contributes to cycles" as a whole;
        // members of two originally distinct SCCs joined by a path in both
        // directions are one SCC, not two).
        let (headers, graph) = ScenarioBuilder::new()
            .edge("Core.hpp", "Shader.hpp")
            .edge("Shader.hpp", "Renderer.hpp")
            .edge("Renderer.hpp", "Core.hpp")
            .edge("Pipeline.hpp", "Texture.hpp")
            .edge("Texture.hpp", "Physics.hpp")
            .edge("Physics.hpp", "Pipeline.hpp")
            .edge("Core.hpp", "Pipeline.hpp")
            .edge("Pipeline.hpp", "Renderer.hpp")
            .build();
        let result = run_dsm_analysis(&headers, &graph, &advanced_off(), &SeverityThresholds::default());
        assert!(result.has_cycles);
        assert_eq!(result.cycles.len(), 1);
        let merged: BTreeSet<PathBuf> = [
            "Core.hpp",
            "Shader.hpp",
            "Renderer.hpp",
            "Pipeline.hpp",
            "Texture.hpp",
            "Physics.hpp",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(result.cycles[0], merged);
        // Exactly one feedback edge is proposed for the merged component.
        assert_eq!(result.feedback_edges.len(), 1);
    }

    #[test]
    fn test_empty_graph_has_zero_stats() {
        let result = run_dsm_analysis(
            &BTreeSet::new(),
            &IncludeGraph::new(),
            &advanced_off(),
            &SeverityThresholds::default(),
        );
        assert!(!result.has_cycles);
        assert_eq!(result.stats.total_headers, 0);
    }
}
