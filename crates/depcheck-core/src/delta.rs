use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::config::SeverityThresholds;
use crate::ripple::{compute_affected_sources_batch, RippleCache};
use crate::types::{ArchitecturalInsights, DsmAnalysisResults, DsmDelta, RippleImpact, Severity};

/// Compare two `DsmAnalysisResults` (spec.md §4.6 "Delta computation").
pub fn compute_delta(baseline: &DsmAnalysisResults, current: &DsmAnalysisResults) -> DsmDelta {
    let baseline_headers: BTreeSet<PathBuf> = baseline.sorted_headers.iter().cloned().collect();
    let current_headers: BTreeSet<PathBuf> = current.sorted_headers.iter().cloned().collect();

    let headers_added: BTreeSet<PathBuf> = current_headers.difference(&baseline_headers).cloned().collect();
    let headers_removed: BTreeSet<PathBuf> = baseline_headers.difference(&current_headers).cloned().collect();

    let (cycles_added, cycles_removed) = diff_cycles(&baseline.cycles, &current.cycles);

    let mut coupling_increased: BTreeMap<PathBuf, i64> = BTreeMap::new();
    let mut coupling_decreased: BTreeMap<PathBuf, i64> = BTreeMap::new();
    let mut became_stable: BTreeSet<PathBuf> = BTreeSet::new();
    let mut became_unstable: BTreeSet<PathBuf> = BTreeSet::new();

    for header in baseline_headers.intersection(&current_headers) {
        let base_m = &baseline.metrics[header];
        let cur_m = &current.metrics[header];
        let delta_coupling = cur_m.coupling as i64 - base_m.coupling as i64;
        if delta_coupling > 0 {
            coupling_increased.insert(header.clone(), delta_coupling);
        } else if delta_coupling < 0 {
            coupling_decreased.insert(header.clone(), delta_coupling);
        }

        // Threshold 0.5 is the design contract (spec.md §4.6).
        if base_m.stability >= 0.5 && cur_m.stability < 0.5 {
            became_unstable.insert(header.clone());
        } else if base_m.stability < 0.5 && cur_m.stability >= 0.5 {
            became_stable.insert(header.clone());
        }
    }

    let feedback_edges_added: BTreeSet<(PathBuf, PathBuf)> = current
        .feedback_edges
        .difference(&baseline.feedback_edges)
        .cloned()
        .collect();
    let feedback_edges_removed: BTreeSet<(PathBuf, PathBuf)> = baseline
        .feedback_edges
        .difference(&current.feedback_edges)
        .cloned()
        .collect();

    DsmDelta {
        headers_added,
        headers_removed,
        cycles_added,
        cycles_removed,
        coupling_increased,
        coupling_decreased,
        feedback_edges_added,
        feedback_edges_removed,
        architectural_insights: None,
    }
}

/// SCCs match across snapshots by vertex-set equality modulo vertices
/// present in only one side (spec.md §4.6). Matching proceeds greedily:
/// a baseline cycle is "preserved" if some current cycle shares all of its
/// still-present members, and vice versa.
fn diff_cycles(
    baseline_cycles: &[BTreeSet<PathBuf>],
    current_cycles: &[BTreeSet<PathBuf>],
) -> (Vec<BTreeSet<PathBuf>>, Vec<BTreeSet<PathBuf>>) {
    let mut cycles_added = Vec::new();
    for cycle in current_cycles {
        let matched = baseline_cycles.iter().any(|b| cycles_overlap_fully(b, cycle));
        if !matched {
            cycles_added.push(cycle.clone());
        }
    }

    let mut cycles_removed = Vec::new();
    for cycle in baseline_cycles {
        let matched = current_cycles.iter().any(|c| cycles_overlap_fully(cycle, c));
        if !matched {
            cycles_removed.push(cycle.clone());
        }
    }

    (cycles_added, cycles_removed)
}

/// Two cycles match "modulo vertices present in only one side": restrict
/// each to the intersection of the two header universes and compare.
fn cycles_overlap_fully(a: &BTreeSet<PathBuf>, b: &BTreeSet<PathBuf>) -> bool {
    let shared: BTreeSet<&PathBuf> = a.intersection(b).collect();
    !shared.is_empty() && shared.len() == a.len().min(b.len())
}

/// Add the qualitative half of the delta: severity, stability-change sets,
/// ripple impact, and an ordered recommendation list (spec.md §4.6
/// "Severity and recommendations").
pub fn annotate_insights(
    delta: &mut DsmDelta,
    baseline: &DsmAnalysisResults,
    current: &DsmAnalysisResults,
    changed_headers: &BTreeSet<PathBuf>,
    thresholds: &SeverityThresholds,
) {
    let became_stable = recompute_stability_transitions(baseline, current, true);
    let became_unstable = recompute_stability_transitions(baseline, current, false);

    let ripple_impact = compute_ripple_impact(baseline, current, changed_headers);

    let severity = compute_severity(delta, baseline, current, &ripple_impact, thresholds);
    let recommendations = build_recommendations(delta, baseline, current, &severity);

    delta.architectural_insights = Some(ArchitecturalInsights {
        severity,
        became_stable,
        became_unstable,
        ripple_impact,
        recommendations,
    });
}

fn recompute_stability_transitions(
    baseline: &DsmAnalysisResults,
    current: &DsmAnalysisResults,
    want_became_stable: bool,
) -> BTreeSet<PathBuf> {
    let mut result = BTreeSet::new();
    for (header, base_m) in &baseline.metrics {
        if let Some(cur_m) = current.metrics.get(header) {
            let became_stable = base_m.stability < 0.5 && cur_m.stability >= 0.5;
            let became_unstable = base_m.stability >= 0.5 && cur_m.stability < 0.5;
            if want_became_stable && became_stable {
                result.insert(header.clone());
            } else if !want_became_stable && became_unstable {
                result.insert(header.clone());
            }
        }
    }
    result
}

fn compute_ripple_impact(
    baseline: &DsmAnalysisResults,
    current: &DsmAnalysisResults,
    changed_headers: &BTreeSet<PathBuf>,
) -> Option<RippleImpact> {
    if changed_headers.is_empty() {
        return None;
    }

    let mut cache = RippleCache::new();
    // Treat the `reverse_deps` already computed per-snapshot as each
    // header's direct dependents, used here as a stand-in "header to
    // sources" map restricted to headers (depcheck-vcs supplies the real
    // source-level map when reconstructing a baseline).
    let affected = compute_affected_sources_batch(
        changed_headers,
        &current.header_to_headers,
        &current.reverse_deps,
        &mut cache,
    );

    let this_commit_rebuild_count = affected.len();

    // Each changed header's term is fan_in x (number of its dependents).
    // A header's dependents are exactly the headers that include it, i.e.
    // its in-degree, so this is fan_in^2 (spec.md §4.6).
    let current_cost: f64 = changed_headers
        .iter()
        .filter_map(|h| current.metrics.get(h))
        .map(|m| m.fan_in as f64 * m.fan_in as f64)
        .sum();
    let baseline_cost: f64 = changed_headers
        .iter()
        .filter_map(|h| baseline.metrics.get(h))
        .map(|m| m.fan_in as f64 * m.fan_in as f64)
        .sum();

    let ongoing_rebuild_delta_percentage = if baseline_cost > 0.0 {
        ((current_cost - baseline_cost) / baseline_cost) * 100.0
    } else if current_cost > 0.0 {
        100.0
    } else {
        0.0
    };

    Some(RippleImpact {
        this_commit_rebuild_count,
        ongoing_rebuild_delta_percentage,
    })
}

fn compute_severity(
    delta: &DsmDelta,
    _baseline: &DsmAnalysisResults,
    current: &DsmAnalysisResults,
    ripple_impact: &Option<RippleImpact>,
    thresholds: &SeverityThresholds,
) -> Severity {
    let god_object_introduced = current
        .advanced
        .as_ref()
        .map(|a| a.god_objects.iter().any(|h| delta.headers_added.contains(h)))
        .unwrap_or(false);

    let avg_coupling_increase_pct = {
        let total_increase: i64 = delta.coupling_increased.values().sum();
        let total_decrease: i64 = delta.coupling_decreased.values().sum::<i64>().abs();
        let base_total: usize = current.metrics.values().map(|m| m.coupling).sum();
        if base_total > 0 {
            ((total_increase - total_decrease) as f64 / base_total as f64) * 100.0
        } else {
            0.0
        }
    };

    if !delta.cycles_added.is_empty()
        || god_object_introduced
        || avg_coupling_increase_pct > thresholds.coupling_increase_critical_pct
    {
        return Severity::Critical;
    }

    let coupling_non_increasing = delta.coupling_increased.is_empty()
        || delta.coupling_decreased.len() >= delta.coupling_increased.len();

    if !delta.cycles_removed.is_empty() && coupling_non_increasing {
        return Severity::Positive;
    }

    let rebuild_regressed = ripple_impact
        .as_ref()
        .map(|r| r.ongoing_rebuild_delta_percentage > 0.0)
        .unwrap_or(false);

    if delta.headers_added.is_empty()
        && delta.headers_removed.is_empty()
        && delta.coupling_increased.is_empty()
        && !rebuild_regressed
    {
        // No regression of any kind (including the fully-empty "self-delta"
        // of an unchanged codebase) reads as a clean bill of health, not a
        // neutral one (spec.md §8 Scenario E1: "severity of 'self-delta' =
        // positive").
        return Severity::Positive;
    }

    if delta.coupling_decreased.len() > delta.coupling_increased.len() && !rebuild_regressed {
        return Severity::Positive;
    }

    if rebuild_regressed || !delta.coupling_increased.is_empty() {
        Severity::Moderate
    } else {
        Severity::Neutral
    }
}

fn build_recommendations(
    delta: &DsmDelta,
    baseline: &DsmAnalysisResults,
    current: &DsmAnalysisResults,
    severity: &Severity,
) -> Vec<String> {
    let mut recs = Vec::new();

    if !delta.cycles_added.is_empty() {
        recs.push(format!(
            "{} new circular dependency group(s) detected; consider breaking via the suggested feedback edge(s)",
            delta.cycles_added.len()
        ));
    }

    if let Some(pattern) = detect_interface_extraction(delta, baseline, current) {
        recs.push(pattern);
    }

    if *severity == Severity::Critical {
        if let Some(edge) = delta.feedback_edges_added.iter().next() {
            recs.push(format!(
                "critical edge introduced: {} -> {}",
                edge.0.display(),
                edge.1.display()
            ));
        }
    }

    if !delta.headers_removed.is_empty() && delta.cycles_removed.is_empty() {
        recs.push(format!(
            "{} header(s) removed with no cycle impact",
            delta.headers_removed.len()
        ));
    }

    recs
}

/// Interface-extraction detected when a high-fan-in header was removed and
/// a paired low-fan-in header was added whose name resembles an interface
/// (spec.md §4.6). Matches Scenario E4: `Utils/Logger.hpp` removed,
/// `Utils/ILogger.hpp` added.
fn detect_interface_extraction(
    delta: &DsmDelta,
    baseline: &DsmAnalysisResults,
    _current: &DsmAnalysisResults,
) -> Option<String> {
    let removed_high_fan_in = delta.headers_removed.iter().find(|h| {
        baseline
            .metrics
            .get(*h)
            .map(|m| m.fan_in >= 2)
            .unwrap_or(false)
    })?;

    let stem = removed_high_fan_in.file_stem()?.to_string_lossy().to_string();
    let added_interface = delta.headers_added.iter().find(|h| {
        let name = h.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        name.to_lowercase().contains(&stem.to_lowercase()) && name.to_lowercase().starts_with('i')
    })?;

    Some(format!(
        "interface extraction detected: {} replaced by {}",
        removed_high_fan_in.display(),
        added_interface.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvancedMetricsConfig;
    use crate::dsm::run_dsm_analysis;
    use crate::scenario::{scenario_e1, ScenarioBuilder};
    use crate::types::IncludeGraph;

    fn analyze(headers: &BTreeSet<PathBuf>, graph: &IncludeGraph) -> DsmAnalysisResults {
        run_dsm_analysis(headers, graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default())
    }

    #[test]
    fn test_e1_self_delta_is_positive() {
        let (headers, graph) = scenario_e1().build();
        let baseline = analyze(&headers, &graph);
        let current = analyze(&headers, &graph);
        let mut delta = compute_delta(&baseline, &current);
        annotate_insights(&mut delta, &baseline, &current, &BTreeSet::new(), &SeverityThresholds::default());
        assert!(delta.headers_added.is_empty());
        assert!(delta.headers_removed.is_empty());
        let insights = delta.architectural_insights.unwrap();
        assert_eq!(insights.severity, Severity::Positive);
    }

    #[test]
    fn test_e2_cycle_introduction() {
        let (base_headers, base_graph) = scenario_e1().build();
        let baseline = analyze(&base_headers, &base_graph);

        let (cur_headers, cur_graph) = scenario_e1()
            .edge("Engine/Core.hpp", "Graphics/PostProcess.hpp")
            .edge("Graphics/PostProcess.hpp", "Engine/Renderer.hpp")
            .edge("Engine/Renderer.hpp", "Engine/Core.hpp")
            .build();
        let current = analyze(&cur_headers, &cur_graph);

        let mut delta = compute_delta(&baseline, &current);
        annotate_insights(&mut delta, &baseline, &current, &BTreeSet::new(), &SeverityThresholds::default());

        assert!(!delta.cycles_added.is_empty());
        assert!(delta.headers_added.contains(&PathBuf::from("Graphics/PostProcess.hpp")));
        let insights = delta.architectural_insights.unwrap();
        assert!(insights.severity == Severity::Critical || insights.severity == Severity::Moderate);
        assert!(insights.recommendations.iter().any(|r| r.contains("circular")));
    }

    #[test]
    fn test_e3_forward_declaration_refactor() {
        let (base_headers, base_graph) = scenario_e1().build();
        let baseline = analyze(&base_headers, &base_graph);

        let mut cur_graph = base_graph.clone();
        cur_graph
            .get_mut(&PathBuf::from("Game/Player.hpp"))
            .unwrap()
            .remove(&PathBuf::from("Graphics/Texture.hpp"));
        let current = analyze(&base_headers, &cur_graph);

        let changed: BTreeSet<PathBuf> = [
            PathBuf::from("Game/Player.hpp"),
            PathBuf::from("Graphics/Texture.hpp"),
        ]
        .into_iter()
        .collect();
        let mut delta = compute_delta(&baseline, &current);
        annotate_insights(&mut delta, &baseline, &current, &changed, &SeverityThresholds::default());

        assert!(delta.cycles_added.is_empty());
        assert!(delta.cycles_removed.is_empty());
        assert_eq!(
            delta.coupling_decreased.get(&PathBuf::from("Game/Player.hpp")),
            Some(&-1)
        );
        let insights = delta.architectural_insights.unwrap();
        assert_eq!(insights.severity, Severity::Positive);
        let ripple = insights.ripple_impact.expect("ripple impact computed for non-empty change set");
        assert!(ripple.ongoing_rebuild_delta_percentage < 0.0);
    }

    #[test]
    fn test_self_loop_delta_shows_no_spurious_cycle_change() {
        let (headers, graph) = ScenarioBuilder::new().edge("a.h", "a.h").build();
        let baseline = analyze(&headers, &graph);
        let current = analyze(&headers, &graph);
        let delta = compute_delta(&baseline, &current);
        assert!(delta.cycles_added.is_empty());
        assert!(delta.cycles_removed.is_empty());
    }
}
