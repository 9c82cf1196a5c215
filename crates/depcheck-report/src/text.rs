use std::path::{Path, PathBuf};

use colored::Colorize;

use depcheck_core::types::{DsmAnalysisResults, DsmDelta, Severity};

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn health_label(results: &DsmAnalysisResults) -> colored::ColoredString {
    let text = results.stats.health.to_string().to_uppercase();
    match results.stats.health.color() {
        "green" => text.green().bold(),
        "cyan" => text.cyan().bold(),
        "yellow" => text.yellow().bold(),
        "red" => text.red().bold(),
        _ => text.normal(),
    }
}

/// The shared header block every subcommand's text view opens with
/// (matching `boundary-report::text::format_report`'s banner-then-rule
/// idiom).
fn section_header(title: &str) -> String {
    format!("\n{}\n{}\n", title.bold(), "=".repeat(40))
}

/// `dsm` subcommand: full matrix/architecture view (spec.md §6, `--top`,
/// `--cycles-only`, `--show-layers`).
#[allow(clippy::too_many_arguments)]
pub fn format_dsm_report(
    results: &DsmAnalysisResults,
    project_root: &Path,
    top: usize,
    cycles_only: bool,
    show_layers: bool,
) -> String {
    let mut out = String::new();
    out.push_str(&section_header("Dependency Structure Matrix"));

    out.push_str(&format!(
        "Headers: {}  Health: {}  Sparsity: {:.1}%  Avg deps/header: {:.1}\n",
        results.stats.total_headers,
        health_label(results),
        results.stats.sparsity * 100.0,
        results.stats.avg_deps,
    ));

    if !cycles_only && top > 0 {
        out.push_str(&format!("\n{}\n{}\n", "Top Headers by Coupling".bold(), "-".repeat(40)));
        let mut ranked: Vec<(&PathBuf, &depcheck_core::types::DsmMetrics)> = results.metrics.iter().collect();
        ranked.sort_by(|a, b| b.1.coupling.cmp(&a.1.coupling).then_with(|| a.0.cmp(b.0)));
        for (path, m) in ranked.into_iter().take(top) {
            out.push_str(&format!(
                "  {:<50} fan_in={:<4} fan_out={:<4} coupling={:<4} stability={:.2}\n",
                relative_to(path, project_root),
                m.fan_in,
                m.fan_out,
                m.coupling,
                m.stability,
            ));
        }
    }

    out.push_str(&format_cycles_section(results, project_root));

    if !cycles_only && (show_layers || !results.has_cycles) {
        out.push_str(&format_layers_section(results, project_root));
    }

    if let Some(advanced) = &results.advanced {
        out.push_str(&format!("\n{}\n{}\n", "Architectural Patterns".bold(), "-".repeat(40)));
        if !advanced.hubs.is_empty() {
            out.push_str(&format!("  Hubs: {}\n", format_path_list(&advanced.hubs, project_root)));
        }
        if !advanced.god_objects.is_empty() {
            out.push_str(&format!(
                "  {}: {}\n",
                "God objects".red(),
                format_path_list(&advanced.god_objects, project_root)
            ));
        }
        if !advanced.stable_interfaces.is_empty() {
            out.push_str(&format!(
                "  Stable interfaces: {}\n",
                format_path_list(&advanced.stable_interfaces, project_root)
            ));
        }
        if !advanced.outliers.is_empty() {
            out.push_str(&format!(
                "  {}: {}\n",
                "Coupling outliers".yellow(),
                format_path_list(&advanced.outliers, project_root)
            ));
        }
    }

    out
}

fn format_path_list(paths: &std::collections::BTreeSet<PathBuf>, project_root: &Path) -> String {
    paths
        .iter()
        .map(|p| relative_to(p, project_root))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_cycles_section(results: &DsmAnalysisResults, project_root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n{}\n", "Circular Dependencies".bold(), "-".repeat(40)));
    if results.cycles.is_empty() {
        out.push_str(&format!("  {}\n", "No cycles detected.".green()));
        return out;
    }
    for (i, cycle) in results.cycles.iter().enumerate() {
        let members: Vec<String> = cycle.iter().map(|p| relative_to(p, project_root)).collect();
        out.push_str(&format!("  {} {} ({} headers)\n", format!("Cycle {}:", i + 1).red().bold(), members.join(" -> "), cycle.len()));
    }
    if !results.feedback_edges.is_empty() {
        out.push_str("  Suggested feedback edges to break:\n");
        for (src, dst) in &results.feedback_edges {
            out.push_str(&format!(
                "    {} -> {}\n",
                relative_to(src, project_root),
                relative_to(dst, project_root)
            ));
        }
    }
    out
}

fn format_layers_section(results: &DsmAnalysisResults, project_root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n{}\n", "Layers".bold(), "-".repeat(40)));
    for (i, layer) in results.layers.iter().enumerate() {
        let members: Vec<String> = layer.iter().map(|p| relative_to(p, project_root)).collect();
        out.push_str(&format!("  L{}: {}\n", i, members.join(", ")));
    }
    out
}

/// `hell` subcommand: ranked dependency-hell views (spec.md §4.4 advanced
/// metrics plus `original_source/lib/dependency_utils.py::identify_problematic_headers`'
/// "worst offenders / build impact / rebuild cost / hub headers" shape).
pub fn format_hell_report(results: &DsmAnalysisResults, project_root: &Path, threshold: usize, top: usize) -> String {
    let mut out = String::new();
    out.push_str(&section_header("Dependency Hell Analysis"));

    let mut worst_offenders: Vec<(&PathBuf, usize)> = results
        .metrics
        .iter()
        .map(|(p, m)| (p, m.fan_out))
        .filter(|(_, fan_out)| *fan_out >= threshold)
        .collect();
    worst_offenders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    if worst_offenders.is_empty() {
        out.push_str(&format!("{}\n", "No headers exceeded the dependency threshold.".green()));
        return out;
    }

    out.push_str(&format!("\n{}\n{}\n", "Worst Offenders (most transitive dependencies)".bold(), "-".repeat(40)));
    for (path, fan_out) in worst_offenders.iter().take(top) {
        let severity = hell_severity(*fan_out);
        out.push_str(&format!(
            "  {:<50} deps={:<5} {}\n",
            relative_to(path, project_root),
            fan_out,
            severity
        ));
    }

    out.push_str(&format!("\n{}\n{}\n", "Rebuild Cost (usage x dependents)".bold(), "-".repeat(40)));
    let mut rebuild_cost: Vec<(&PathBuf, usize)> = results
        .metrics
        .iter()
        .map(|(p, m)| (p, m.fan_out.saturating_mul(m.fan_in)))
        .filter(|(_, cost)| *cost > 0)
        .collect();
    rebuild_cost.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    for (path, cost) in rebuild_cost.iter().take(top) {
        out.push_str(&format!("  {:<50} cost={}\n", relative_to(path, project_root), cost));
    }

    out.push_str(&format!("\n{}\n{}\n", "Hub Headers (architectural bottlenecks)".bold(), "-".repeat(40)));
    let mut hubs: Vec<(&PathBuf, usize)> = results.metrics.iter().map(|(p, m)| (p, m.fan_in)).collect();
    hubs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    for (path, fan_in) in hubs.iter().take(top) {
        out.push_str(&format!("  {:<50} dependents={}\n", relative_to(path, project_root), fan_in));
    }

    out
}

/// CRITICAL (>500) / HIGH (300-500) / MODERATE (<300), the thresholds
/// `original_source/buildCheckDependencyHell.py`'s epilog documents.
fn hell_severity(transitive_deps: usize) -> colored::ColoredString {
    if transitive_deps > 500 {
        "CRITICAL".red().bold()
    } else if transitive_deps >= 300 {
        "HIGH".yellow().bold()
    } else {
        "MODERATE".normal()
    }
}

/// `ripple` subcommand: affected-sources view for a changed-headers set.
pub fn format_ripple_report(changed_headers: &[PathBuf], affected_sources: &std::collections::BTreeSet<PathBuf>, project_root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&section_header("Ripple Effect Analysis"));

    out.push_str(&format!("Changed headers ({}):\n", changed_headers.len()));
    for header in changed_headers {
        out.push_str(&format!("  {}\n", relative_to(header, project_root)));
    }

    out.push_str(&format!(
        "\n{} ({} translation units must recompile)\n{}\n",
        "Affected Sources".bold(),
        affected_sources.len(),
        "-".repeat(40),
    ));
    for source in affected_sources {
        out.push_str(&format!("  {}\n", relative_to(source, project_root)));
    }

    out
}

/// `summary` subcommand: condensed health overview.
pub fn format_summary_report(results: &DsmAnalysisResults, project_root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&section_header("Build Health Summary"));

    out.push_str(&format!("  Headers analyzed: {}\n", results.stats.total_headers));
    out.push_str(&format!("  Overall health:   {}\n", health_label(results)));
    out.push_str(&format!("  Cycles found:     {}\n", results.cycles.len()));
    out.push_str(&format!("  Headers in layers: {}\n", results.layers.len()));

    if !results.cycles.is_empty() {
        let worst = results.cycles.iter().max_by_key(|c| c.len()).unwrap();
        out.push_str(&format!(
            "  {} largest cycle has {} headers, e.g. {}\n",
            "Warning:".yellow().bold(),
            worst.len(),
            basename(worst.iter().next().unwrap())
        ));
    }

    if let Some(advanced) = &results.advanced {
        if !advanced.god_objects.is_empty() {
            out.push_str(&format!(
                "  {} {} god-object header(s) detected\n",
                "Warning:".yellow().bold(),
                advanced.god_objects.len()
            ));
        }
    }

    let _ = project_root;
    out
}

/// `diff` (baseline comparison): delta severity and recommendations view
/// (spec.md §4.6 "Severity and recommendations").
pub fn format_diff_report(delta: &DsmDelta, project_root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&section_header("Differential Analysis"));

    out.push_str(&format!("  Headers added:   {}\n", delta.headers_added.len()));
    out.push_str(&format!("  Headers removed: {}\n", delta.headers_removed.len()));
    out.push_str(&format!(
        "  Cycles: {} new, {} resolved\n",
        delta.cycles_added.len(),
        delta.cycles_removed.len()
    ));
    out.push_str(&format!(
        "  Coupling: {} headers increased, {} decreased\n",
        delta.coupling_increased.len(),
        delta.coupling_decreased.len()
    ));

    if !delta.cycles_added.is_empty() {
        out.push_str(&format!("\n{}\n", "New Cycles".red().bold()));
        for cycle in &delta.cycles_added {
            let members: Vec<String> = cycle.iter().map(|p| relative_to(p, project_root)).collect();
            out.push_str(&format!("  {}\n", members.join(" -> ")));
        }
    }

    if let Some(insights) = &delta.architectural_insights {
        let severity_str = match insights.severity {
            Severity::Positive => "POSITIVE".green().bold(),
            Severity::Neutral => "NEUTRAL".normal(),
            Severity::Moderate => "MODERATE".yellow().bold(),
            Severity::Critical => "CRITICAL".red().bold(),
        };
        out.push_str(&format!("\n{}: {}\n", "Severity".bold(), severity_str));

        if !insights.became_unstable.is_empty() {
            out.push_str(&format!(
                "  Became unstable: {}\n",
                format_path_list(&insights.became_unstable, project_root)
            ));
        }
        if !insights.became_stable.is_empty() {
            out.push_str(&format!(
                "  Became stable: {}\n",
                format_path_list(&insights.became_stable, project_root)
            ));
        }

        if let Some(ripple) = &insights.ripple_impact {
            out.push_str(&format!(
                "  Ripple impact: {} sources rebuild this commit ({:+.1}% vs. baseline)\n",
                ripple.this_commit_rebuild_count, ripple.ongoing_rebuild_delta_percentage
            ));
        }

        if !insights.recommendations.is_empty() {
            out.push_str(&format!("\n{}\n", "Recommendations".bold()));
            for rec in &insights.recommendations {
                out.push_str(&format!("  - {rec}\n"));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use depcheck_core::config::{AdvancedMetricsConfig, SeverityThresholds};
    use depcheck_core::delta::{annotate_insights, compute_delta};
    use depcheck_core::dsm::run_dsm_analysis;
    use depcheck_core::scenario::ScenarioBuilder;

    #[test]
    fn test_format_dsm_report_reports_no_cycles() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a.h", "b.h"]).edge("a.h", "b.h").build();
        let results = run_dsm_analysis(&headers, &graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());
        let report = format_dsm_report(&results, Path::new(""), 10, false, false);
        assert!(report.contains("No cycles detected"));
    }

    #[test]
    fn test_format_dsm_report_lists_cycle_members() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "a.h")
            .build();
        let results = run_dsm_analysis(&headers, &graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());
        let report = format_dsm_report(&results, Path::new(""), 10, true, false);
        assert!(report.contains("a.h"));
        assert!(report.contains("b.h"));
    }

    #[test]
    fn test_format_hell_report_empty_below_threshold() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a.h"]).build();
        let results = run_dsm_analysis(&headers, &graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());
        let report = format_hell_report(&results, Path::new(""), 50, 10);
        assert!(report.contains("No headers exceeded"));
    }

    #[test]
    fn test_format_ripple_report_lists_sources() {
        let mut affected = std::collections::BTreeSet::new();
        affected.insert(PathBuf::from("main.cpp"));
        let report = format_ripple_report(&[PathBuf::from("a.h")], &affected, Path::new(""));
        assert!(report.contains("main.cpp"));
        assert!(report.contains("a.h"));
    }

    #[test]
    fn test_format_summary_report_shows_health() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a.h"]).build();
        let results = run_dsm_analysis(&headers, &graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());
        let report = format_summary_report(&results, Path::new(""));
        assert!(report.contains("Overall health"));
    }

    #[test]
    fn test_format_diff_report_shows_severity() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a.h"]).build();
        let baseline = run_dsm_analysis(&headers, &graph, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());

        let (headers2, graph2) = ScenarioBuilder::new()
            .headers(["a.h", "b.h"])
            .edge("a.h", "b.h")
            .edge("b.h", "a.h")
            .build();
        let current = run_dsm_analysis(&headers2, &graph2, &AdvancedMetricsConfig::default(), &SeverityThresholds::default());

        let mut delta = compute_delta(&baseline, &current);
        let changed = std::collections::BTreeSet::new();
        annotate_insights(&mut delta, &baseline, &current, &changed, &SeverityThresholds::default());

        let report = format_diff_report(&delta, Path::new(""));
        assert!(report.contains("Severity"));
    }
}
