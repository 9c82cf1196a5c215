use std::path::{Path, PathBuf};

use depcheck_core::types::DsmAnalysisResults;

/// Render the full dependency structure matrix as CSV (spec.md §6 "CSV
/// export"): one header row, then one row per header with its metrics
/// followed by one `0`/`1` cell per other header marking a direct include.
/// All paths are rendered project-relative.
pub fn write_csv(results: &DsmAnalysisResults, project_root: &Path) -> String {
    let headers = &results.sorted_headers;
    let rel = |p: &Path| relative_to(p, project_root);

    let mut out = String::new();
    out.push_str("Header,Fan-out,Fan-in,Coupling,Stability");
    for h in headers {
        out.push(',');
        out.push_str(&csv_escape(&rel(h)));
    }
    out.push('\n');

    for row_header in headers {
        let metrics = results.metrics.get(row_header);
        let deps = results.header_to_headers.get(row_header);

        out.push_str(&csv_escape(&rel(row_header)));
        out.push(',');
        out.push_str(&metrics.map(|m| m.fan_out.to_string()).unwrap_or_default());
        out.push(',');
        out.push_str(&metrics.map(|m| m.fan_in.to_string()).unwrap_or_default());
        out.push(',');
        out.push_str(&metrics.map(|m| m.coupling.to_string()).unwrap_or_default());
        out.push(',');
        out.push_str(&metrics.map(|m| format!("{:.4}", m.stability)).unwrap_or_default());

        for col_header in headers {
            out.push(',');
            let includes = deps.map(|d| d.contains(col_header)).unwrap_or(false);
            out.push(if includes { '1' } else { '0' });
        }
        out.push('\n');
    }

    out
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

/// Quote a field if it contains a comma, quote, or newline (RFC 4180).
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depcheck_core::config::{AdvancedMetricsConfig, SeverityThresholds};
    use depcheck_core::dsm::run_dsm_analysis;
    use depcheck_core::scenario::ScenarioBuilder;

    #[test]
    fn test_csv_header_row_lists_all_headers() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h"])
            .edge("a.h", "b.h")
            .build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let csv = write_csv(&results, Path::new(""));
        let first_line = csv.lines().next().unwrap();
        assert_eq!(first_line, "Header,Fan-out,Fan-in,Coupling,Stability,a.h,b.h");
    }

    #[test]
    fn test_csv_dependency_cell_is_one_for_direct_include() {
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["a.h", "b.h"])
            .edge("a.h", "b.h")
            .build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let csv = write_csv(&results, Path::new(""));
        let a_row = csv.lines().find(|l| l.starts_with("a.h,")).unwrap();
        let cells: Vec<&str> = a_row.split(',').collect();
        // Header,Fan-out,Fan-in,Coupling,Stability,a.h,b.h
        assert_eq!(cells[5], "0"); // a.h -> a.h
        assert_eq!(cells[6], "1"); // a.h -> b.h
    }

    #[test]
    fn test_csv_paths_are_project_relative() {
        let root = PathBuf::from("/repo");
        let (headers, graph) = ScenarioBuilder::new()
            .headers(["/repo/a.h"])
            .build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let csv = write_csv(&results, &root);
        assert!(csv.contains("a.h"));
        assert!(!csv.contains("/repo/a.h"));
    }

    #[test]
    fn test_csv_escapes_commas_in_paths() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a,b.h"]).build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let csv = write_csv(&results, Path::new(""));
        assert!(csv.contains("\"a,b.h\""));
    }
}
