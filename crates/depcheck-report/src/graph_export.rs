use std::path::Path;

use depcheck_core::classify::PathClassifier;
use depcheck_core::types::{DsmAnalysisResults, FileType};
use serde::Serialize;

/// The four node-link graph formats depcheck can write (spec.md §6 "Graph
/// export"). `--export-graph FILE.ext` picks one of these from the file
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    GraphML,
    Gexf,
    Json,
    Dot,
}

impl GraphFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "graphml" => Some(GraphFormat::GraphML),
            "gexf" => Some(GraphFormat::Gexf),
            "json" => Some(GraphFormat::Json),
            "dot" => Some(GraphFormat::Dot),
            _ => None,
        }
    }
}

/// Per-node library attribution, derived from path classification rather
/// than carried through `DsmAnalysisResults` (spec.md §6: `library`
/// optional, `library_type`/`library_name` always present). Grounded on
/// `depcheck_core::classify::PathClassifier`, which already owns the
/// system/third-party/generated prefix rules this reuses.
struct LibraryAttribution {
    library: Option<String>,
    library_type: String,
    library_name: String,
}

fn attribute_library(path: &Path, classifier: &PathClassifier, third_party_prefixes: &[String]) -> LibraryAttribution {
    let file_type = classifier.classify(path);
    let library_name = match file_type {
        FileType::ThirdParty => third_party_library_name(path, third_party_prefixes),
        FileType::System => "system".to_string(),
        FileType::Generated => "generated".to_string(),
        FileType::Project => String::new(),
    };
    let library = if file_type == FileType::Project {
        None
    } else {
        Some(library_name.clone())
    };
    LibraryAttribution {
        library,
        library_type: file_type.to_string(),
        library_name,
    }
}

fn third_party_library_name(path: &Path, prefixes: &[String]) -> String {
    let s = path.to_string_lossy();
    for prefix in prefixes {
        if let Some(pos) = s.find(prefix.as_str()) {
            let after = &s[pos + prefix.len()..];
            if let Some(name) = after.split(['/', '\\']).find(|seg| !seg.is_empty()) {
                return name.to_string();
            }
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

struct NodeAttrs {
    id: String,
    label: String,
    path: String,
    fan_in: usize,
    fan_out: usize,
    coupling: usize,
    stability: f64,
    in_cycle: bool,
    library: LibraryAttribution,
    pagerank: Option<f64>,
    betweenness: Option<f64>,
    is_hub: Option<bool>,
    is_god_object: Option<bool>,
    is_interface: Option<bool>,
    is_outlier: Option<bool>,
    z_score: Option<f64>,
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn collect_node_attrs(
    results: &DsmAnalysisResults,
    project_root: &Path,
    classifier: &PathClassifier,
    third_party_prefixes: &[String],
) -> Vec<NodeAttrs> {
    results
        .sorted_headers
        .iter()
        .map(|path| {
            let metrics = results.metrics.get(path);
            let advanced = results.advanced.as_ref();
            NodeAttrs {
                id: relative_to(path, project_root),
                label: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                path: relative_to(path, project_root),
                fan_in: metrics.map(|m| m.fan_in).unwrap_or(0),
                fan_out: metrics.map(|m| m.fan_out).unwrap_or(0),
                coupling: metrics.map(|m| m.coupling).unwrap_or(0),
                stability: metrics.map(|m| m.stability).unwrap_or(0.5),
                in_cycle: results.headers_in_cycles.contains(path),
                library: attribute_library(path, classifier, third_party_prefixes),
                pagerank: advanced.map(|a| a.pagerank.get(path).copied().unwrap_or(0.0)),
                betweenness: advanced.map(|a| a.betweenness.get(path).copied().unwrap_or(0.0)),
                is_hub: advanced.map(|a| a.hubs.contains(path)),
                is_god_object: advanced.map(|a| a.god_objects.contains(path)),
                is_interface: advanced.map(|a| a.stable_interfaces.contains(path)),
                is_outlier: advanced.map(|a| a.outliers.contains(path)),
                z_score: advanced.map(|a| a.z_scores.get(path).copied().unwrap_or(0.0)),
            }
        })
        .collect()
}

struct EdgeAttrs {
    source: String,
    target: String,
    cross_library: Option<bool>,
    source_library: Option<String>,
    target_library: Option<String>,
}

fn collect_edge_attrs(
    results: &DsmAnalysisResults,
    project_root: &Path,
    classifier: &PathClassifier,
    third_party_prefixes: &[String],
) -> Vec<EdgeAttrs> {
    let mut edges = Vec::new();
    for (src, deps) in &results.include_graph {
        for dst in deps {
            let src_lib = attribute_library(src, classifier, third_party_prefixes).library;
            let dst_lib = attribute_library(dst, classifier, third_party_prefixes).library;
            let (cross_library, source_library, target_library) = match (&src_lib, &dst_lib) {
                (None, None) => (None, None, None),
                _ => (
                    Some(src_lib != dst_lib),
                    src_lib.clone(),
                    dst_lib.clone(),
                ),
            };
            edges.push(EdgeAttrs {
                source: relative_to(src, project_root),
                target: relative_to(dst, project_root),
                cross_library,
                source_library,
                target_library,
            });
        }
    }
    edges
}

/// Render `results` in `format` (spec.md §6 "Graph export"). `classifier`
/// and `third_party_prefixes` supply the optional library attribution;
/// pass the same `ClassifyConfig` the scan ran with.
pub fn export_graph(
    results: &DsmAnalysisResults,
    project_root: &Path,
    format: GraphFormat,
    classifier: &PathClassifier,
    third_party_prefixes: &[String],
) -> String {
    let nodes = collect_node_attrs(results, project_root, classifier, third_party_prefixes);
    let edges = collect_edge_attrs(results, project_root, classifier, third_party_prefixes);
    match format {
        GraphFormat::GraphML => render_graphml(&nodes, &edges),
        GraphFormat::Gexf => render_gexf(&nodes, &edges),
        GraphFormat::Json => render_json(&nodes, &edges),
        GraphFormat::Dot => render_dot(&nodes, &edges),
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_graphml(nodes: &[NodeAttrs], edges: &[EdgeAttrs]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <graph id=\"depcheck\" edgedefault=\"directed\">\n");

    for n in nodes {
        out.push_str(&format!("    <node id=\"{}\">\n", xml_escape(&n.id)));
        push_graphml_data(&mut out, "label", &n.label);
        push_graphml_data(&mut out, "path", &n.path);
        push_graphml_data(&mut out, "fan_in", &n.fan_in.to_string());
        push_graphml_data(&mut out, "fan_out", &n.fan_out.to_string());
        push_graphml_data(&mut out, "coupling", &n.coupling.to_string());
        push_graphml_data(&mut out, "stability", &format!("{:.4}", n.stability));
        push_graphml_data(&mut out, "in_cycle", &n.in_cycle.to_string());
        if let Some(library) = &n.library.library {
            push_graphml_data(&mut out, "library", library);
        }
        push_graphml_data(&mut out, "library_type", &n.library.library_type);
        push_graphml_data(&mut out, "library_name", &n.library.library_name);
        if let Some(v) = n.pagerank {
            push_graphml_data(&mut out, "pagerank", &format!("{v:.6}"));
        }
        if let Some(v) = n.betweenness {
            push_graphml_data(&mut out, "betweenness", &format!("{v:.6}"));
        }
        if let Some(v) = n.is_hub {
            push_graphml_data(&mut out, "is_hub", &v.to_string());
        }
        if let Some(v) = n.is_god_object {
            push_graphml_data(&mut out, "is_god_object", &v.to_string());
        }
        if let Some(v) = n.is_interface {
            push_graphml_data(&mut out, "is_interface", &v.to_string());
        }
        if let Some(v) = n.is_outlier {
            push_graphml_data(&mut out, "is_outlier", &v.to_string());
        }
        if let Some(v) = n.z_score {
            push_graphml_data(&mut out, "z_score", &format!("{v:.6}"));
        }
        out.push_str("    </node>\n");
    }

    for (i, e) in edges.iter().enumerate() {
        out.push_str(&format!(
            "    <edge id=\"e{i}\" source=\"{}\" target=\"{}\">\n",
            xml_escape(&e.source),
            xml_escape(&e.target)
        ));
        if let Some(v) = e.cross_library {
            push_graphml_data(&mut out, "cross_library", &v.to_string());
        }
        if let Some(v) = &e.source_library {
            push_graphml_data(&mut out, "source_library", v);
        }
        if let Some(v) = &e.target_library {
            push_graphml_data(&mut out, "target_library", v);
        }
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

fn push_graphml_data(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!(
        "      <data key=\"{}\">{}</data>\n",
        xml_escape(key),
        xml_escape(value)
    ));
}

fn render_gexf(nodes: &[NodeAttrs], edges: &[EdgeAttrs]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<gexf xmlns=\"http://gexf.net/1.3\" version=\"1.3\">\n");
    out.push_str("  <graph mode=\"static\" defaultedgetype=\"directed\">\n");
    out.push_str("    <nodes>\n");
    for (i, n) in nodes.iter().enumerate() {
        out.push_str(&format!(
            "      <node id=\"{i}\" label=\"{}\">\n",
            xml_escape(&n.label)
        ));
        out.push_str("        <attvalues>\n");
        push_gexf_attvalue(&mut out, "path", &n.path);
        push_gexf_attvalue(&mut out, "fan_in", &n.fan_in.to_string());
        push_gexf_attvalue(&mut out, "fan_out", &n.fan_out.to_string());
        push_gexf_attvalue(&mut out, "coupling", &n.coupling.to_string());
        push_gexf_attvalue(&mut out, "stability", &format!("{:.4}", n.stability));
        push_gexf_attvalue(&mut out, "in_cycle", &n.in_cycle.to_string());
        if let Some(library) = &n.library.library {
            push_gexf_attvalue(&mut out, "library", library);
        }
        push_gexf_attvalue(&mut out, "library_type", &n.library.library_type);
        push_gexf_attvalue(&mut out, "library_name", &n.library.library_name);
        if let Some(v) = n.pagerank {
            push_gexf_attvalue(&mut out, "pagerank", &format!("{v:.6}"));
        }
        if let Some(v) = n.betweenness {
            push_gexf_attvalue(&mut out, "betweenness", &format!("{v:.6}"));
        }
        if let Some(v) = n.is_hub {
            push_gexf_attvalue(&mut out, "is_hub", &v.to_string());
        }
        if let Some(v) = n.is_god_object {
            push_gexf_attvalue(&mut out, "is_god_object", &v.to_string());
        }
        if let Some(v) = n.is_interface {
            push_gexf_attvalue(&mut out, "is_interface", &v.to_string());
        }
        if let Some(v) = n.is_outlier {
            push_gexf_attvalue(&mut out, "is_outlier", &v.to_string());
        }
        if let Some(v) = n.z_score {
            push_gexf_attvalue(&mut out, "z_score", &format!("{v:.6}"));
        }
        out.push_str("        </attvalues>\n");
        out.push_str("      </node>\n");
    }
    out.push_str("    </nodes>\n");

    let index_of: std::collections::HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    out.push_str("    <edges>\n");
    for (i, e) in edges.iter().enumerate() {
        let source = index_of.get(e.source.as_str()).copied().unwrap_or(0);
        let target = index_of.get(e.target.as_str()).copied().unwrap_or(0);
        out.push_str(&format!(
            "      <edge id=\"{i}\" source=\"{source}\" target=\"{target}\">\n"
        ));
        out.push_str("        <attvalues>\n");
        if let Some(v) = e.cross_library {
            push_gexf_attvalue(&mut out, "cross_library", &v.to_string());
        }
        if let Some(v) = &e.source_library {
            push_gexf_attvalue(&mut out, "source_library", v);
        }
        if let Some(v) = &e.target_library {
            push_gexf_attvalue(&mut out, "target_library", v);
        }
        out.push_str("        </attvalues>\n");
        out.push_str("      </edge>\n");
    }
    out.push_str("    </edges>\n  </graph>\n</gexf>\n");
    out
}

fn push_gexf_attvalue(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!(
        "          <attvalue for=\"{}\" value=\"{}\"/>\n",
        xml_escape(key),
        xml_escape(value)
    ));
}

#[derive(Serialize)]
struct JsonNode {
    id: String,
    label: String,
    path: String,
    fan_in: usize,
    fan_out: usize,
    coupling: usize,
    stability: f64,
    in_cycle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    library: Option<String>,
    library_type: String,
    library_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagerank: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    betweenness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_hub: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_god_object: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_interface: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_outlier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    z_score: Option<f64>,
}

#[derive(Serialize)]
struct JsonEdge {
    source: String,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cross_library: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_library: Option<String>,
}

#[derive(Serialize)]
struct JsonGraph {
    nodes: Vec<JsonNode>,
    edges: Vec<JsonEdge>,
}

fn render_json(nodes: &[NodeAttrs], edges: &[EdgeAttrs]) -> String {
    let graph = JsonGraph {
        nodes: nodes
            .iter()
            .map(|n| JsonNode {
                id: n.id.clone(),
                label: n.label.clone(),
                path: n.path.clone(),
                fan_in: n.fan_in,
                fan_out: n.fan_out,
                coupling: n.coupling,
                stability: n.stability,
                in_cycle: n.in_cycle,
                library: n.library.library.clone(),
                library_type: n.library.library_type.clone(),
                library_name: n.library.library_name.clone(),
                pagerank: n.pagerank,
                betweenness: n.betweenness,
                is_hub: n.is_hub,
                is_god_object: n.is_god_object,
                is_interface: n.is_interface,
                is_outlier: n.is_outlier,
                z_score: n.z_score,
            })
            .collect(),
        edges: edges
            .iter()
            .map(|e| JsonEdge {
                source: e.source.clone(),
                target: e.target.clone(),
                cross_library: e.cross_library,
                source_library: e.source_library.clone(),
                target_library: e.target_library.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&graph).expect("graph export should be serializable")
}

/// DOT output colors cyclic headers red, matching the teacher's
/// violation-red convention for "bad" edges and nodes.
fn render_dot(nodes: &[NodeAttrs], edges: &[EdgeAttrs]) -> String {
    let mut out = String::new();
    out.push_str("digraph depcheck {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=filled, fillcolor=white];\n\n");

    for n in nodes {
        let id = sanitize_dot_id(&n.id);
        let color = if n.in_cycle { ", color=red" } else { "" };
        out.push_str(&format!(
            "  {id} [label=\"{}\\nfan_in={} fan_out={}\"{color}];\n",
            n.label, n.fan_in, n.fan_out
        ));
    }
    out.push('\n');

    for e in &edges {
        let from = sanitize_dot_id(&e.source);
        let to = sanitize_dot_id(&e.target);
        if e.cross_library == Some(true) {
            out.push_str(&format!("  {from} -> {to} [style=dashed];\n"));
        } else {
            out.push_str(&format!("  {from} -> {to};\n"));
        }
    }

    out.push_str("}\n");
    out
}

fn sanitize_dot_id(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) || cleaned.is_empty() {
        format!("n_{cleaned}")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depcheck_core::config::{AdvancedMetricsConfig, ClassifyConfig, SeverityThresholds};
    use depcheck_core::dsm::run_dsm_analysis;
    use depcheck_core::scenario::ScenarioBuilder;

    fn classifier() -> PathClassifier {
        PathClassifier::new(&ClassifyConfig::default(), None)
    }

    #[test]
    fn test_graph_format_from_extension() {
        assert_eq!(GraphFormat::from_extension("graphml"), Some(GraphFormat::GraphML));
        assert_eq!(GraphFormat::from_extension("GEXF"), Some(GraphFormat::Gexf));
        assert_eq!(GraphFormat::from_extension("unknown"), None);
    }

    #[test]
    fn test_export_json_round_trips_node_count() {
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
        let json = export_graph(&results, Path::new(""), GraphFormat::Json, &classifier(), &[]);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["edges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_export_dot_marks_cycle_red() {
        let (headers, graph) = ScenarioBuilder::new().edge("a.h", "a.h").build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let dot = export_graph(&results, Path::new(""), GraphFormat::Dot, &classifier(), &[]);
        assert!(dot.contains("color=red"));
    }

    #[test]
    fn test_export_graphml_well_formed_header() {
        let (headers, graph) = ScenarioBuilder::new().headers(["a.h"]).build();
        let results = run_dsm_analysis(
            &headers,
            &graph,
            &AdvancedMetricsConfig::default(),
            &SeverityThresholds::default(),
        );
        let xml = export_graph(&results, Path::new(""), GraphFormat::GraphML, &classifier(), &[]);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<graphml"));
    }

    #[test]
    fn test_third_party_library_name_extracted() {
        let path = Path::new("/repo/third_party/zlib/zlib.h");
        let name = third_party_library_name(path, &["third_party/".to_string()]);
        assert_eq!(name, "zlib");
    }

    #[test]
    fn test_library_attrs_absent_for_project_headers() {
        let classify_config = ClassifyConfig::default();
        let c = PathClassifier::new(&classify_config, None);
        let attrs = attribute_library(
            Path::new("/repo/src/a.h"),
            &c,
            &classify_config.third_party_prefixes,
        );
        assert!(attrs.library.is_none());
        assert_eq!(attrs.library_type, "project");
    }
}
