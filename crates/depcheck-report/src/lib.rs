//! The declared-external-collaborator surface of spec.md §6: CSV,
//! GraphML/GEXF/JSON/DOT graph export, and a colored console renderer.
//! Kept as a crate separate from `depcheck-core`, the same way the
//! teacher keeps `boundary-report` separate from `boundary-core`.

pub mod csv;
pub mod graph_export;
pub mod text;

pub use csv::write_csv;
pub use graph_export::{export_graph, GraphFormat};
pub use text::{
    format_diff_report, format_dsm_report, format_hell_report, format_ripple_report,
    format_summary_report,
};
