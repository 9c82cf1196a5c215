use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use depcheck_core::classify::{apply_filters, PathClassifier};
use depcheck_core::config::Config;
use depcheck_core::delta::{annotate_insights, compute_delta};
use depcheck_core::dsm::run_dsm_analysis;
use depcheck_core::error::DepcheckError;
use depcheck_core::ripple::{build_reverse_dependency_map, compute_affected_sources_batch, RippleCache};
use depcheck_core::snapshot;
use depcheck_core::types::DsmAnalysisResults;
use depcheck_report::{export_graph, format_diff_report, format_dsm_report, format_hell_report, format_ripple_report, format_summary_report, write_csv, GraphFormat};
use depcheck_scan::scan_build_directory;
use depcheck_vcs::reconstruct_baseline;

#[derive(Parser)]
#[command(name = "depcheck")]
#[command(about = "Header-inclusion dependency-graph analysis for C/C++ ninja builds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every analysis subcommand (spec.md §6 "Common flags").
#[derive(clap::Args, Clone)]
struct CommonArgs {
    /// Path to the ninja build directory (e.g., build/release)
    #[arg(value_name = "BUILD_DIR")]
    build_directory: PathBuf,
    /// Limit ranked outputs to N rows (0 disables matrix display)
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Suppress non-cycle sections
    #[arg(long)]
    cycles_only: bool,
    /// Force layer display
    #[arg(long)]
    show_layers: bool,
    /// Write full DSM to CSV
    #[arg(long, value_name = "FILE.csv")]
    export: Option<PathBuf>,
    /// Write node-link graph (formats: .graphml, .gexf, .json, .dot)
    #[arg(long, value_name = "FILE")]
    export_graph: Option<PathBuf>,
    /// Include only paths matching GLOB (project-relative)
    #[arg(long, value_name = "GLOB")]
    filter: Option<String>,
    /// Exclude paths matching GLOB (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,
    /// Persist a snapshot to FILE
    #[arg(long, value_name = "FILE")]
    save_results: Option<PathBuf>,
    /// Load a snapshot and produce a delta against the current build
    #[arg(long, value_name = "FILE")]
    load_baseline: Option<PathBuf>,
    /// Analyze a second build directory and produce a delta
    #[arg(long, value_name = "BUILD_DIR")]
    compare_with: Option<PathBuf>,
    /// Debug logging
    #[arg(long)]
    verbose: bool,
    /// Enable advanced metrics (PageRank, betweenness, hub/god-object detection)
    #[arg(long)]
    advanced_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full DSM/architecture view: matrix, cycles, layers
    Dsm(CommonArgs),
    /// Dependency-hell view: worst offenders, rebuild cost, hub headers
    Hell {
        #[command(flatten)]
        common: CommonArgs,
        /// Minimum transitive dependency count to flag as problematic
        #[arg(long, default_value_t = 50)]
        threshold: usize,
    },
    /// Ripple-effect analysis: affected sources for a set of changed headers
    Ripple {
        #[command(flatten)]
        common: CommonArgs,
        /// Changed header paths to compute affected sources for
        #[arg(long = "changed", value_name = "PATH", required = true)]
        changed_headers: Vec<PathBuf>,
    },
    /// Condensed build-health overview
    Summary(CommonArgs),
    /// Reconstruct a baseline from version control and diff against it
    Diff {
        #[command(flatten)]
        common: CommonArgs,
        /// Path to the git repository (default: the build directory)
        #[arg(long, value_name = "REPO_DIR")]
        repo: Option<PathBuf>,
        /// Git reference to reconstruct the baseline from (default: HEAD)
        #[arg(long = "from", value_name = "REF", default_value = "HEAD")]
        from_ref: String,
    },
    /// Create a default .depcheck.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    if std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dsm(common) => cmd_dsm(&common),
        Commands::Hell { common, threshold } => cmd_hell(&common, threshold),
        Commands::Ripple { common, changed_headers } => cmd_ripple(&common, &changed_headers),
        Commands::Summary(common) => cmd_summary(&common),
        Commands::Diff { common, repo, from_ref } => cmd_diff(&common, repo.as_deref(), &from_ref),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        if let Some(depcheck_err) = e.downcast_ref::<DepcheckError>() {
            eprintln!("Error: {depcheck_err}");
            process::exit(depcheck_err.exit_code());
        }
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(DepcheckError::validation(format!(
            "build directory '{}' does not exist",
            path.display()
        )));
    }
    if !path.is_dir() {
        anyhow::bail!(DepcheckError::validation(format!(
            "build directory '{}' is not a directory",
            path.display()
        )));
    }
    Ok(())
}

fn load_config(build_dir: &Path) -> Config {
    Config::load_or_default(build_dir)
}

/// Run the full L1+L2+L0+L3 pipeline against `common`'s build directory
/// and filters, returning the analyzed results plus the unfiltered header
/// set/graph (needed by `--save-results`).
struct Analysis {
    config: Config,
    classifier: PathClassifier,
    unfiltered_headers: BTreeSet<PathBuf>,
    unfiltered_graph: depcheck_core::types::IncludeGraph,
    results: DsmAnalysisResults,
}

fn run_pipeline(common: &CommonArgs) -> Result<Analysis> {
    validate_path(&common.build_directory)?;
    let build_dir = common
        .build_directory
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", common.build_directory.display()))?;

    let mut config = load_config(&build_dir);
    config.advanced_metrics.enabled = config.advanced_metrics.enabled || common.advanced_metrics;

    let classifier = PathClassifier::new(&config.classify, Some(&build_dir));
    let jobs = depcheck_scan::default_job_count();

    let scan = scan_build_directory(
        &build_dir,
        &classifier,
        config.graph.drop_system_headers,
        jobs,
        Duration::from_secs(600),
    )
    .map_err(anyhow::Error::from)?;

    if common.verbose {
        eprintln!(
            "scanned {} headers from {} source(s) in {:.2}s",
            scan.all_headers.len(),
            scan.source_to_deps.len(),
            scan.scan_time_seconds
        );
    }

    let header_strings: BTreeSet<String> = scan.all_headers.iter().map(|p| p.display().to_string()).collect();
    let (kept_strings, stats) = apply_filters(&header_strings, common.filter.as_deref(), &common.exclude);

    if common.verbose {
        eprintln!("{}", stats.format_verbose());
    } else if !stats.patterns_with_no_matches.is_empty() {
        eprintln!("{}", stats.format_concise());
    }

    if kept_strings.is_empty() && !header_strings.is_empty() {
        anyhow::bail!(DepcheckError::validation("no headers remaining after filters"));
    }

    let kept: BTreeSet<PathBuf> = kept_strings.into_iter().map(PathBuf::from).collect();
    let filtered_graph: depcheck_core::types::IncludeGraph = scan
        .include_graph
        .iter()
        .filter(|(k, _)| kept.contains(*k))
        .map(|(k, v)| (k.clone(), v.iter().filter(|d| kept.contains(*d)).cloned().collect()))
        .collect();

    let results = run_dsm_analysis(&kept, &filtered_graph, &config.advanced_metrics, &config.severity);

    Ok(Analysis {
        config,
        classifier,
        unfiltered_headers: scan.all_headers,
        unfiltered_graph: scan.include_graph,
        results,
    })
}

fn write_exports(analysis: &Analysis, common: &CommonArgs) -> Result<()> {
    if let Some(csv_path) = &common.export {
        let csv = write_csv(&analysis.results, &common.build_directory);
        std::fs::write(csv_path, csv).with_context(|| format!("writing {}", csv_path.display()))?;
        println!("Wrote CSV export to {}", csv_path.display());
    }

    if let Some(graph_path) = &common.export_graph {
        let ext = graph_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let format = GraphFormat::from_extension(ext)
            .ok_or_else(|| DepcheckError::validation(format!("unrecognized graph export extension: .{ext}")))?;
        let rendered = export_graph(
            &analysis.results,
            &common.build_directory,
            format,
            &analysis.classifier,
            &analysis.config.classify.third_party_prefixes,
        );
        std::fs::write(graph_path, rendered).with_context(|| format!("writing {}", graph_path.display()))?;
        println!("Wrote graph export to {}", graph_path.display());
    }

    Ok(())
}

fn maybe_save(analysis: &Analysis, common: &CommonArgs) -> Result<()> {
    if let Some(save_path) = &common.save_results {
        snapshot::save(
            save_path,
            &common.build_directory,
            &analysis.unfiltered_headers,
            &analysis.unfiltered_graph,
            &analysis.results,
            common.filter.as_deref(),
            &common.exclude,
        )
        .map_err(anyhow::Error::from)?;
        println!("Saved snapshot to {}", save_path.display());
    }
    Ok(())
}

/// Resolve the baseline results for a `--load-baseline`/`--compare-with`
/// diff, if either flag was given.
fn maybe_baseline(analysis: &Analysis, common: &CommonArgs) -> Result<Option<DsmAnalysisResults>> {
    if let Some(baseline_file) = &common.load_baseline {
        let loaded = snapshot::load(
            baseline_file,
            &common.build_directory,
            common.filter.as_deref(),
            Some(&common.exclude),
            &analysis.config.advanced_metrics,
            &analysis.config.severity,
        )
        .map_err(anyhow::Error::from)?;
        return Ok(Some(loaded));
    }

    if let Some(other_build_dir) = &common.compare_with {
        let other_common = CommonArgs {
            build_directory: other_build_dir.clone(),
            ..common.clone()
        };
        let other_analysis = run_pipeline(&other_common)?;
        return Ok(Some(other_analysis.results));
    }

    Ok(None)
}

fn cmd_dsm(common: &CommonArgs) -> Result<()> {
    let analysis = run_pipeline(common)?;
    write_exports(&analysis, common)?;
    maybe_save(&analysis, common)?;

    if let Some(baseline) = maybe_baseline(&analysis, common)? {
        let mut delta = compute_delta(&baseline, &analysis.results);
        let changed = BTreeSet::new();
        annotate_insights(&mut delta, &baseline, &analysis.results, &changed, &analysis.config.severity);
        println!("{}", format_diff_report(&delta, &common.build_directory));
        return Ok(());
    }

    println!(
        "{}",
        format_dsm_report(&analysis.results, &common.build_directory, common.top, common.cycles_only, common.show_layers)
    );
    Ok(())
}

fn cmd_hell(common: &CommonArgs, threshold: usize) -> Result<()> {
    if threshold == 0 {
        anyhow::bail!(DepcheckError::validation("--threshold must be positive"));
    }
    let analysis = run_pipeline(common)?;
    write_exports(&analysis, common)?;
    maybe_save(&analysis, common)?;
    println!("{}", format_hell_report(&analysis.results, &common.build_directory, threshold, common.top.max(1)));
    Ok(())
}

fn cmd_ripple(common: &CommonArgs, changed_headers: &[PathBuf]) -> Result<()> {
    validate_path(&common.build_directory)?;
    let build_dir = common
        .build_directory
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", common.build_directory.display()))?;
    let config = load_config(&build_dir);
    let classifier = PathClassifier::new(&config.classify, Some(&build_dir));
    let jobs = depcheck_scan::default_job_count();

    let scan = scan_build_directory(&build_dir, &classifier, config.graph.drop_system_headers, jobs, Duration::from_secs(600))
        .map_err(anyhow::Error::from)?;

    let reverse_sources = build_reverse_dependency_map(&scan.source_to_deps);
    let changed: BTreeSet<PathBuf> = changed_headers.iter().cloned().collect();
    let mut cache = RippleCache::new();
    let affected = compute_affected_sources_batch(&changed, &scan.include_graph, &reverse_sources, &mut cache);

    println!("{}", format_ripple_report(changed_headers, &affected, &build_dir));
    Ok(())
}

fn cmd_summary(common: &CommonArgs) -> Result<()> {
    let analysis = run_pipeline(common)?;
    write_exports(&analysis, common)?;
    maybe_save(&analysis, common)?;
    println!("{}", format_summary_report(&analysis.results, &common.build_directory));
    Ok(())
}

/// Reconstruct a baseline include graph from version control (spec.md
/// §4.6 "Baseline reconstruction from VCS") and diff it against the
/// current build, grounded on `buildCheckRippleEffect.py`'s `--repo`/
/// `--from` flags.
fn cmd_diff(common: &CommonArgs, repo: Option<&Path>, from_ref: &str) -> Result<()> {
    let analysis = run_pipeline(common)?;
    let repo_root = repo.unwrap_or(&common.build_directory);

    let baseline_graph = reconstruct_baseline(repo_root, from_ref, &analysis.unfiltered_headers, &analysis.unfiltered_graph)
        .map_err(anyhow::Error::from)?;

    let baseline_results = run_dsm_analysis(
        &baseline_graph.headers,
        &baseline_graph.include_graph,
        &analysis.config.advanced_metrics,
        &analysis.config.severity,
    );

    let mut delta = compute_delta(&baseline_results, &analysis.results);
    let changed: BTreeSet<PathBuf> = baseline_graph
        .headers
        .symmetric_difference(&analysis.unfiltered_headers)
        .cloned()
        .collect();
    annotate_insights(&mut delta, &baseline_results, &analysis.results, &changed, &analysis.config.severity);

    println!("{}", format_diff_report(&delta, &common.build_directory));
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(".depcheck.toml");
    if target.exists() && !force {
        anyhow::bail!(DepcheckError::validation(".depcheck.toml already exists. Use --force to overwrite."));
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created .depcheck.toml with default configuration.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path_rejects_missing_directory() {
        let err = validate_path(Path::new("/nonexistent/depcheck-test-path")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_path_rejects_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = validate_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_validate_path_accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_path(dir.path()).is_ok());
    }
}
