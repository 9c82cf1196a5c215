use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level configuration from `.depcheck.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub advanced_metrics: AdvancedMetricsConfig,
    #[serde(default)]
    pub severity: SeverityThresholds,
}

/// Path-prefix rules for L0 (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default = "default_system_prefixes")]
    pub system_prefixes: Vec<String>,
    #[serde(default = "default_third_party_prefixes")]
    pub third_party_prefixes: Vec<String>,
    #[serde(default = "default_generated_suffixes")]
    pub generated_suffixes: Vec<String>,
}

fn default_system_prefixes() -> Vec<String> {
    vec![
        "/usr/include".to_string(),
        "/usr/lib/gcc".to_string(),
        "/usr/local/include".to_string(),
        "/Library/Developer".to_string(),
    ]
}

fn default_third_party_prefixes() -> Vec<String> {
    vec![
        "third_party/".to_string(),
        "vendor/".to_string(),
        ".cache/".to_string(),
    ]
}

fn default_generated_suffixes() -> Vec<String> {
    vec![
        ".generated.h".to_string(),
        ".generated.hpp".to_string(),
        "_pb2.h".to_string(),
        ".pb.h".to_string(),
    ]
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            system_prefixes: default_system_prefixes(),
            third_party_prefixes: default_third_party_prefixes(),
            generated_suffixes: default_generated_suffixes(),
        }
    }
}

/// Options controlling how the include graph and DSM treat non-project
/// nodes (spec.md §9 Open Question 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Default "retain as nodes but mark" per spec.md §9.
    #[serde(default = "default_third_party_as_nodes")]
    pub third_party_as_nodes: bool,
    #[serde(default)]
    pub drop_system_headers: bool,
}

fn default_third_party_as_nodes() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            third_party_as_nodes: default_third_party_as_nodes(),
            drop_system_headers: true,
        }
    }
}

/// Toggle and seed for the optional advanced metrics of spec.md §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedMetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Exposed per spec.md §9 Open Question 3, so sampled betweenness is
    /// reproducible in tests.
    #[serde(default)]
    pub betweenness_seed: u64,
    #[serde(default = "default_betweenness_exact_below")]
    pub betweenness_exact_below: usize,
    #[serde(default = "default_betweenness_sample_cap")]
    pub betweenness_sample_cap: usize,
}

fn default_betweenness_exact_below() -> usize {
    2000
}

fn default_betweenness_sample_cap() -> usize {
    1000
}

impl Default for AdvancedMetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            betweenness_seed: 0,
            betweenness_exact_below: default_betweenness_exact_below(),
            betweenness_sample_cap: default_betweenness_sample_cap(),
        }
    }
}

/// Thresholds used by pattern detection (§4.4) and the delta severity
/// rubric (§4.6). None of these have a canonical value in the source;
/// spec.md §9 Open Question 2 asks that they be exposed rather than
/// hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityThresholds {
    #[serde(default = "default_hub_threshold")]
    pub hub_threshold: usize,
    #[serde(default = "default_god_object_fan_out")]
    pub god_object_fan_out: usize,
    #[serde(default = "default_stable_interface_max")]
    pub stable_interface_max: f64,
    #[serde(default = "default_outlier_z_score")]
    pub outlier_z_score: f64,
    #[serde(default = "default_coupling_increase_critical_pct")]
    pub coupling_increase_critical_pct: f64,
}

fn default_hub_threshold() -> usize {
    15
}
fn default_god_object_fan_out() -> usize {
    50
}
fn default_stable_interface_max() -> f64 {
    0.3
}
fn default_outlier_z_score() -> f64 {
    2.5
}
fn default_coupling_increase_critical_pct() -> f64 {
    20.0
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            hub_threshold: default_hub_threshold(),
            god_object_fan_out: default_god_object_fan_out(),
            stable_interface_max: default_stable_interface_max(),
            outlier_z_score: default_outlier_z_score(),
            coupling_increase_critical_pct: default_coupling_increase_critical_pct(),
        }
    }
}

impl Config {
    /// Load configuration from a `.depcheck.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `.depcheck.toml` in the given directory, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(".depcheck.toml");
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Generate default TOML content for a `depcheck init`-style command.
    pub fn default_toml() -> String {
        r#"# depcheck - header dependency analysis configuration

[classify]
system_prefixes = ["/usr/include", "/usr/lib/gcc", "/usr/local/include"]
third_party_prefixes = ["third_party/", "vendor/", ".cache/"]
generated_suffixes = [".generated.h", ".generated.hpp", "_pb2.h", ".pb.h"]

[graph]
third_party_as_nodes = true
drop_system_headers = true

[advanced_metrics]
enabled = false
betweenness_seed = 0
betweenness_exact_below = 2000
betweenness_sample_cap = 1000

[severity]
hub_threshold = 15
god_object_fan_out = 50
stable_interface_max = 0.3
outlier_z_score = 2.5
coupling_increase_critical_pct = 20.0
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.graph.third_party_as_nodes);
        assert_eq!(config.severity.god_object_fan_out, 50);
        assert!((config.severity.stable_interface_max - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[severity]
god_object_fan_out = 100
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.severity.god_object_fan_out, 100);
        assert_eq!(config.severity.hub_threshold, 15);
        assert!(config.graph.third_party_as_nodes);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let toml_str = Config::default_toml();
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.graph.third_party_as_nodes);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path());
        assert_eq!(config.severity.god_object_fan_out, 50);
    }
}
