//! Configuration loading from bson-bench.toml
//!
//! Configuration can be specified in a `bson-bench.toml` file. It is discovered
//! by walking up from the current directory; every field has a default.

use bson_bench_core::InstallerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file
pub const CONFIG_FILE: &str = "bson-bench.toml";

/// bson-bench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    /// Package manager used to install library versions
    #[serde(default)]
    pub installer: InstallerConfig,
    /// Suite execution settings
    #[serde(default)]
    pub suite: SuiteConfig,
    /// Worker process settings
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Shared install directory (default: `<temp>/bsonBench`)
    #[serde(default)]
    pub install_location: Option<PathBuf>,
    /// Aggregated results file
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Also write one `<taskName>.json` per completed task into this directory
    #[serde(default)]
    pub task_results_dir: Option<PathBuf>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            install_location: None,
            output: default_output(),
            task_results_dir: None,
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("results.json")
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    /// Worker executable (default: the running binary)
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Pin each worker to this CPU
    #[serde(default)]
    pub pin_cpu: Option<usize>,
}

impl BenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Shared install directory, falling back to `<temp>/bsonBench`
    pub fn install_location(&self) -> PathBuf {
        self.suite
            .install_location
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("bsonBench"))
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# bson-bench Configuration

[installer]
# Package manager executable
program = "npm"
# Arguments; {spec}, {alias} and {source} are substituted
args = ["install", "{spec}"]
# Directory under the install location that holds installed modules
modules_dir = "node_modules"
# Prefix for registry installs
registry_protocol = "npm"

[suite]
# Shared install directory, removed after every run (uncomment to override)
# install_location = "/tmp/bsonBench"
# Aggregated results file
output = "results.json"
# Per-task result files (uncomment to enable)
# task_results_dir = "results"

[worker]
# Worker executable (uncomment to override the running binary)
# program = "/usr/local/bin/bson-bench"
# Pin workers to a CPU (uncomment to enable)
# pin_cpu = 0
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.installer.program, "npm");
        assert_eq!(config.installer.args, vec!["install", "{spec}"]);
        assert_eq!(config.suite.output, PathBuf::from("results.json"));
        assert!(config.worker.pin_cpu.is_none());
        assert_eq!(
            config.install_location(),
            std::env::temp_dir().join("bsonBench")
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [installer]
            program = "pnpm"
            args = ["add", "{spec}"]

            [worker]
            pin_cpu = 2
        "#;

        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.installer.program, "pnpm");
        assert_eq!(config.worker.pin_cpu, Some(2));
        // Defaults should still apply
        assert_eq!(config.installer.modules_dir, "node_modules");
        assert_eq!(config.suite.output, PathBuf::from("results.json"));
    }

    #[test]
    fn test_default_toml_parses() {
        let config: BenchConfig = toml::from_str(&BenchConfig::default_toml()).unwrap();
        assert_eq!(config.installer, InstallerConfig::default());
        assert!(config.suite.install_location.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[suite]\ninstall_location = \"/tmp/custom\"\n").unwrap();

        let config = BenchConfig::load(&path).unwrap();
        assert_eq!(config.install_location(), PathBuf::from("/tmp/custom"));
    }
}
