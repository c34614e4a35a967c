//! Package installation
//!
//! Installs are delegated to an external package-manager program run inside the
//! install directory. The argument template may use these placeholders:
//!
//! - `{spec}`: `<installed module name>@<source>`
//! - `{alias}`: the installed module name
//! - `{source}`: registry reference, `<url>#<ref>`, or an absolute local path

use crate::module::{InstalledModule, ModuleError};
use crate::specifier::{LibrarySource, VersionSpecifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Installation failures
#[derive(Debug, Error)]
pub enum InstallError {
    /// `name:path` points at a path that does not exist
    #[error("unable to install module: local path {0} does not exist")]
    LocalPathNotFound(PathBuf),

    /// Install directory could not be created
    #[error("unable to install module: failed to prepare {path}: {source}")]
    Io {
        /// Install directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Package manager could not be started
    #[error("unable to install module: failed to run '{program}': {source}")]
    Spawn {
        /// Package-manager executable
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Package manager exited unsuccessfully
    #[error("unable to install module: {spec} ({status})\n{stderr}")]
    CommandFailed {
        /// Attempted `<installed module name>@<source>`
        spec: String,
        /// Exit status as reported by the OS
        status: String,
        /// Trimmed standard error of the package manager
        stderr: String,
    },

    /// Package manager succeeded but the module cannot be opened
    #[error("unable to install module: {spec} reported success but left no usable module: {source}")]
    ModuleMissing {
        /// Library reference
        spec: String,
        /// Why the module could not be opened
        #[source]
        source: ModuleError,
    },
}

/// Package-manager invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Package-manager executable
    pub program: String,
    /// Argument template
    pub args: Vec<String>,
    /// Directory under the install location holding installed modules
    pub modules_dir: String,
    /// Prefix for registry references (`<protocol>:<name>@<version>`)
    pub registry_protocol: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["install".to_string(), "{spec}".to_string()],
            modules_dir: "node_modules".to_string(),
            registry_protocol: "npm".to_string(),
        }
    }
}

/// Ensures requested library versions exist in an install directory
#[derive(Debug, Clone, Default)]
pub struct PackageInstaller {
    config: InstallerConfig,
}

impl PackageInstaller {
    /// Installer driven by `config`
    pub fn new(config: InstallerConfig) -> Self {
        Self { config }
    }

    /// Active settings
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Directory holding every installed module
    pub fn modules_root(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(&self.config.modules_dir)
    }

    /// Directory a specifier installs into
    pub fn module_path(&self, spec: &VersionSpecifier, install_dir: &Path) -> PathBuf {
        self.modules_root(install_dir)
            .join(spec.installed_module_name())
    }

    /// Locate an already installed module without running the package manager.
    ///
    /// Any problem reading the module counts as "not installed".
    pub fn check(&self, spec: &VersionSpecifier, install_dir: &Path) -> Option<InstalledModule> {
        let path = self.module_path(spec, install_dir);
        match InstalledModule::open(&path) {
            Ok(module) => Some(module),
            Err(e) => {
                tracing::debug!("{} not installed: {}", spec, e);
                None
            }
        }
    }

    /// Source reference handed to the package manager
    pub fn install_source(&self, spec: &VersionSpecifier) -> Result<String, InstallError> {
        Ok(match spec.source() {
            LibrarySource::Registry { version } => format!(
                "{}:{}@{}",
                self.config.registry_protocol,
                spec.package(),
                version
            ),
            LibrarySource::SourceRef { reference } => {
                format!("{}#{}", spec.package().upstream_url(), reference)
            }
            LibrarySource::LocalPath { path } => {
                let absolute = std::fs::canonicalize(path)
                    .map_err(|_| InstallError::LocalPathNotFound(path.clone()))?;
                absolute.to_string_lossy().into_owned()
            }
        })
    }

    /// `<installed module name>@<source>`, the `{spec}` placeholder value
    pub fn source_spec(&self, spec: &VersionSpecifier) -> Result<String, InstallError> {
        Ok(format!(
            "{}@{}",
            spec.installed_module_name(),
            self.install_source(spec)?
        ))
    }

    /// Build the package-manager command for a specifier
    pub fn command(
        &self,
        spec: &VersionSpecifier,
        install_dir: &Path,
    ) -> Result<Command, InstallError> {
        let alias = spec.installed_module_name();
        let source = self.install_source(spec)?;
        let full = format!("{}@{}", alias, source);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.config.args.iter().map(|arg| {
            arg.replace("{spec}", &full)
                .replace("{alias}", alias)
                .replace("{source}", &source)
        }))
        .current_dir(install_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
        Ok(cmd)
    }

    /// Run the package manager for a specifier
    pub fn install(&self, spec: &VersionSpecifier, install_dir: &Path) -> Result<(), InstallError> {
        std::fs::create_dir_all(install_dir).map_err(|source| InstallError::Io {
            path: install_dir.to_path_buf(),
            source,
        })?;

        let mut cmd = self.command(spec, install_dir)?;
        let full = self.source_spec(spec)?;
        tracing::info!("Installing {} with {}", full, self.config.program);

        let output = cmd.output().map_err(|source| InstallError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(InstallError::CommandFailed {
                spec: full,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Check, installing on a miss, and return the usable module
    pub fn ensure_installed(
        &self,
        spec: &VersionSpecifier,
        install_dir: &Path,
    ) -> Result<InstalledModule, InstallError> {
        if let Some(module) = self.check(spec, install_dir) {
            tracing::debug!("{} already installed at {}", spec, module.root().display());
            return Ok(module);
        }

        self.install(spec, install_dir)?;
        InstalledModule::open(&self.module_path(spec, install_dir)).map_err(|source| {
            InstallError::ModuleMissing {
                spec: spec.to_string(),
                source,
            }
        })
    }
}
