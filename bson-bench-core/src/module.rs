//! Installed Modules
//!
//! An installed library lives at `<modules root>/<installed module name>/` and
//! is described by a `bson-codec.toml` manifest:
//!
//! ```toml
//! name = "bson"
//! version = "6.0.0"
//! # exactly one of:
//! builtin = "reference"
//! library = "target/release/libbson_codec.so"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest file name inside an installed module directory
pub const MANIFEST_FILE: &str = "bson-codec.toml";

/// Errors locating or reading an installed module
#[derive(Debug, Error)]
pub enum ModuleError {
    /// No manifest under the module directory
    #[error("module not installed at {0}")]
    NotInstalled(PathBuf),

    /// Manifest exists but could not be read
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        /// Manifest location
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid TOML for this schema
    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        /// Manifest location
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// Manifest names no codec, or both kinds
    #[error("manifest {0} must set exactly one of `builtin` or `library`")]
    NoCodec(PathBuf),

    /// `library` points at a missing file
    #[error("codec library {0} does not exist")]
    LibraryMissing(PathBuf),
}

/// Codecs compiled into the harness itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinCodec {
    /// The `bson` crate the harness links against
    Reference,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CodecManifest {
    name: Option<String>,
    version: Option<String>,
    builtin: Option<BuiltinCodec>,
    library: Option<PathBuf>,
}

/// How the worker obtains the codec for a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecEntry {
    /// Codec linked into the harness
    Builtin(BuiltinCodec),
    /// Absolute path of a native plugin
    Library(PathBuf),
}

/// A library present on disk
#[derive(Debug, Clone)]
pub struct InstalledModule {
    root: PathBuf,
    name: Option<String>,
    version: Option<String>,
    entry: CodecEntry,
}

impl InstalledModule {
    /// Open the module rooted at `root`, validating its manifest
    pub fn open(root: &Path) -> Result<Self, ModuleError> {
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ModuleError::NotInstalled(root.to_path_buf()));
        }

        let text =
            std::fs::read_to_string(&manifest_path).map_err(|source| ModuleError::ManifestRead {
                path: manifest_path.clone(),
                source,
            })?;
        let manifest: CodecManifest =
            toml::from_str(&text).map_err(|source| ModuleError::ManifestParse {
                path: manifest_path.clone(),
                source,
            })?;

        let entry = match (manifest.builtin, manifest.library) {
            (Some(builtin), None) => CodecEntry::Builtin(builtin),
            (None, Some(library)) => {
                let library = if library.is_absolute() {
                    library
                } else {
                    root.join(library)
                };
                if !library.is_file() {
                    return Err(ModuleError::LibraryMissing(library));
                }
                CodecEntry::Library(library)
            }
            _ => return Err(ModuleError::NoCodec(manifest_path)),
        };

        Ok(Self {
            root: root.to_path_buf(),
            name: manifest.name,
            version: manifest.version,
            entry,
        })
    }

    /// Module directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Package name declared by the manifest
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Package version declared by the manifest
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Where the codec comes from
    pub fn entry(&self) -> &CodecEntry {
        &self.entry
    }
}
