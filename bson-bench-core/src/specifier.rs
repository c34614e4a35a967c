//! Library Specifiers
//!
//! A library reference names one of the benchmarkable packages and where to get it:
//!
//! | Grammar        | Source                          | Installed module name        |
//! |----------------|---------------------------------|------------------------------|
//! | `name@version` | package registry                | `name-version`               |
//! | `name#ref`     | upstream git repository at ref  | `name-git-ref`               |
//! | `name:path`    | local directory                 | `name-local-<path, / → _>`   |
//!
//! Grammars are tried in that order. The installed module name is unique per
//! specifier so several versions of one package can share an install directory.

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Raised when a library reference cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown package specifier '{spec}': {reason}")]
pub struct InvalidSpecifier {
    /// The rejected input
    pub spec: String,
    /// Why it was rejected
    pub reason: String,
}

/// Packages the harness knows how to benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Package {
    /// The pure BSON implementation
    Bson,
    /// The native-extension BSON implementation
    BsonExt,
}

impl Package {
    /// All allow-listed packages
    pub const ALL: [Package; 2] = [Package::Bson, Package::BsonExt];

    /// Registry name
    pub fn as_str(self) -> &'static str {
        match self {
            Package::Bson => "bson",
            Package::BsonExt => "bson-ext",
        }
    }

    /// Look up an allow-listed package by registry name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Upstream repository used for `name#ref` installs
    pub fn upstream_url(self) -> &'static str {
        match self {
            Package::Bson => "https://github.com/mongodb/bson-rust.git",
            Package::BsonExt => "https://github.com/mongodb-js/bson-ext.git",
        }
    }

    /// Whether the package validates UTF-8 regardless of options
    pub fn always_validates_utf8(self) -> bool {
        matches!(self, Package::BsonExt)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a package version comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// Semantic version or `latest` from the package registry
    Registry {
        /// Version requirement as written
        version: String,
    },
    /// Commit hash or tag in the upstream repository
    SourceRef {
        /// Commit-ish as written
        reference: String,
    },
    /// Directory on the local filesystem
    LocalPath {
        /// Path as written
        path: PathBuf,
    },
}

/// Parsed, immutable library reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpecifier {
    raw: String,
    package: Package,
    source: LibrarySource,
    installed_module_name: String,
}

fn registry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[^@#:\s]+)@(?P<version>\d+(?:\.\d+)?(?:\.\d+)?|latest)$")
            .expect("registry specifier regex is valid")
    })
}

fn source_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[^@#:\s]+)#(?P<reference>.+)$")
            .expect("source-ref specifier regex is valid")
    })
}

fn local_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[^@#:\s]+):(?P<path>.+)$").expect("local specifier regex is valid")
    })
}

/// Replace path separators so a path can be embedded in a module name
pub fn sanitize_path(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c == '/' || c == std::path::MAIN_SEPARATOR {
                '_'
            } else {
                c
            }
        })
        .collect()
}

impl VersionSpecifier {
    /// Parse a library reference
    pub fn parse(spec: &str) -> Result<Self, InvalidSpecifier> {
        let invalid = |reason: String| InvalidSpecifier {
            spec: spec.to_string(),
            reason,
        };

        let (name, source) = if let Some(caps) = registry_re().captures(spec) {
            (
                caps["name"].to_string(),
                LibrarySource::Registry {
                    version: caps["version"].to_string(),
                },
            )
        } else if let Some(caps) = source_ref_re().captures(spec) {
            (
                caps["name"].to_string(),
                LibrarySource::SourceRef {
                    reference: caps["reference"].to_string(),
                },
            )
        } else if let Some(caps) = local_re().captures(spec) {
            (
                caps["name"].to_string(),
                LibrarySource::LocalPath {
                    path: PathBuf::from(&caps["path"]),
                },
            )
        } else {
            return Err(invalid(
                "expected name@version, name#ref or name:path".to_string(),
            ));
        };

        let package = Package::from_name(&name).ok_or_else(|| {
            invalid(format!(
                "'{}' is not a benchmarkable package (expected one of: {})",
                name,
                Package::ALL.map(Package::as_str).join(", ")
            ))
        })?;

        let installed_module_name = match &source {
            LibrarySource::Registry { version } => format!("{}-{}", package, version),
            LibrarySource::SourceRef { reference } => format!("{}-git-{}", package, reference),
            LibrarySource::LocalPath { path } => format!(
                "{}-local-{}",
                package,
                sanitize_path(&path.to_string_lossy())
            ),
        };

        Ok(Self {
            raw: spec.to_string(),
            package,
            source,
            installed_module_name,
        })
    }

    /// The input this specifier was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Logical package
    pub fn package(&self) -> Package {
        self.package
    }

    /// Version source
    pub fn source(&self) -> &LibrarySource {
        &self.source
    }

    /// Collision-free module name inside an install directory
    pub fn installed_module_name(&self) -> &str {
        &self.installed_module_name
    }

    /// Local directory, for `name:path` specifiers
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            LibrarySource::LocalPath { path } => Some(path),
            _ => None,
        }
    }
}

impl FromStr for VersionSpecifier {
    type Err = InvalidSpecifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_module_name() {
        for (spec, expected) in [
            ("bson@6.0.0", "bson-6.0.0"),
            ("bson@5", "bson-5"),
            ("bson@4.6", "bson-4.6"),
            ("bson@latest", "bson-latest"),
            ("bson-ext@4.0.0", "bson-ext-4.0.0"),
        ] {
            let parsed = VersionSpecifier::parse(spec).unwrap();
            assert_eq!(parsed.installed_module_name(), expected, "{}", spec);
            assert!(matches!(parsed.source(), LibrarySource::Registry { .. }));
        }
    }

    #[test]
    fn test_source_ref_module_name() {
        let parsed =
            VersionSpecifier::parse("bson#eb98b8c39d6d5ba4ce7231ab9e0f29495d74b994").unwrap();
        assert_eq!(
            parsed.installed_module_name(),
            "bson-git-eb98b8c39d6d5ba4ce7231ab9e0f29495d74b994"
        );

        let tagged = VersionSpecifier::parse("bson-ext#v4.0.3").unwrap();
        assert_eq!(tagged.package(), Package::BsonExt);
        assert_eq!(tagged.installed_module_name(), "bson-ext-git-v4.0.3");
    }

    #[test]
    fn test_local_module_name_replaces_separators() {
        let parsed = VersionSpecifier::parse("bson:/opt/libs/bson").unwrap();
        assert_eq!(parsed.installed_module_name(), "bson-local-_opt_libs_bson");
        assert_eq!(parsed.local_path(), Some(Path::new("/opt/libs/bson")));
        assert!(!parsed.installed_module_name().contains('/'));
    }

    #[test]
    fn test_unknown_package_rejected_for_every_grammar() {
        for spec in ["notBson@1.0.0", "notBson#abcdabcdabcd", "notBson:/tmp/x", "BSON@6.0.0"] {
            let err = VersionSpecifier::parse(spec).unwrap_err();
            assert_eq!(err.spec, spec);
            assert!(err.to_string().contains("unknown package specifier"));
        }
    }

    #[test]
    fn test_malformed_specifiers() {
        for spec in ["bson", "", "bson@", "bson@six", "@6.0.0"] {
            assert!(VersionSpecifier::parse(spec).is_err(), "{}", spec);
        }
    }

    #[test]
    fn test_registry_takes_precedence() {
        // A local path that happens to contain '@' is still a local install
        let parsed = VersionSpecifier::parse("bson:/tmp/bson@6").unwrap();
        assert!(matches!(parsed.source(), LibrarySource::LocalPath { .. }));
        assert_eq!(parsed.to_string(), "bson:/tmp/bson@6");
    }

    #[test]
    fn test_package_lookup() {
        assert_eq!(Package::from_name("bson"), Some(Package::Bson));
        assert_eq!(Package::from_name("bson-ext"), Some(Package::BsonExt));
        assert_eq!(Package::from_name("bson_ext"), None);
        assert!(Package::BsonExt.always_validates_utf8());
        assert!(!Package::Bson.always_validates_utf8());
    }
}
