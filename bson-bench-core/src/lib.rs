#![warn(missing_docs)]
//! bson-bench Core - Libraries Under Test
//!
//! This crate provides everything that touches a concrete library version:
//! - Parsing library references (`name@version`, `name#ref`, `name:path`)
//! - Installing versions side by side through an external package manager
//! - Loading the installed codec inside a worker process
//! - The single-shot worker that times `serialize` / `deserialize`

mod codec;
mod fixture;
mod install;
mod measure;
mod module;
mod specifier;
mod worker;

pub use codec::{
    CODEC_CREATE_SYMBOL, Codec, CodecCreateFn, CodecError, LoadedCodec, ReferenceCodec, load_codec,
};
pub use fixture::{FixtureError, load_fixture};
pub use install::{InstallError, InstallerConfig, PackageInstaller};
pub use measure::{Timer, pin_to_cpu};
pub use module::{BuiltinCodec, CodecEntry, InstalledModule, MANIFEST_FILE, ModuleError};
pub use specifier::{InvalidSpecifier, LibrarySource, Package, VersionSpecifier, sanitize_path};
pub use worker::{Operation, PIN_CPU_ENV, WorkerMain, run_benchmark, run_with_codec};
