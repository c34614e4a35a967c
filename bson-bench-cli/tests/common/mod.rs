//! Shared helpers for end-to-end tests. The `bson-bench` binary built for this
//! package serves as the worker.

#![allow(dead_code)]

use bson_bench_cli::WorkerCommand;
use bson_bench_core::MANIFEST_FILE;
use bson_bench_ipc::{BenchmarkSpecification, OperationOptions};
use std::path::{Path, PathBuf};

pub fn worker() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_bson-bench"))
}

pub fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .display()
        .to_string()
}

/// Install a reference-codec module the way a package manager would
pub fn seed_module(install_dir: &Path, module_name: &str) -> PathBuf {
    let root = install_dir.join("node_modules").join(module_name);
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join(MANIFEST_FILE),
        "name = \"bson\"\nbuiltin = \"reference\"\n",
    )
    .unwrap();
    root
}

pub fn benchmark(document: &str, operation: &str, library: &str) -> BenchmarkSpecification {
    BenchmarkSpecification {
        document_path: fixture(document),
        operation: operation.to_string(),
        library: library.to_string(),
        options: OperationOptions::new(),
        iterations: 25,
        warmup: 5,
        tags: Vec::new(),
        install_location: None,
    }
}
