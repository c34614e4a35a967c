//! Task
//!
//! One (fixture, operation, library) benchmark and its lifecycle:
//!
//! ```text
//! Created ──run()──▶ Running ──▶ Completed(result)
//!                            └─▶ Failed ──run()──▶ Running ...
//! ```
//!
//! A completed Task never runs again; `run()` hands back the stored result.

use crate::supervisor::{SupervisorError, WorkerCommand, WorkerHandle};
use bson_bench_core::{InstallError, InvalidSpecifier, PackageInstaller, VersionSpecifier};
use bson_bench_ipc::{BenchmarkResult, BenchmarkSpecification, WorkerFailure};
use bson_bench_report::{PerfSendResult, ReportError, coerce_options, write_json_report};
use bson_bench_stats::{compute_summary, throughput_samples};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

/// Why a Task produced no result
#[derive(Debug, Error)]
pub enum TaskError {
    /// Library reference could not be parsed
    #[error(transparent)]
    InvalidSpecifier(#[from] InvalidSpecifier),

    /// Library version could not be installed
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Worker could not be spawned or died without replying
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Structured failure reported by the worker
    #[error("{kind}: {0}", kind = .0.kind.as_str())]
    Worker(WorkerFailure),

    /// Results requested before a successful run
    #[error("task {task} has not completed")]
    NotCompleted {
        /// Task name
        task: String,
    },

    /// Run completed with zero measured iterations
    #[error("task {task} recorded no measured iterations")]
    NoSamples {
        /// Task name
        task: String,
    },

    /// Result file could not be written
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Task lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Never run
    Created,
    /// Worker in flight
    Running,
    /// Worker reported a result
    Completed(BenchmarkResult),
    /// Last run failed; the Task may run again
    Failed,
}

/// Shared resources a Task runs against
#[derive(Debug, Clone, Copy)]
pub struct RunEnvironment<'a> {
    /// Shared install directory
    pub install_dir: &'a Path,
    /// Installs the Task's library version on demand
    pub installer: &'a PackageInstaller,
    /// Worker launch settings
    pub worker: &'a WorkerCommand,
}

/// One benchmark
#[derive(Debug)]
pub struct Task {
    benchmark: BenchmarkSpecification,
    specifier: VersionSpecifier,
    task_name: String,
    test_name: String,
    state: TaskState,
    worker_exits: Vec<ExitStatus>,
}

fn fixture_stem(document_path: &str) -> String {
    Path::new(document_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| document_path.to_string())
}

impl Task {
    /// Create a Task; the library reference is validated immediately
    pub fn new(benchmark: BenchmarkSpecification) -> Result<Self, InvalidSpecifier> {
        let specifier = VersionSpecifier::parse(&benchmark.library)?;
        let stem = fixture_stem(&benchmark.document_path);
        let task_name = format!(
            "{}_{}_{}",
            stem,
            benchmark.operation,
            bson_bench_core::sanitize_path(&benchmark.library)
        );
        let test_name = format!("{}_{}_{}", stem, benchmark.operation, specifier.package());

        Ok(Self {
            benchmark,
            specifier,
            task_name,
            test_name,
            state: TaskState::Created,
            worker_exits: Vec::new(),
        })
    }

    /// Rebuild a completed Task from a recorded result
    pub fn restore(
        benchmark: BenchmarkSpecification,
        result: BenchmarkResult,
    ) -> Result<Self, InvalidSpecifier> {
        let mut task = Self::new(benchmark)?;
        task.state = TaskState::Completed(result);
        Ok(task)
    }

    /// `<fixture>_<operation>_<library>`, unique per Task
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// `<fixture>_<operation>_<package>`, shared across versions
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Benchmark as registered
    pub fn benchmark(&self) -> &BenchmarkSpecification {
        &self.benchmark
    }

    /// Parsed library reference
    pub fn specifier(&self) -> &VersionSpecifier {
        &self.specifier
    }

    /// Current lifecycle state
    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Whether a run has finished, successfully or not
    pub fn has_run(&self) -> bool {
        matches!(self.state, TaskState::Completed(_) | TaskState::Failed)
    }

    /// Raw timings of a completed run
    pub fn result(&self) -> Option<&BenchmarkResult> {
        match &self.state {
            TaskState::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Exit status of every worker this Task spawned
    pub fn worker_exits(&self) -> &[ExitStatus] {
        &self.worker_exits
    }

    /// Install if needed, run the benchmark in a fresh worker and store the result.
    pub fn run(&mut self, env: &RunEnvironment<'_>) -> Result<&BenchmarkResult, TaskError> {
        if !matches!(self.state, TaskState::Completed(_)) {
            self.state = TaskState::Running;
            match self.execute(env) {
                Ok(result) => self.state = TaskState::Completed(result),
                Err(e) => {
                    self.state = TaskState::Failed;
                    return Err(e);
                }
            }
        }

        self.result().ok_or_else(|| TaskError::NotCompleted {
            task: self.task_name.clone(),
        })
    }

    fn execute(&mut self, env: &RunEnvironment<'_>) -> Result<BenchmarkResult, TaskError> {
        env.installer
            .ensure_installed(&self.specifier, env.install_dir)?;

        let mut benchmark = self.benchmark.clone();
        benchmark.install_location = Some(
            env.installer
                .modules_root(env.install_dir)
                .display()
                .to_string(),
        );

        let worker = WorkerHandle::spawn(env.worker)?;
        tracing::debug!("{} running in worker pid {}", self.task_name, worker.id());

        let outcome = match worker.run(&benchmark) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let SupervisorError::WorkerCrashed { status } = &e {
                    self.worker_exits.push(*status);
                }
                return Err(e.into());
            }
        };
        self.worker_exits.push(outcome.status);

        outcome.reply.map_err(TaskError::Worker)
    }

    /// Shape the stored result into a report record.
    ///
    /// Requires a completed run; performs no I/O.
    pub fn get_results(&self) -> Result<PerfSendResult, TaskError> {
        let result = self.result().ok_or_else(|| TaskError::NotCompleted {
            task: self.task_name.clone(),
        })?;

        let samples = throughput_samples(&result.duration_millis, result.document_size_bytes);
        let summary = compute_summary(&samples).ok_or_else(|| TaskError::NoSamples {
            task: self.task_name.clone(),
        })?;

        let mut args = BTreeMap::new();
        args.insert("warmup".to_string(), self.benchmark.warmup as f64);
        args.insert("iterations".to_string(), self.benchmark.iterations as f64);
        args.extend(coerce_options(
            &self.benchmark.options,
            self.specifier.package().always_validates_utf8(),
        ));

        let tags = if self.benchmark.tags.is_empty() {
            None
        } else {
            Some(self.benchmark.tags.clone())
        };

        Ok(PerfSendResult::from_throughput(
            self.test_name.clone(),
            tags,
            args,
            &summary,
        ))
    }

    /// Write this Task's report record to `<dir>/<taskName>.json`
    pub fn write_results(&self, dir: &Path) -> Result<PathBuf, TaskError> {
        let record = self.get_results()?;
        let path = dir.join(format!("{}.json", self.task_name));
        write_json_report(&path, &record)?;
        Ok(path)
    }
}
