//! Suite
//!
//! An ordered batch of Tasks sharing one install directory. Tasks run strictly
//! sequentially; a failing Task is recorded and the batch continues.

use crate::supervisor::{SupervisorError, WorkerCommand};
use crate::task::{RunEnvironment, Task, TaskError};
use bson_bench_core::{InvalidSpecifier, PackageInstaller};
use bson_bench_ipc::BenchmarkSpecification;
use bson_bench_report::{PerfSendResult, ReportError, write_json_report};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default aggregated results file
pub const DEFAULT_RESULTS_FILE: &str = "results.json";

/// Suite-level failures; per-Task failures are collected instead
#[derive(Debug, Error)]
pub enum SuiteError {
    /// `run` was called a second time
    #[error("suite '{suite}' has already been run")]
    AlreadyRun {
        /// Suite name
        suite: String,
    },

    /// A registered benchmark names an unusable library
    #[error(transparent)]
    InvalidSpecifier(#[from] InvalidSpecifier),

    /// Shared install directory could not be created
    #[error("failed to create install location {path}: {source}")]
    InstallLocation {
        /// Install directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Worker binary could not be resolved
    #[error(transparent)]
    Worker(#[from] SupervisorError),

    /// Results file could not be written
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Suite lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteState {
    /// Accepting Tasks
    Created,
    /// Tasks executing
    Running,
    /// Every Task has run
    Finished,
}

/// Install directory that exists exactly as long as this guard
#[derive(Debug)]
pub struct InstallLocation {
    path: PathBuf,
}

impl InstallLocation {
    /// Create the directory if it is absent
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        tracing::debug!("Created install location {}", path.display());
        Ok(Self { path })
    }

    /// Guarded directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLocation {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("Removed install location {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove install location {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// A named batch of benchmarks
#[derive(Debug)]
pub struct Suite {
    name: String,
    state: SuiteState,
    tasks: Vec<Task>,
    results: Vec<PerfSendResult>,
    errors: Vec<(usize, TaskError)>,
    install_location: PathBuf,
    installer: PackageInstaller,
    worker: Option<WorkerCommand>,
    task_results_dir: Option<PathBuf>,
}

impl Suite {
    /// Empty suite installing into `<temp>/bsonBench`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SuiteState::Created,
            tasks: Vec::new(),
            results: Vec::new(),
            errors: Vec::new(),
            install_location: std::env::temp_dir().join("bsonBench"),
            installer: PackageInstaller::default(),
            worker: None,
            task_results_dir: None,
        }
    }

    /// Override the shared install directory
    pub fn with_install_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_location = path.into();
        self
    }

    /// Override the package-manager settings
    pub fn with_installer(mut self, installer: PackageInstaller) -> Self {
        self.installer = installer;
        self
    }

    /// Override the worker binary (defaults to the running executable)
    pub fn with_worker(mut self, worker: WorkerCommand) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Also write one `<taskName>.json` per completed Task into `dir`
    pub fn with_task_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.task_results_dir = Some(dir.into());
        self
    }

    /// Register a benchmark; the library reference is validated here
    pub fn task(&mut self, benchmark: BenchmarkSpecification) -> Result<&mut Self, SuiteError> {
        self.tasks.push(Task::new(benchmark)?);
        Ok(self)
    }

    /// Suite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SuiteState {
        self.state
    }

    /// Whether `run` has been called
    pub fn has_run(&self) -> bool {
        self.state != SuiteState::Created
    }

    /// Shared install directory
    pub fn install_location(&self) -> &Path {
        &self.install_location
    }

    /// Registered Tasks, in registration order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Report records of successful Tasks, in registration order
    pub fn results(&self) -> &[PerfSendResult] {
        &self.results
    }

    /// Failed Tasks with their errors, in registration order
    pub fn errors(&self) -> impl Iterator<Item = (&Task, &TaskError)> {
        self.errors
            .iter()
            .map(move |(index, error)| (&self.tasks[*index], error))
    }

    /// Run every Task once, in order.
    ///
    /// Individual Task failures are collected, not returned. The install
    /// location is created before the first Task and removed after the last.
    pub fn run(&mut self) -> Result<(), SuiteError> {
        if self.state != SuiteState::Created {
            return Err(SuiteError::AlreadyRun {
                suite: self.name.clone(),
            });
        }
        self.state = SuiteState::Running;
        tracing::info!("Suite: {}", self.name);

        let outcome = self.run_tasks();
        self.state = SuiteState::Finished;

        if self.errors.is_empty() {
            tracing::info!("{} of {} tasks completed", self.results.len(), self.tasks.len());
        } else {
            tracing::warn!(
                "{} of {} tasks failed:",
                self.errors.len(),
                self.tasks.len()
            );
            for (task, error) in self.errors() {
                tracing::warn!("  {}: {}", task.task_name(), error);
            }
        }

        outcome
    }

    fn run_tasks(&mut self) -> Result<(), SuiteError> {
        let worker = match &self.worker {
            Some(worker) => worker.clone(),
            None => WorkerCommand::current_exe()?,
        };
        let location = InstallLocation::create(&self.install_location).map_err(|source| {
            SuiteError::InstallLocation {
                path: self.install_location.clone(),
                source,
            }
        })?;
        let env = RunEnvironment {
            install_dir: location.path(),
            installer: &self.installer,
            worker: &worker,
        };

        for (index, task) in self.tasks.iter_mut().enumerate() {
            let ran = task.run(&env).map(|_| ());
            match ran.and_then(|()| task.get_results()) {
                Ok(record) => {
                    tracing::info!("  ✓ {}", task.task_name());
                    if let Some(dir) = &self.task_results_dir {
                        if let Err(e) = task.write_results(dir) {
                            tracing::warn!("Failed to write {} results: {}", task.task_name(), e);
                        }
                    }
                    self.results.push(record);
                }
                Err(error) => {
                    tracing::info!("  ✗ {}", task.task_name());
                    self.errors.push((index, error));
                }
            }
        }

        Ok(())
    }

    /// Write accumulated results as a JSON array (default `results.json`)
    pub fn write_results(&self, path: Option<&Path>) -> Result<PathBuf, SuiteError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_FILE));
        write_json_report(&path, &self.results)?;
        tracing::info!("Wrote {} results to {}", self.results.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_bench_core::InstallerConfig;
    use bson_bench_ipc::OperationOptions;

    fn benchmark(library: &str) -> BenchmarkSpecification {
        BenchmarkSpecification {
            document_path: "doc.json".to_string(),
            operation: "serialize".to_string(),
            library: library.to_string(),
            options: OperationOptions::new(),
            iterations: 10,
            warmup: 1,
            tags: Vec::new(),
            install_location: None,
        }
    }

    fn failing_installer() -> PackageInstaller {
        PackageInstaller::new(InstallerConfig {
            program: "false".to_string(),
            ..InstallerConfig::default()
        })
    }

    #[test]
    fn test_install_location_guard() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("bsonBench");
        {
            let location = InstallLocation::create(&path).unwrap();
            assert!(location.path().is_dir());
            std::fs::write(location.path().join("file"), b"x").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_task_registration_is_chainable() {
        let mut suite = Suite::new("chain");
        suite
            .task(benchmark("bson@6.0.0"))
            .unwrap()
            .task(benchmark("bson-ext@4.0.0"))
            .unwrap();
        assert_eq!(suite.tasks().len(), 2);

        let err = suite.task(benchmark("notBson@1.0.0")).err().unwrap();
        assert!(matches!(err, SuiteError::InvalidSpecifier(_)));
        assert_eq!(suite.tasks().len(), 2);
    }

    #[test]
    fn test_failures_are_collected_and_location_removed() {
        let root = tempfile::tempdir().unwrap();
        let location = root.path().join("install");

        let mut suite = Suite::new("failing")
            .with_install_location(&location)
            .with_installer(failing_installer())
            .with_worker(WorkerCommand::new("true"));
        suite
            .task(benchmark("bson@6.0.0"))
            .unwrap()
            .task(benchmark("bson@5.0.0"))
            .unwrap();

        suite.run().unwrap();

        assert_eq!(suite.state(), SuiteState::Finished);
        assert!(suite.results().is_empty());
        let failed: Vec<_> = suite.errors().map(|(t, _)| t.task_name().to_string()).collect();
        assert_eq!(failed, vec!["doc_serialize_bson@6.0.0", "doc_serialize_bson@5.0.0"]);
        assert!(suite.tasks().iter().all(Task::has_run));
        assert!(!location.exists());
    }

    #[test]
    fn test_second_run_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut suite = Suite::new("once")
            .with_install_location(root.path().join("install"))
            .with_installer(failing_installer())
            .with_worker(WorkerCommand::new("true"));
        suite.task(benchmark("bson@6.0.0")).unwrap();

        suite.run().unwrap();
        let err = suite.run().unwrap_err();
        assert!(matches!(err, SuiteError::AlreadyRun { .. }));
        // Nothing re-executed
        assert_eq!(suite.errors().count(), 1);
    }

    #[test]
    fn test_worker_crash_is_recorded() {
        let root = tempfile::tempdir().unwrap();
        let location = root.path().join("install");
        let module = location.join("node_modules").join("bson-6.0.0");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::write(
            module.join(bson_bench_core::MANIFEST_FILE),
            "builtin = \"reference\"\n",
        )
        .unwrap();

        let mut suite = Suite::new("crash")
            .with_install_location(&location)
            .with_installer(failing_installer())
            .with_worker(WorkerCommand::new("false"));
        suite.task(benchmark("bson@6.0.0")).unwrap();
        suite.run().unwrap();

        let (task, error) = suite.errors().next().unwrap();
        assert!(matches!(
            error,
            TaskError::Supervisor(SupervisorError::WorkerCrashed { .. })
        ));
        assert_eq!(task.worker_exits().len(), 1);
        assert!(!location.exists());
    }

    #[test]
    fn test_write_results_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let suite = Suite::new("empty");
        let path = suite
            .write_results(Some(&dir.path().join("out.json")))
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "[]");
    }
}
