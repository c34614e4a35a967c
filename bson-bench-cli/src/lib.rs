#![warn(missing_docs)]
//! bson-bench CLI Library
//!
//! Orchestrates cross-version BSON benchmarks: a [`Suite`] runs [`Task`]s one
//! after another, each in a fresh worker process that loads exactly one library
//! version. The same binary doubles as the worker (`--bench-worker`).
//!
//! # Example
//!
//! ```ignore
//! let mut suite = Suite::new("large arrays");
//! suite.task(spec_for("bson@6.0.0"))?.task(spec_for("bson@5.0.0"))?;
//! suite.run()?;
//! suite.write_results(None)?;
//! ```

mod config;
mod definition;
mod suite;
mod supervisor;
mod task;

pub use config::{BenchConfig, CONFIG_FILE, SuiteConfig, WorkerConfig};
pub use definition::{DefinitionError, SuiteDefinition};
pub use suite::{DEFAULT_RESULTS_FILE, InstallLocation, Suite, SuiteError, SuiteState};
pub use supervisor::{SupervisorError, WorkerCommand, WorkerHandle, WorkerOutcome};
pub use task::{RunEnvironment, Task, TaskError, TaskState};

use bson_bench_core::{PackageInstaller, WorkerMain};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;

/// bson-bench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "bson-bench")]
#[command(author, version, about = "Cross-version benchmarking harness for BSON libraries")]
pub struct Cli {
    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: discover bson-bench.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Internal: Run as worker process (used by Task)
    #[arg(long, hide = true)]
    pub bench_worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every task of a suite definition
    Run {
        /// Suite definition (TOML or JSON)
        suite: PathBuf,

        /// Aggregated results file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only run tasks whose name matches this regex
        #[arg(long)]
        filter: Option<String>,

        /// Shared install directory
        #[arg(long)]
        install_location: Option<PathBuf>,

        /// Also write one `<taskName>.json` per completed task here
        #[arg(long)]
        task_results_dir: Option<PathBuf>,
    },
    /// List the tasks of a suite definition
    List {
        /// Suite definition (TOML or JSON)
        suite: PathBuf,

        /// Only list tasks whose name matches this regex
        #[arg(long)]
        filter: Option<String>,
    },
    /// Write a default bson-bench.toml into the current directory
    Init,
}

/// Run the bson-bench CLI with process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the bson-bench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if cli.bench_worker {
        return run_worker_mode();
    }

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("bson_bench=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("bson_bench=info")
            .init();
    }

    let config = match &cli.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::discover().unwrap_or_default(),
    };

    match cli.command {
        Some(Commands::Run {
            suite,
            output,
            filter,
            install_location,
            task_results_dir,
        }) => {
            let definition = SuiteDefinition::load(&suite)?;
            let filter = compile_filter(filter.as_deref())?;
            run_suite(
                &config,
                definition,
                filter.as_ref(),
                output,
                install_location,
                task_results_dir,
            )
        }
        Some(Commands::List { suite, filter }) => {
            let definition = SuiteDefinition::load(&suite)?;
            let filter = compile_filter(filter.as_deref())?;
            list_tasks(&definition, filter.as_ref())
        }
        Some(Commands::Init) => init_config(),
        None => {
            anyhow::bail!("no command given; try `bson-bench run <suite>`");
        }
    }
}

/// Run as a worker process (IPC mode). Never returns on success.
fn run_worker_mode() -> anyhow::Result<()> {
    // stdout may carry frames when no fd pair is inherited
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bson_bench=warn")),
        )
        .init();

    let mut worker = WorkerMain::new();
    let code = worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))?;
    // The reply has been flushed; exit with its status
    std::process::exit(code);
}

fn compile_filter(filter: Option<&str>) -> anyhow::Result<Option<Regex>> {
    filter
        .map(|f| Regex::new(f).map_err(|e| anyhow::anyhow!("invalid filter {:?}: {}", f, e)))
        .transpose()
}

fn selected_tasks(
    definition: &SuiteDefinition,
    filter: Option<&Regex>,
) -> anyhow::Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for spec in &definition.tasks {
        let task = Task::new(spec.clone())?;
        if filter.map_or(true, |re| re.is_match(task.task_name())) {
            tasks.push(task);
        }
    }
    Ok(tasks)
}

fn run_suite(
    config: &BenchConfig,
    definition: SuiteDefinition,
    filter: Option<&Regex>,
    output: Option<PathBuf>,
    install_location: Option<PathBuf>,
    task_results_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let worker = match &config.worker.program {
        Some(program) => WorkerCommand::new(program),
        None => WorkerCommand::current_exe()?,
    }
    .with_pin_cpu(config.worker.pin_cpu);

    let mut suite = Suite::new(definition.name.clone())
        .with_install_location(install_location.unwrap_or_else(|| config.install_location()))
        .with_installer(PackageInstaller::new(config.installer.clone()))
        .with_worker(worker);
    if let Some(dir) = task_results_dir.or_else(|| config.suite.task_results_dir.clone()) {
        std::fs::create_dir_all(&dir)?;
        suite = suite.with_task_results_dir(dir);
    }

    for task in selected_tasks(&definition, filter)? {
        suite.task(task.benchmark().clone())?;
    }
    if suite.tasks().is_empty() {
        tracing::warn!("No tasks selected in suite {}", definition.name);
    }

    suite.run()?;
    let output = output.unwrap_or_else(|| config.suite.output.clone());
    suite.write_results(Some(&output))?;

    let failed = suite.errors().count();
    if failed > 0 {
        anyhow::bail!("{} of {} tasks failed", failed, suite.tasks().len());
    }
    Ok(())
}

fn list_tasks(definition: &SuiteDefinition, filter: Option<&Regex>) -> anyhow::Result<()> {
    println!("Suite: {}", definition.name);

    let tasks = selected_tasks(definition, filter)?;
    for task in &tasks {
        let spec = task.benchmark();
        let tags = if spec.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", spec.tags.join(", "))
        };
        println!(
            "├── {}{} ({} iterations, {} warmup, module {})",
            task.task_name(),
            tags,
            spec.iterations,
            spec.warmup,
            task.specifier().installed_module_name()
        );
    }

    println!("{} tasks found.", tasks.len());
    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(&path, BenchConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}
