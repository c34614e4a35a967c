//! Worker Process Entry Point
//!
//! A worker executes exactly one benchmark and exits. It receives the command on
//! fd 3 and answers on fd 4 (advertised through `BSON_BENCH_IPC_FD`), falling
//! back to stdin/stdout when the variable is absent.
//!
//! Exit code 0 means a result was sent, 1 means an error was sent. The reply is
//! flushed before the process exits.

use crate::codec::{load_codec, Codec, CodecError, LoadedCodec, ReferenceCodec};
use crate::fixture::load_fixture;
use crate::measure::{pin_to_cpu, Timer};
use crate::module::InstalledModule;
use crate::specifier::VersionSpecifier;
use bson::Bson;
use bson_bench_ipc::{
    BenchmarkResult, BenchmarkSpecification, FailureKind, FrameError, FrameReader, FrameWriter,
    OperationOptions, SupervisorMessage, WorkerFailure, WorkerMessage, IPC_FD_ENV,
    MAX_RESULT_SAMPLES, PROTOCOL_VERSION,
};
use std::hint::black_box;
use std::path::Path;
use std::str::FromStr;

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Environment variable naming the CPU a worker pins itself to
pub const PIN_CPU_ENV: &str = "BSON_BENCH_PIN_CPU";

/// Benchmarkable operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Encode the fixture document
    Serialize,
    /// Decode the fixture's reference encoding
    Deserialize,
}

impl Operation {
    /// Name used in benchmark definitions
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Serialize => "serialize",
            Operation::Deserialize => "deserialize",
        }
    }
}

impl FromStr for Operation {
    type Err = WorkerFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serialize" => Ok(Operation::Serialize),
            "deserialize" => Ok(Operation::Deserialize),
            other => Err(WorkerFailure::new(
                FailureKind::UnknownOperation,
                format!("unknown test type: {}", other),
            )),
        }
    }
}

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        tracing::warn!(
            "invalid {IPC_FD_ENV}={val:?} (expected format: <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

/// Single-shot worker
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
}

impl WorkerMain {
    /// Create a worker on fd 3/4 if `BSON_BENCH_IPC_FD` is set, otherwise stdin/stdout.
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::from_io(Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => {
                Self::from_io(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
            }
        }
    }

    /// Create a worker over arbitrary streams
    pub fn from_io(reader: Box<dyn std::io::Read>, writer: Box<dyn std::io::Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Receive one command, execute it and reply.
    ///
    /// Returns the exit code the process should terminate with. An error is
    /// returned only when the reply itself could not be delivered.
    pub fn run(&mut self) -> Result<i32, FrameError> {
        if let Some(cpu) = std::env::var(PIN_CPU_ENV)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            if let Err(e) = pin_to_cpu(cpu) {
                tracing::warn!("failed to pin worker to cpu {cpu}: {e}");
            }
        }

        let outcome = match self.reader.recv::<SupervisorMessage>() {
            Ok(SupervisorMessage::RunBenchmark {
                protocol_version,
                benchmark,
            }) if protocol_version == PROTOCOL_VERSION => run_guarded(&benchmark),
            Ok(SupervisorMessage::RunBenchmark {
                protocol_version, ..
            }) => Err(WorkerFailure::new(
                FailureKind::UnknownMessage,
                format!(
                    "unsupported protocol version {} (worker speaks {})",
                    protocol_version, PROTOCOL_VERSION
                ),
            )),
            Err(e) => Err(WorkerFailure::with_cause(
                FailureKind::UnknownMessage,
                "unknown ipc message",
                e,
            )),
        };

        let (reply, code) = match outcome {
            Ok(result) => (WorkerMessage::ReturnResult { result }, 0),
            Err(error) => (WorkerMessage::ReturnError { error }, 1),
        };
        match self.writer.send(&reply) {
            Ok(()) => Ok(code),
            Err(e @ FrameError::FrameTooLarge { .. }) => {
                let error = WorkerFailure::with_cause(
                    FailureKind::TooManyIterations,
                    "benchmark result does not fit in one frame",
                    e,
                );
                self.writer.send(&WorkerMessage::ReturnError { error })?;
                Ok(1)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

fn run_guarded(spec: &BenchmarkSpecification) -> Result<BenchmarkResult, WorkerFailure> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_benchmark(spec))).unwrap_or_else(
        |panic| {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(WorkerFailure::new(FailureKind::Panic, message))
        },
    )
}

fn library_failure(library: &str, cause: impl std::fmt::Display) -> WorkerFailure {
    WorkerFailure::with_cause(
        FailureKind::LibraryLoad,
        format!("failed to load library {}", library),
        cause,
    )
}

fn load_library(spec: &BenchmarkSpecification) -> Result<LoadedCodec, WorkerFailure> {
    let specifier =
        VersionSpecifier::parse(&spec.library).map_err(|e| library_failure(&spec.library, e))?;
    let install_location = spec
        .install_location
        .as_deref()
        .ok_or_else(|| library_failure(&spec.library, "no install location"))?;

    let root = Path::new(install_location).join(specifier.installed_module_name());
    let module = InstalledModule::open(&root).map_err(|e| library_failure(&spec.library, e))?;
    let codec = load_codec(&module).map_err(|e| library_failure(&spec.library, e))?;
    tracing::debug!(
        "{} resolved to codec {} (package {}, version {})",
        spec.library,
        codec.name(),
        module.name().unwrap_or("unnamed"),
        module.version().unwrap_or("unknown")
    );
    Ok(codec)
}

enum Input<'a> {
    Document(&'a Bson),
    Bytes(Vec<u8>),
}

/// Execute one benchmark in the current process
pub fn run_benchmark(spec: &BenchmarkSpecification) -> Result<BenchmarkResult, WorkerFailure> {
    let operation: Operation = spec.operation.parse()?;
    let document = load_fixture(Path::new(&spec.document_path)).map_err(|e| {
        WorkerFailure::with_cause(
            FailureKind::DocumentRead,
            format!("failed to read document {}", spec.document_path),
            e,
        )
    })?;
    let codec = load_library(spec)?;
    run_with_codec(spec, operation, &document, &*codec)
}

/// Time `operation` on an already loaded fixture and codec
pub fn run_with_codec(
    spec: &BenchmarkSpecification,
    operation: Operation,
    document: &Bson,
    codec: &dyn Codec,
) -> Result<BenchmarkResult, WorkerFailure> {
    if spec.iterations > MAX_RESULT_SAMPLES {
        return Err(WorkerFailure::new(
            FailureKind::TooManyIterations,
            format!(
                "{} iterations requested, at most {} fit in one result",
                spec.iterations, MAX_RESULT_SAMPLES
            ),
        ));
    }
    let defaults = OperationOptions::new();

    let (input, document_size) = match operation {
        Operation::Serialize => {
            let size = codec
                .serialize(document, &defaults)
                .map_err(|e| {
                    WorkerFailure::with_cause(
                        FailureKind::SizeCalculation,
                        "failed to calculate document size",
                        e,
                    )
                })?
                .len();
            (Input::Document(document), size)
        }
        Operation::Deserialize => {
            let bytes = ReferenceCodec.serialize(document, &defaults).map_err(|e| {
                WorkerFailure::with_cause(
                    FailureKind::FixtureSerialization,
                    "failed to serialize fixture",
                    e,
                )
            })?;
            let size = bytes.len();
            (Input::Bytes(bytes), size)
        }
    };

    let options = &spec.options;
    let run_once = || -> Result<(), CodecError> {
        match &input {
            Input::Document(doc) => {
                black_box(codec.serialize(black_box(*doc), options)?);
            }
            Input::Bytes(bytes) => {
                black_box(codec.deserialize(black_box(bytes), options)?);
            }
        }
        Ok(())
    };
    let op_failed = |e: CodecError| {
        WorkerFailure::with_cause(
            FailureKind::OperationFailed,
            format!("{} failed", operation.as_str()),
            e,
        )
    };

    run_once().map_err(op_failed)?;

    for _ in 0..spec.warmup {
        run_once().map_err(op_failed)?;
    }

    let mut duration_millis = Vec::with_capacity(usize::try_from(spec.iterations).unwrap_or(0));
    for _ in 0..spec.iterations {
        let timer = Timer::start();
        let outcome = run_once();
        let elapsed = timer.elapsed_millis();
        outcome.map_err(op_failed)?;
        duration_millis.push(elapsed);
    }

    Ok(BenchmarkResult {
        duration_millis,
        document_size_bytes: document_size as u64,
    })
}
