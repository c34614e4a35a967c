//! Worker Processes
//!
//! Spawns one worker per benchmark and exchanges exactly one command and one
//! reply with it over a pipe pair mapped to fd 3/4.

use bson_bench_core::PIN_CPU_ENV;
use bson_bench_ipc::{
    BenchmarkResult, BenchmarkSpecification, FrameError, FrameReader, FrameWriter, IPC_FD_ENV,
    PROTOCOL_VERSION, SupervisorMessage, WORKER_FLAG, WorkerFailure, WorkerMessage,
};
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;

/// Failures driving a worker process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Worker process could not be started
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Channel failure other than the worker vanishing
    #[error("IPC error: {0}")]
    Ipc(#[from] FrameError),

    /// Worker closed its channel without a reply
    #[error("Worker exited without reporting a result ({status})")]
    WorkerCrashed {
        /// How the worker terminated
        status: ExitStatus,
    },

    /// Worker exit status could not be collected
    #[error("Failed to wait for worker: {0}")]
    Wait(#[source] std::io::Error),
}

/// How to launch a worker
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    pin_cpu: Option<usize>,
}

impl WorkerCommand {
    /// Re-invoke the running binary in worker mode
    pub fn current_exe() -> Result<Self, SupervisorError> {
        let program = std::env::current_exe().map_err(SupervisorError::SpawnFailed)?;
        Ok(Self::new(program))
    }

    /// Use a specific worker binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            pin_cpu: None,
        }
    }

    /// Pin the worker to `cpu`, if given
    pub fn with_pin_cpu(mut self, cpu: Option<usize>) -> Self {
        self.pin_cpu = cpu;
        self
    }

    /// Worker executable
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// What a worker produced
#[derive(Debug)]
pub struct WorkerOutcome {
    /// The reported result or structured error
    pub reply: Result<BenchmarkResult, WorkerFailure>,
    /// Exit status, always observed after the reply
    pub status: ExitStatus,
}

/// Create a close-on-exec pipe pair, returning (read_fd, write_fd).
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    // Atomic close-on-exec: a concurrent fork elsewhere must not inherit these
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

/// Create a close-on-exec pipe pair, returning (read_fd, write_fd).
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// A running worker
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: Option<FrameWriter<std::fs::File>>,
}

impl WorkerHandle {
    /// Spawn a worker using fd 3/4 for IPC.
    pub fn spawn(worker: &WorkerCommand) -> Result<Self, SupervisorError> {
        // cmd_pipe: parent writes the command → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe().map_err(SupervisorError::SpawnFailed)?;
        // msg_pipe: worker writes its reply to fd 4 → parent reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(&worker.program);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        match worker.pin_cpu {
            Some(cpu) => command.env(PIN_CPU_ENV, cpu.to_string()),
            None => command.env_remove(PIN_CPU_ENV),
        };

        // In the child: move the kept ends above the 3/4 range first so the
        // final dup2 calls cannot clobber each other, then map them to 3/4.
        unsafe {
            command.pre_exec(move || {
                let kept_read = libc::fcntl(cmd_read, libc::F_DUPFD_CLOEXEC, 10);
                let kept_write = libc::fcntl(msg_write, libc::F_DUPFD_CLOEXEC, 10);
                if kept_read < 0 || kept_write < 0 {
                    return Err(std::io::Error::last_os_error());
                }

                // Parent-side ends leaked into the child
                libc::close(cmd_write);
                libc::close(msg_read);

                // dup2 clears close-on-exec on the target
                if libc::dup2(kept_read, 3) < 0 || libc::dup2(kept_write, 4) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                libc::close(kept_read);
                libc::close(kept_write);

                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };
        tracing::debug!("Spawned worker pid {}", child.id());

        // Child-side ends are not ours
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        Ok(Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: Some(FrameWriter::new(writer_file)),
        })
    }

    /// Pid of the worker process
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Send the benchmark, await the reply, then await process exit.
    pub fn run(mut self, benchmark: &BenchmarkSpecification) -> Result<WorkerOutcome, SupervisorError> {
        if let Some(mut writer) = self.writer.take() {
            let sent = writer.send(&SupervisorMessage::RunBenchmark {
                protocol_version: PROTOCOL_VERSION,
                benchmark: benchmark.clone(),
            });
            // Dropping the writer closes fd 3 so the worker never blocks on it
            drop(writer);
            if let Err(e) = sent {
                // A worker that died on startup closes its end before we write
                let status = self.child.wait().map_err(SupervisorError::Wait)?;
                return Err(match e {
                    FrameError::Io(ref io) if io.kind() == std::io::ErrorKind::BrokenPipe => {
                        SupervisorError::WorkerCrashed { status }
                    }
                    other => SupervisorError::Ipc(other),
                });
            }
        }

        let message = self.reader.recv::<WorkerMessage>();
        let status = self.child.wait().map_err(SupervisorError::Wait)?;
        tracing::debug!("Worker pid {} exited with {}", self.child.id(), status);

        match message {
            Ok(WorkerMessage::ReturnResult { result }) => Ok(WorkerOutcome {
                reply: Ok(result),
                status,
            }),
            Ok(WorkerMessage::ReturnError { error }) => Ok(WorkerOutcome {
                reply: Err(error),
                status,
            }),
            Err(FrameError::EndOfStream) => Err(SupervisorError::WorkerCrashed { status }),
            Err(e) => Err(SupervisorError::Ipc(e)),
        }
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
