#![warn(missing_docs)]
//! bson-bench IPC Protocol
//!
//! Wire protocol between a benchmark Task (the parent) and its isolated worker.
//! Messages are rkyv-archived and carried in length-prefixed frames over a pipe pair.
//! Exactly one `RunBenchmark` command travels down; exactly one result or error travels back.

mod framing;
mod messages;
mod options;

pub use framing::{
    FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, MAX_RESULT_SAMPLES,
    RESULT_FRAME_OVERHEAD, decode_frame, encode_frame, read_frame, write_frame,
};
pub use messages::{
    BenchmarkResult, BenchmarkSpecification, FailureKind, SupervisorMessage, WorkerFailure,
    WorkerMessage,
};
pub use options::{NamedOption, OperationOptions, OptionValue, VALIDATION_OPTION};

/// Protocol version; a worker built against a different version rejects the command
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the `<read_fd>,<write_fd>` pair handed to a worker
pub const IPC_FD_ENV: &str = "BSON_BENCH_IPC_FD";

/// Command-line flag that switches the harness binary into worker mode
pub const WORKER_FLAG: &str = "--bench-worker";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_flag_is_long_option() {
        assert!(WORKER_FLAG.starts_with("--"));
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
