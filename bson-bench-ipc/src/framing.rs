//! Length-Prefixed Frames
//!
//! Pipes are byte streams; frames restore message boundaries on top of them.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 LE)  | rkyv payload     |
//! +----------------+------------------+
//! ```

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Largest accepted frame (64 MiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Bytes a `ReturnResult` frame spends outside its duration samples
pub const RESULT_FRAME_OVERHEAD: usize = 4096;

/// Most measured iterations whose durations fit in one result frame.
///
/// Each sample archives as one f64, so a run is capped a little under eight
/// million iterations.
pub const MAX_RESULT_SAMPLES: u64 =
    ((MAX_FRAME_SIZE - RESULT_FRAME_OVERHEAD) / std::mem::size_of::<f64>()) as u64;

/// Errors raised while encoding or decoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying pipe failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// rkyv could not serialize the message
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload did not validate as the expected message type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Frame length exceeds [`MAX_FRAME_SIZE`]
    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Announced or encoded length
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Structurally invalid frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Peer closed the channel before a frame header arrived
    #[error("End of stream")]
    EndOfStream,
}

fn check_len(size: usize) -> Result<usize, FrameError> {
    match size {
        0 => Err(FrameError::InvalidFrame("zero-length frame".to_string())),
        size if size > MAX_FRAME_SIZE => Err(FrameError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        }),
        size => Ok(size),
    }
}

/// Archive `message` into a frame payload.
///
/// Fails with [`FrameError::FrameTooLarge`] before anything reaches the pipe,
/// so the sender can still answer with a smaller message.
pub fn encode_frame<T>(message: &T) -> Result<AlignedVec, FrameError>
where
    T: Serialize<AllocSerializer<256>>,
{
    let payload =
        rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Serialization(e.to_string()))?;
    check_len(payload.len())?;
    Ok(payload)
}

/// Validate a payload and rebuild the message it archives
pub fn decode_frame<T>(payload: &[u8]) -> Result<T, FrameError>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    rkyv::check_archived_root::<T>(payload)
        .map_err(|e| FrameError::Deserialization(e.to_string()))?
        .deserialize(&mut Infallible)
        .map_err(|_| FrameError::Deserialization("infallible deserializer failed".to_string()))
}

/// Encode `message`, write it behind its length prefix and flush.
///
/// The flush is part of the contract: a worker relies on it to have delivered
/// its final message before it exits.
pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize<AllocSerializer<256>>,
{
    let payload = encode_frame(message)?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut BufReader<R>) -> Result<usize, FrameError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::EndOfStream,
        _ => FrameError::Io(e),
    })?;
    check_len(u32::from_le_bytes(header) as usize)
}

/// Read one frame and decode it as `T`
pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    let len = read_header(reader)?;

    // rkyv validates in place and needs an aligned buffer
    let mut payload = AlignedVec::with_capacity(len);
    payload.resize(len, 0);
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            FrameError::InvalidFrame(format!("truncated frame: expected {} bytes", len))
        }
        _ => FrameError::Io(e),
    })?;

    decode_frame(&payload)
}

/// Sending half of a channel
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a raw writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
        }
    }

    /// Send one message; returns once it has been flushed to the pipe
    pub fn send<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        write_frame(&mut self.writer, message)
    }

    /// Consume the writer, closing our end of the channel once dropped
    pub fn into_inner(self) -> BufWriter<W> {
        self.writer
    }
}

/// Receiving half of a channel
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a raw reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    /// Block until the next message arrives
    pub fn recv<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        read_frame(&mut self.reader)
    }
}
