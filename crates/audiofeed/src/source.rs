use std::io;
use std::path::PathBuf;

use crate::chunk::SampleChunk;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("audio file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("unsupported audio format in {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("failed to read audio file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("audio source is closed")]
    Closed,
    #[error("audio read failed: {0}")]
    Read(String),
    #[error("audio source produced no frames after rewinding")]
    Empty,
    #[error(transparent)]
    Reopen(#[from] OpenError),
}

/// Result of pulling frames from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Chunk(SampleChunk),
    EndOfStream,
}

/// Anything that can hand out interleaved PCM chunks.
pub trait SampleSource {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Reads up to `max_frames` frames. Returns `EndOfStream` once nothing is left.
    fn read_chunk(&mut self, max_frames: usize) -> Result<ReadOutcome, SourceError>;

    /// Seeks back to the first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Releases decoder resources. Calling it twice is harmless.
    fn close(&mut self);
}
