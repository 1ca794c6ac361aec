//! PCM supply for the visualizer.
//!
//! Every frame tick needs exactly one chunk of interleaved samples. The
//! chunk either comes from a decoded audio file ([`FileSource`]) or, when no
//! file is open, from a deterministic sine generator ([`SyntheticSource`]):
//!
//! ```text
//!   set_audio_file ──▶ AudioFeedPipeline ──tick──▶ PcmSink (engine)
//!                         │        ▲
//!                         ▼        │ EndOfStream → rewind
//!                    FileSource ───┘
//!                         │ open/read failure
//!                         ▼
//!                  SyntheticSource
//! ```

mod chunk;
mod feed;
mod file;
mod source;
mod synth;

pub use chunk::{SampleChunk, Samples};
pub use feed::{AudioFeedPipeline, ChunkOrigin, FeedReport, FeedStatus, PcmSink, SourceState};
pub use file::FileSource;
pub use source::{OpenError, ReadOutcome, SampleSource, SourceError};
pub use synth::{
    synthetic_sample, SyntheticSource, SYNTHETIC_AMPLITUDE, SYNTHETIC_CHANNELS,
    SYNTHETIC_PHASE_STEP, SYNTHETIC_SAMPLE_RATE,
};

/// Frames handed to the engine per tick unless configured otherwise.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;
