use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::chunk::{SampleChunk, Samples};
use crate::file::FileSource;
use crate::source::{ReadOutcome, SampleSource, SourceError};
use crate::synth::SyntheticSource;

const PEAK_LOG_INTERVAL: u64 = 100;

/// Audio-ingest capability of the visualization engine.
pub trait PcmSink {
    fn add_i16(&mut self, samples: &[i16], channels: u16, frames: usize);
    fn add_f32(&mut self, samples: &[f32], channels: u16, frames: usize);
}

/// Where the pipeline currently pulls samples from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Closed,
    Open {
        path: PathBuf,
        channels: u16,
        sample_rate: u32,
    },
    Synthetic {
        phase: u64,
    },
}

/// Coarse health of the feed, for callers that want to surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Inactive,
    Streaming,
    Synthetic,
    /// A file was playing but failed mid-stream; synthetic audio took over.
    Degraded { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOrigin {
    File,
    Synthetic,
}

/// Summary of the chunk forwarded during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReport {
    pub origin: ChunkOrigin,
    pub channels: u16,
    pub frames: usize,
}

/// Pulls one chunk per tick and forwards it to the engine.
#[derive(Debug)]
pub struct AudioFeedPipeline {
    chunk_frames: usize,
    path: Option<PathBuf>,
    active: bool,
    file: Option<FileSource>,
    synthetic: SyntheticSource,
    degraded: Option<String>,
    file_chunks: u64,
}

impl AudioFeedPipeline {
    pub fn new(chunk_frames: usize) -> Self {
        Self {
            chunk_frames: chunk_frames.max(1),
            path: None,
            active: false,
            file: None,
            synthetic: SyntheticSource::new(),
            degraded: None,
            file_chunks: 0,
        }
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> SourceState {
        match &self.file {
            Some(file) => SourceState::Open {
                path: file.path().to_path_buf(),
                channels: file.channels(),
                sample_rate: file.sample_rate(),
            },
            None if self.active => SourceState::Synthetic {
                phase: self.synthetic.counter(),
            },
            None => SourceState::Closed,
        }
    }

    pub fn status(&self) -> FeedStatus {
        if !self.active {
            return FeedStatus::Inactive;
        }
        if self.file.is_some() {
            return FeedStatus::Streaming;
        }
        match &self.degraded {
            Some(reason) => FeedStatus::Degraded {
                reason: reason.clone(),
            },
            None => FeedStatus::Synthetic,
        }
    }

    /// Changes the audio file. An already active pipeline reopens immediately;
    /// otherwise the file is opened on [`activate`](Self::activate).
    pub fn set_audio_file(&mut self, path: Option<PathBuf>) {
        let path = path.filter(|p| !p.as_os_str().is_empty());
        if path == self.path {
            return;
        }
        self.path = path;
        self.degraded = None;
        if self.active {
            self.close_file();
            self.open_current();
        }
    }

    /// Opens the configured file (or settles on synthetic audio).
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.open_current();
    }

    /// Releases the decoder and deactivates the pipeline.
    pub fn close(&mut self) {
        self.close_file();
        self.active = false;
    }

    /// Forwards exactly one chunk to `sink`, or does nothing without a sink.
    pub fn tick(&mut self, sink: Option<&mut dyn PcmSink>) -> Option<FeedReport> {
        let Some(sink) = sink else {
            trace!("engine audio sink unavailable; skipping audio tick");
            return None;
        };

        let (chunk, origin) = self.next_chunk();
        let channels = chunk.channels();
        let frames = chunk.frames();
        match chunk.samples() {
            Samples::I16(values) => sink.add_i16(values, channels, frames),
            Samples::F32(values) => sink.add_f32(values, channels, frames),
        }

        Some(FeedReport {
            origin,
            channels,
            frames,
        })
    }

    fn next_chunk(&mut self) -> (SampleChunk, ChunkOrigin) {
        if let Some(file) = self.file.as_mut() {
            match read_looping(file, self.chunk_frames) {
                Ok(chunk) => {
                    self.file_chunks += 1;
                    if self.file_chunks % PEAK_LOG_INTERVAL == 0 {
                        debug!(peak = chunk.peak(), frames = chunk.frames(), "audio chunk");
                    }
                    return (chunk, ChunkOrigin::File);
                }
                Err(err) => {
                    warn!(
                        path = %file.path().display(),
                        error = %err,
                        "audio read failed; continuing with synthetic audio"
                    );
                    file.close();
                    self.degraded = Some(err.to_string());
                    self.file = None;
                }
            }
        }

        let chunk = self.synthetic.next_chunk(self.chunk_frames);
        (chunk, ChunkOrigin::Synthetic)
    }

    fn open_current(&mut self) {
        let Some(path) = self.path.as_deref() else {
            info!("no audio file specified; using synthetic audio");
            return;
        };

        match FileSource::open(path) {
            Ok(source) => {
                info!(
                    path = %path.display(),
                    channels = source.channels(),
                    sample_rate = source.sample_rate(),
                    "opened audio file"
                );
                self.file_chunks = 0;
                self.file = Some(source);
            }
            Err(err) => {
                warn!(error = %err, "could not open audio file; using synthetic audio");
            }
        }
    }

    fn close_file(&mut self) {
        if let Some(mut file) = self.file.take() {
            file.close();
        }
    }
}

impl Drop for AudioFeedPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads a chunk, rewinding once when the end of the stream is reached.
fn read_looping(
    source: &mut dyn SampleSource,
    frames: usize,
) -> Result<SampleChunk, SourceError> {
    if let ReadOutcome::Chunk(chunk) = source.read_chunk(frames)? {
        return Ok(chunk);
    }

    debug!("end of audio reached; looping");
    source.rewind()?;
    match source.read_chunk(frames)? {
        ReadOutcome::Chunk(chunk) => Ok(chunk),
        ReadOutcome::EndOfStream => Err(SourceError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        i16_calls: usize,
        f32_calls: usize,
        frames: Vec<usize>,
    }

    impl PcmSink for CountingSink {
        fn add_i16(&mut self, samples: &[i16], channels: u16, frames: usize) {
            assert_eq!(samples.len(), frames * usize::from(channels));
            self.i16_calls += 1;
            self.frames.push(frames);
        }

        fn add_f32(&mut self, samples: &[f32], channels: u16, frames: usize) {
            assert_eq!(samples.len(), frames * usize::from(channels));
            self.f32_calls += 1;
            self.frames.push(frames);
        }
    }

    /// Source that yields a fixed number of chunks, then ends, then fails.
    struct ScriptedSource {
        chunks_left: usize,
        rewinds: usize,
        fail_rewind: bool,
    }

    impl SampleSource for ScriptedSource {
        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            8_000
        }

        fn read_chunk(&mut self, max_frames: usize) -> Result<ReadOutcome, SourceError> {
            if self.chunks_left == 0 {
                return Ok(ReadOutcome::EndOfStream);
            }
            self.chunks_left -= 1;
            Ok(ReadOutcome::Chunk(SampleChunk::from_f32(
                1,
                vec![0.0; max_frames],
            )))
        }

        fn rewind(&mut self) -> Result<(), SourceError> {
            self.rewinds += 1;
            if self.fail_rewind {
                return Err(SourceError::Read("gone".into()));
            }
            self.chunks_left = 1;
            Ok(())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn tick_without_sink_is_a_no_op() {
        let mut pipeline = AudioFeedPipeline::new(128);
        pipeline.activate();
        assert!(pipeline.tick(None).is_none());
        assert_eq!(pipeline.state(), SourceState::Synthetic { phase: 0 });
    }

    #[test]
    fn synthetic_ticks_forward_one_chunk_each() {
        let mut pipeline = AudioFeedPipeline::new(256);
        pipeline.activate();
        let mut sink = CountingSink::default();
        for _ in 0..3 {
            let report = pipeline.tick(Some(&mut sink)).expect("chunk forwarded");
            assert_eq!(report.origin, ChunkOrigin::Synthetic);
            assert_eq!(report.frames, 256);
            assert_eq!(report.channels, 2);
        }
        assert_eq!(sink.i16_calls, 3);
        assert_eq!(sink.f32_calls, 0);
        assert_eq!(pipeline.state(), SourceState::Synthetic { phase: 768 });
        assert_eq!(pipeline.status(), FeedStatus::Synthetic);
    }

    #[test]
    fn inactive_pipeline_reports_closed() {
        let mut pipeline = AudioFeedPipeline::new(64);
        assert_eq!(pipeline.state(), SourceState::Closed);
        assert_eq!(pipeline.status(), FeedStatus::Inactive);
        pipeline.activate();
        pipeline.close();
        pipeline.close();
        assert_eq!(pipeline.state(), SourceState::Closed);
    }

    #[test]
    fn read_looping_rewinds_on_end_of_stream() {
        let mut source = ScriptedSource {
            chunks_left: 1,
            rewinds: 0,
            fail_rewind: false,
        };
        read_looping(&mut source, 16).unwrap();
        assert_eq!(source.rewinds, 0);
        let chunk = read_looping(&mut source, 16).unwrap();
        assert_eq!(chunk.frames(), 16);
        assert_eq!(source.rewinds, 1);
    }

    #[test]
    fn read_looping_surfaces_rewind_failure() {
        let mut source = ScriptedSource {
            chunks_left: 0,
            rewinds: 0,
            fail_rewind: true,
        };
        let err = read_looping(&mut source, 16).unwrap_err();
        assert!(matches!(err, SourceError::Read(_)));
    }

    #[test]
    fn missing_file_falls_back_to_synthetic() {
        let mut pipeline = AudioFeedPipeline::new(64);
        pipeline.set_audio_file(Some(PathBuf::from("/definitely/not/here.wav")));
        pipeline.activate();
        assert!(matches!(pipeline.state(), SourceState::Synthetic { .. }));
        let mut sink = CountingSink::default();
        let report = pipeline.tick(Some(&mut sink)).unwrap();
        assert_eq!(report.origin, ChunkOrigin::Synthetic);
    }

    #[test]
    fn empty_path_counts_as_no_file() {
        let mut pipeline = AudioFeedPipeline::new(64);
        pipeline.set_audio_file(Some(PathBuf::new()));
        assert!(pipeline.audio_path().is_none());
    }
}
