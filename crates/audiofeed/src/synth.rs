use crate::chunk::SampleChunk;
use crate::source::{ReadOutcome, SampleSource, SourceError};

pub const SYNTHETIC_AMPLITUDE: f64 = 32760.0;
/// Phase advance per frame, in radians.
pub const SYNTHETIC_PHASE_STEP: f64 = 0.1;
pub const SYNTHETIC_CHANNELS: u16 = 2;
pub const SYNTHETIC_SAMPLE_RATE: u32 = 44_100;

/// Value of the synthetic waveform at an absolute frame index.
pub fn synthetic_sample(frame: u64) -> i16 {
    let value = (frame as f64 * SYNTHETIC_PHASE_STEP).sin() * SYNTHETIC_AMPLITUDE;
    value as i16
}

/// Deterministic stereo sine used whenever no decoded file is available.
///
/// The internal counter is the absolute index of the next frame, so chunks
/// read back to back form one continuous waveform regardless of chunk size.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    counter: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the waveform at an arbitrary frame index.
    pub fn with_counter(counter: u64) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn next_chunk(&mut self, frames: usize) -> SampleChunk {
        let channels = usize::from(SYNTHETIC_CHANNELS);
        let mut samples = Vec::with_capacity(frames * channels);
        for offset in 0..frames as u64 {
            let value = synthetic_sample(self.counter.wrapping_add(offset));
            samples.extend(std::iter::repeat(value).take(channels));
        }
        self.counter = self.counter.wrapping_add(frames as u64);
        SampleChunk::from_i16(SYNTHETIC_CHANNELS, samples)
    }
}

impl SampleSource for SyntheticSource {
    fn channels(&self) -> u16 {
        SYNTHETIC_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        SYNTHETIC_SAMPLE_RATE
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<ReadOutcome, SourceError> {
        Ok(ReadOutcome::Chunk(self.next_chunk(max_frames)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.counter = 0;
        Ok(())
    }

    fn close(&mut self) {}
}
