/// Interleaved sample storage in the two formats the engine ingests.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::I16(values) => values.len(),
            Samples::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample value normalised to `[-1.0, 1.0]`.
    fn normalized(&self, index: usize) -> f32 {
        match self {
            Samples::I16(values) => f32::from(values[index]) / 32768.0,
            Samples::F32(values) => values[index],
        }
    }
}

/// One block of interleaved PCM frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleChunk {
    channels: u16,
    frames: usize,
    samples: Samples,
}

impl SampleChunk {
    pub fn from_i16(channels: u16, samples: Vec<i16>) -> Self {
        Self::new(channels, Samples::I16(samples))
    }

    pub fn from_f32(channels: u16, samples: Vec<f32>) -> Self {
        Self::new(channels, Samples::F32(samples))
    }

    fn new(channels: u16, samples: Samples) -> Self {
        debug_assert!(channels > 0, "chunk needs at least one channel");
        let stride = usize::from(channels.max(1));
        debug_assert_eq!(samples.len() % stride, 0, "partial frame in chunk");
        Self {
            channels,
            frames: samples.len() / stride,
            samples,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Normalised values of a single channel, in frame order.
    pub fn channel(&self, channel: u16) -> Vec<f32> {
        if channel >= self.channels {
            return Vec::new();
        }
        let stride = usize::from(self.channels);
        (0..self.frames)
            .map(|frame| self.samples.normalized(frame * stride + usize::from(channel)))
            .collect()
    }

    /// Largest absolute normalised sample value.
    pub fn peak(&self) -> f32 {
        (0..self.samples.len())
            .map(|index| self.samples.normalized(index).abs())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_follow_channel_count() {
        let stereo = SampleChunk::from_i16(2, vec![1, 1, 2, 2, 3, 3]);
        assert_eq!(stereo.frames(), 3);
        assert_eq!(stereo.channels(), 2);

        let mono = SampleChunk::from_f32(1, vec![0.1, 0.2]);
        assert_eq!(mono.frames(), 2);
        assert!(!mono.is_empty());
    }

    #[test]
    fn channel_deinterleaves_and_normalises() {
        let chunk = SampleChunk::from_i16(2, vec![16384, -16384, 0, 32767]);
        assert_eq!(chunk.channel(0), vec![0.5, 0.0]);
        assert_eq!(chunk.channel(1)[0], -0.5);
        assert!(chunk.channel(2).is_empty());
    }

    #[test]
    fn peak_uses_absolute_values() {
        let chunk = SampleChunk::from_f32(1, vec![0.25, -0.75, 0.5]);
        assert!((chunk.peak() - 0.75).abs() < f32::EPSILON);
    }
}
