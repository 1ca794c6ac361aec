use std::collections::VecDeque;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::chunk::SampleChunk;
use crate::source::{OpenError, ReadOutcome, SampleSource, SourceError};

/// Decoded audio file read in fixed-size chunks of `f32` samples.
pub struct FileSource {
    path: PathBuf,
    channels: u16,
    sample_rate: u32,
    stream: Option<DecoderStream>,
}

struct DecoderStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pending: VecDeque<f32>,
    exhausted: bool,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(OpenError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(OpenError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(OpenError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let file = File::open(path).map_err(|source| OpenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| classify_open_error(path, err))?;
        let format = probed.format;

        let unsupported = |reason: String| OpenError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason,
        };

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unsupported("no decodable audio track".into()))?;
        let track_id = track.id;
        let channels = track
            .codec_params
            .channels
            .map(|channels| channels.count())
            .ok_or_else(|| unsupported("channel layout is unknown".into()))?;
        if !(1..=2).contains(&channels) {
            return Err(unsupported(format!(
                "only mono or stereo audio is supported (found {channels} channels)"
            )));
        }
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unsupported("sample rate is unknown".into()))?;
        let decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|err| unsupported(err.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            channels: channels as u16,
            sample_rate,
            stream: Some(DecoderStream {
                format,
                decoder,
                track_id,
                sample_buf: None,
                pending: VecDeque::new(),
                exhausted: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

fn classify_open_error(path: &Path, err: SymphoniaError) -> OpenError {
    match err {
        // Files shorter than the probe window end before any format marker.
        SymphoniaError::IoError(source) if source.kind() != io::ErrorKind::UnexpectedEof => {
            OpenError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
        other => OpenError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

impl DecoderStream {
    /// Decodes packets until `wanted` samples are buffered or the stream ends.
    fn fill(&mut self, wanted: usize) -> Result<(), SourceError> {
        while self.pending.len() < wanted && !self.exhausted {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.exhausted = true;
                    break;
                }
                Err(err) => return Err(SourceError::Read(err.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!(reason, "skipping undecodable audio packet");
                    continue;
                }
                Err(err) => return Err(SourceError::Read(err.to_string())),
            };

            // SampleBuffer capacity counts interleaved samples, AudioBufferRef counts frames.
            let needed = decoded.capacity() * decoded.spec().channels.count();
            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < needed);
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::<f32>::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.extend(buf.samples().iter().copied());
            }
        }
        Ok(())
    }
}

impl SampleSource for FileSource {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<ReadOutcome, SourceError> {
        let stream = self.stream.as_mut().ok_or(SourceError::Closed)?;
        let stride = usize::from(self.channels);
        let wanted = max_frames * stride;
        stream.fill(wanted)?;

        let available = stream.pending.len() - stream.pending.len() % stride;
        let take = available.min(wanted);
        if take == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        let samples: Vec<f32> = stream.pending.drain(..take).collect();
        Ok(ReadOutcome::Chunk(SampleChunk::from_f32(self.channels, samples)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        debug!(path = %self.path.display(), "rewinding audio file");
        let reopened = FileSource::open(&self.path)?;
        if reopened.channels != self.channels {
            return Err(SourceError::Reopen(OpenError::UnsupportedFormat {
                path: self.path.clone(),
                reason: format!(
                    "channel count changed from {} to {} while looping",
                    self.channels, reopened.channels
                ),
            }));
        }
        self.sample_rate = reopened.sample_rate;
        self.stream = reopened.stream;
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(path = %self.path.display(), "closed audio file");
        }
    }
}
