//! WAV file producer backed by `hound`.
//!
//! Samples are decoded lazily, one frame per output slot, and converted to
//! `f64` in [-1.0, 1.0]. Mono files are duplicated onto both channels;
//! files with more than two channels contribute their first two.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{error, info};

use crate::{
    buffering::{StereoFrame, Stream},
    error::{FirStreamError, Result},
};

type SampleIter = Box<dyn Iterator<Item = hound::Result<f64>> + Send>;

/// Streams stereo frames out of a WAV container.
pub struct WavSource {
    samples: SampleIter,
    channels: usize,
    sample_rate: u32,
    duration_frames: u32,
    /// One interleaved frame worth of decoded samples.
    frame_buf: Vec<f64>,
    frames_read: u64,
    finished: bool,
    /// Set when the data chunk ends in a decode error rather than cleanly.
    decode_failed: Arc<AtomicBool>,
}

impl WavSource {
    /// Open and validate a WAV file.
    ///
    /// # Errors
    /// `FirStreamError::Io` if the file cannot be opened,
    /// `FirStreamError::Decode` if the header is not a supported WAV.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader: hound::WavReader<BufReader<File>> = hound::WavReader::open(path)?;
        let source = Self::from_reader(reader)?;
        info!(
            path = %path.display(),
            sample_rate = source.sample_rate,
            channels = source.channels,
            frames = source.duration_frames,
            "wav source opened"
        );
        Ok(source)
    }

    /// Wrap an already-parsed reader.
    pub fn from_reader<R: Read + Send + 'static>(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = usize::from(spec.channels);
        if channels == 0 {
            return Err(FirStreamError::Decode("wav header declares zero channels".into()));
        }
        let duration_frames = reader.duration();

        let samples: SampleIter = match spec.sample_format {
            hound::SampleFormat::Float => {
                Box::new(reader.into_samples::<f32>().map(|s| s.map(f64::from)))
            }
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(FirStreamError::Decode(format!(
                        "unsupported bit depth: {}",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f64;
                Box::new(
                    reader
                        .into_samples::<i32>()
                        .map(move |s| s.map(|v| v as f64 * scale)),
                )
            }
        };

        Ok(Self {
            samples,
            channels,
            sample_rate: spec.sample_rate,
            duration_frames,
            frame_buf: vec![0.0; channels],
            frames_read: 0,
            finished: false,
            decode_failed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count declared by the file (before stereo mapping).
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total frames declared by the header.
    pub fn duration_frames(&self) -> u32 {
        self.duration_frames
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// `true` if the stream ended early because a sample failed to decode.
    pub fn decode_failed(&self) -> bool {
        self.decode_failed.load(Ordering::Acquire)
    }

    /// Shared handle to the decode-failure flag, readable after the source
    /// has been moved into a pipeline.
    pub fn failure_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.decode_failed)
    }

    /// Decode the next whole frame, or `None` at end of data.
    fn next_frame(&mut self) -> Option<StereoFrame> {
        for slot in 0..self.channels {
            match self.samples.next() {
                Some(Ok(sample)) => self.frame_buf[slot] = sample,
                Some(Err(e)) => {
                    error!(frames_read = self.frames_read, "wav decode error: {e}");
                    self.decode_failed.store(true, Ordering::Release);
                    return None;
                }
                None => return None,
            }
        }
        let left = self.frame_buf[0];
        let right = if self.channels > 1 {
            self.frame_buf[1]
        } else {
            left
        };
        Some(StereoFrame::new(left, right))
    }
}

impl Stream for WavSource {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        if self.finished {
            return (0, false);
        }
        let mut n = 0;
        while n < frames.len() {
            match self.next_frame() {
                Some(frame) => {
                    frames[n] = frame;
                    n += 1;
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        self.frames_read += n as u64;
        if n == 0 && self.finished {
            return (0, false);
        }
        (n, true)
    }
}
