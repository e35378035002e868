//! Audio I/O glue: a WAV producer and a cpal output consumer.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread. It is the consumer
//! that drives the whole pipeline: each callback pulls as many frames as the
//! device asked for, straight through the adapter and filter. Nothing in the
//! pull path blocks or locks, and the callback's scratch buffer is allocated
//! before the stream starts.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioPlayback` must therefore be created and dropped on the same
//! thread; the source it plays is moved into the callback.

pub mod device;
pub mod wav;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig,
};

use crate::{
    buffering::{StereoFrame, Stream},
    error::{FirStreamError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

#[cfg(feature = "audio-cpal")]
use self::device::device_name_matches;

/// Handle to an active audio output stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Dropping the handle stops playback.
pub struct AudioPlayback {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: cpal::Stream,
    /// Set by the cpal error callback.
    failed: Arc<AtomicBool>,
    /// Sample rate the output stream was built with (Hz).
    pub sample_rate: u32,
    /// Channel count of the output device.
    pub channels: u16,
}

impl AudioPlayback {
    /// Open an output device by preferred name, otherwise fall back to the
    /// default output device and then the first available device, and start
    /// pulling frames from `source` at `sample_rate`.
    ///
    /// # Errors
    /// `FirStreamError::NoDefaultOutputDevice` when no device exists,
    /// `FirStreamError::AudioDevice` / `FirStreamError::AudioStream` when
    /// cpal cannot configure, build or start the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference<S: Stream + 'static>(
        source: S,
        sample_rate: u32,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred_name) = preferred_device_name {
            match host.output_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| device_name_matches(&name, preferred_name))
                            .unwrap_or(false)
                    });

                    if selected_device.is_none() {
                        warn!(
                            "preferred output device '{}' not found, falling back",
                            preferred_name
                        );
                    }
                }
                Err(e) => {
                    warn!("failed to list output devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected_device {
            device
        } else if let Some(default) = host.default_output_device() {
            default
        } else {
            let mut devices = host
                .output_devices()
                .map_err(|e| FirStreamError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(FirStreamError::NoDefaultOutputDevice)?;
            warn!("no default output device, falling back to first available output");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );

        let supported = device
            .default_output_config()
            .map_err(|e| FirStreamError::AudioDevice(e.to_string()))?;

        let channels = supported.channels();
        if supported.sample_rate().0 != sample_rate {
            warn!(
                device_rate = supported.sample_rate().0,
                sample_rate, "device default rate differs from source; requesting source rate"
            );
        }
        if channels < 2 {
            warn!(channels, "output device is not stereo; downmixing");
        }

        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let failed = Arc::new(AtomicBool::new(false));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_output::<f32, S>(&device, &config, source, &failed),
            SampleFormat::I16 => build_output::<i16, S>(&device, &config, source, &failed),
            SampleFormat::U16 => build_output::<u16, S>(&device, &config, source, &failed),
            fmt => {
                return Err(FirStreamError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| FirStreamError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            failed,
            sample_rate,
            channels,
        })
    }

    /// `true` once the device reported a stream error.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioPlayback {
    pub fn open_with_preference<S: Stream + 'static>(
        _source: S,
        _sample_rate: u32,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(FirStreamError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

/// Frames pre-allocated for the output callback's scratch buffer.
#[cfg(feature = "audio-cpal")]
const CALLBACK_FRAMES_HINT: usize = 8192;

#[cfg(feature = "audio-cpal")]
fn scratch_capacity(buffer_size: &cpal::BufferSize) -> usize {
    match buffer_size {
        cpal::BufferSize::Fixed(frames) => (*frames as usize).max(CALLBACK_FRAMES_HINT),
        cpal::BufferSize::Default => CALLBACK_FRAMES_HINT,
    }
}

#[cfg(feature = "audio-cpal")]
fn build_output<T, S>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut source: S,
    failed: &Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
    S: Stream + 'static,
{
    let channels = usize::from(config.channels.max(1));
    let mut scratch = vec![StereoFrame::SILENCE; scratch_capacity(&config.buffer_size)];
    let mut exhausted = false;
    let failed = Arc::clone(failed);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if scratch.len() < frames {
                    // Only hit when the device asks for more than the hint.
                    scratch.resize(frames, StereoFrame::SILENCE);
                }
                let filled = pull_frames(&mut source, &mut scratch[..frames], &mut exhausted);
                scratch[filled..frames].fill(StereoFrame::SILENCE);

                for (out, frame) in data.chunks_mut(channels).zip(&scratch[..frames]) {
                    write_frame(out, frame);
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| FirStreamError::AudioStream(e.to_string()))
}

/// Fill `buf` from `source` until it is full or the source is exhausted.
/// Returns the number of frames written.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
fn pull_frames<S: Stream + ?Sized>(
    source: &mut S,
    buf: &mut [StereoFrame],
    exhausted: &mut bool,
) -> usize {
    let mut filled = 0;
    while !*exhausted && filled < buf.len() {
        let (n, more) = source.read(&mut buf[filled..]);
        filled += n;
        if !more {
            *exhausted = true;
        }
        if n == 0 {
            break;
        }
    }
    filled
}

/// Write one frame into a device frame of any width: L/R into the first two
/// channels (silence beyond), or their mean on a mono device.
#[cfg(feature = "audio-cpal")]
fn write_frame<T: SizedSample + FromSample<f32>>(out: &mut [T], frame: &StereoFrame) {
    match out.len() {
        0 => {}
        1 => out[0] = T::from_sample(((frame.left + frame.right) * 0.5) as f32),
        _ => {
            out[0] = T::from_sample(frame.left as f32);
            out[1] = T::from_sample(frame.right as f32);
            for extra in &mut out[2..] {
                *extra = T::from_sample(0.0f32);
            }
        }
    }
}
