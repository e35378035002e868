//! Stereo frames and the pull-based stream capability shared by every stage.
//!
//! A [`Stream`] fills a caller-provided frame slice and reports how many
//! frames it produced and whether more will follow. `more == false` is
//! terminal: no later read will ever produce frames again.

pub mod chunk;

pub use chunk::ChunkAdapter;

/// One sample each for the left and right channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f64,
    pub right: f64,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Same sample on both channels.
    pub const fn mono(sample: f64) -> Self {
        Self {
            left: sample,
            right: sample,
        }
    }

    /// Sample for channel `0` (left) or `1` (right).
    #[inline]
    pub fn channel(&self, channel: usize) -> f64 {
        if channel == 0 {
            self.left
        } else {
            self.right
        }
    }

    #[inline]
    pub fn set_channel(&mut self, channel: usize, value: f64) {
        if channel == 0 {
            self.left = value;
        } else {
            self.right = value;
        }
    }
}

/// Number of channels carried by a [`StereoFrame`].
pub const CHANNELS: usize = 2;

/// Pull-based source of stereo frames.
///
/// `read` fills up to `frames.len()` frames starting at index 0 and returns
/// `(produced, more)`. Implementors must keep returning `(0, false)` once they
/// have reported exhaustion. A stream with nothing ready may return
/// `(0, true)`; callers retry later and stages that need whole blocks hold
/// partial input until the rest arrives.
pub trait Stream: Send {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool);
}

impl<S: Stream + ?Sized> Stream for &mut S {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        (**self).read(frames)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        (**self).read(frames)
    }
}

/// Adapts a closure into a [`Stream`].
pub struct StreamFn<F>(pub F);

impl<F> Stream for StreamFn<F>
where
    F: FnMut(&mut [StereoFrame]) -> (usize, bool) + Send,
{
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        (self.0)(frames)
    }
}

/// In-memory producer over a fixed frame sequence.
///
/// `with_max_read` caps how many frames a single read hands out, which is
/// handy for exercising consumers against short reads.
#[derive(Debug, Clone)]
pub struct VecStream {
    frames: Vec<StereoFrame>,
    pos: usize,
    max_read: usize,
}

impl VecStream {
    pub fn new(frames: Vec<StereoFrame>) -> Self {
        Self {
            frames,
            pos: 0,
            max_read: usize::MAX,
        }
    }

    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.frames.len() - self.pos
    }
}

impl Stream for VecStream {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        if self.remaining() == 0 {
            return (0, false);
        }
        let n = frames.len().min(self.remaining()).min(self.max_read);
        frames[..n].copy_from_slice(&self.frames[self.pos..self.pos + n]);
        self.pos += n;
        (n, true)
    }
}
