//! Block convolution filter with overlap-add continuity.
//!
//! ## Per block, per channel
//!
//! ```text
//! 1. in[0..N]            ← channel samples of the block
//! 2. out[0..N+L-1]       ← in * kernel            (direct convolution)
//! 3. out[0..L-1]        += tail                   (previous block's spill)
//! 4. block               ← out[0..N]
//! 5. tail                ← out[N..N+L-1]
//! ```
//!
//! Chained over consecutive blocks this equals filtering the whole unbounded
//! stream sample by sample. The output lags the input by the kernel's group
//! delay. There is no flush: whatever is still in the tail when upstream ends
//! is dropped.
//!
//! Every call must pass exactly `block_size` frames. Anything else would
//! shift the tail against the next block, so it is a contract violation:
//! [`ConvolutionFilter::try_read`] reports it as
//! [`FirStreamError::InvalidBlockSize`] and the [`Stream`] impl panics.

use std::sync::Arc;

use tracing::debug;

use super::{convolve, Kernel};
use crate::buffering::{StereoFrame, Stream, CHANNELS};
use crate::error::{FirStreamError, Result};

/// Applies a [`Kernel`] to an upstream stream in fixed-size blocks.
pub struct ConvolutionFilter<S> {
    upstream: S,
    kernel: Arc<Kernel>,
    block_size: usize,
    /// Upstream frames of the block being assembled.
    pending: Vec<StereoFrame>,
    pending_len: usize,
    /// One channel of the current block (length `block_size`).
    scratch_in: Vec<f64>,
    /// Full convolution of `scratch_in` (length `block_size + L - 1`).
    scratch_out: Vec<f64>,
    /// Convolution spill carried into the next block, per channel (length `L - 1`).
    tails: [Vec<f64>; CHANNELS],
    upstream_done: bool,
    blocks_processed: u64,
    frames_processed: u64,
}

impl<S: Stream> ConvolutionFilter<S> {
    /// # Errors
    /// `FirStreamError::ZeroBlockSize` when `block_size == 0`.
    pub fn new(upstream: S, kernel: Arc<Kernel>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(FirStreamError::ZeroBlockSize);
        }
        let taps = kernel.len();
        let spill = taps.saturating_sub(1);

        debug!(block_size, taps, "convolution filter created");

        Ok(Self {
            upstream,
            kernel,
            block_size,
            pending: vec![StereoFrame::SILENCE; block_size],
            pending_len: 0,
            scratch_in: vec![0.0; block_size],
            scratch_out: vec![0.0; block_size + spill],
            tails: [vec![0.0; spill], vec![0.0; spill]],
            upstream_done: false,
            blocks_processed: 0,
            frames_processed: 0,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Blocks convolved so far.
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    /// Upstream frames that went through the filter (zero padding excluded).
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Current tail for `channel` (0 = left, 1 = right).
    pub fn tail(&self, channel: usize) -> &[f64] {
        &self.tails[channel]
    }

    /// Upstream frames held for a block that is not complete yet.
    pub fn pending(&self) -> usize {
        self.pending_len
    }

    /// Pull one block from upstream and filter it into `frames`.
    ///
    /// Upstream is read until the block is full, it reports exhaustion, or it
    /// has nothing ready. In the last case the frames gathered so far stay
    /// pending and `(0, true)` is returned; the next call resumes the same
    /// block. A final short block is zero-padded before convolution; only the
    /// produced frame count is reported.
    ///
    /// # Errors
    /// `FirStreamError::InvalidBlockSize` if `frames.len() != block_size`.
    pub fn try_read(&mut self, frames: &mut [StereoFrame]) -> Result<(usize, bool)> {
        if frames.len() != self.block_size {
            return Err(FirStreamError::InvalidBlockSize {
                expected: self.block_size,
                actual: frames.len(),
            });
        }

        while !self.upstream_done && self.pending_len < self.block_size {
            let (nn, more) = self.upstream.read(&mut self.pending[self.pending_len..]);
            self.pending_len += nn;
            if !more {
                self.upstream_done = true;
            } else if nn == 0 {
                return Ok((0, true));
            }
        }

        let n = self.pending_len;
        if n == 0 {
            return Ok((0, false));
        }
        frames[..n].copy_from_slice(&self.pending[..n]);
        if n < self.block_size {
            debug!(produced = n, block_size = self.block_size, "zero-padding final block");
            frames[n..].fill(StereoFrame::SILENCE);
        }
        self.pending_len = 0;

        self.filter_block(frames);
        self.blocks_processed += 1;
        self.frames_processed += n as u64;

        Ok((n, true))
    }

    fn filter_block(&mut self, frames: &mut [StereoFrame]) {
        let n = self.block_size;
        for channel in 0..CHANNELS {
            for (dst, frame) in self.scratch_in.iter_mut().zip(frames.iter()) {
                *dst = frame.channel(channel);
            }

            convolve(&self.scratch_in, self.kernel.weights(), &mut self.scratch_out);

            let tail = &mut self.tails[channel];
            for (out, spill) in self.scratch_out.iter_mut().zip(tail.iter()) {
                *out += *spill;
            }
            for (frame, &out) in frames.iter_mut().zip(&self.scratch_out[..n]) {
                frame.set_channel(channel, out);
            }
            // When L-1 <= N the tail-add above never reaches index N, so this
            // is the spill of this block's convolution alone.
            tail.copy_from_slice(&self.scratch_out[n..]);
        }
    }
}

impl<S: Stream> Stream for ConvolutionFilter<S> {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        match self.try_read(frames) {
            Ok(result) => result,
            Err(e) => panic!("{e}"),
        }
    }
}
