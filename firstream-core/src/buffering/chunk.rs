//! Re-buffers arbitrary-length reads into fixed-size pulls.
//!
//! ## Invariant
//!
//! A new `size`-frame pull from the wrapped stream is issued only once the
//! leftover buffer is fully drained. Requests of at least `size` frames are
//! served by pulling straight into the caller's slice; shorter tails are
//! served by pulling one whole block into the leftover buffer and handing out
//! the part that fits.
//!
//! ```text
//! caller: |--- 700 ---|                 |-- 200 --|
//! pulls:  [512 direct][512 → leftover]  (drain 324 leftover)
//!                      188 out, 324 kept
//! ```

use tracing::debug;

use super::{StereoFrame, Stream};
use crate::error::{FirStreamError, Result};

/// Wraps a stream that must always be read in blocks of exactly `size` frames.
pub struct ChunkAdapter<S> {
    wrapped: S,
    size: usize,
    /// Backing storage for the leftover buffer (length `size`).
    buf: Vec<StereoFrame>,
    /// Leftover frames live in `buf[pos..end]`.
    pos: usize,
    end: usize,
    /// Set once the wrapped stream has returned `more == false`.
    exhausted: bool,
}

impl<S: Stream> ChunkAdapter<S> {
    /// # Errors
    /// `FirStreamError::ZeroBlockSize` when `size == 0`.
    pub fn new(wrapped: S, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(FirStreamError::ZeroBlockSize);
        }
        Ok(Self {
            wrapped,
            size,
            buf: vec![StereoFrame::SILENCE; size],
            pos: 0,
            end: 0,
            exhausted: false,
        })
    }

    pub fn block_size(&self) -> usize {
        self.size
    }

    /// Frames currently held in the leftover buffer.
    pub fn buffered(&self) -> usize {
        self.end - self.pos
    }

    pub fn get_ref(&self) -> &S {
        &self.wrapped
    }

    /// Copy leftover frames into `dst`, returning how many were moved.
    fn drain_leftover(&mut self, dst: &mut [StereoFrame]) -> usize {
        let n = self.buffered().min(dst.len());
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        if self.pos == self.end {
            self.pos = 0;
            self.end = 0;
        }
        n
    }
}

impl<S: Stream> Stream for ChunkAdapter<S> {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        if frames.is_empty() {
            return (0, true);
        }

        let mut n = self.drain_leftover(frames);

        while n < frames.len() {
            if self.exhausted {
                break;
            }
            debug_assert_eq!(self.buffered(), 0, "pull issued with leftover frames");

            let remaining = frames.len() - n;
            if remaining >= self.size {
                let (nn, more) = self.wrapped.read(&mut frames[n..n + self.size]);
                n += nn;
                if !more {
                    self.exhausted = true;
                    break;
                }
                if nn == 0 {
                    break;
                }
            } else {
                let (nn, more) = self.wrapped.read(&mut self.buf);
                if !more {
                    self.exhausted = true;
                }
                if nn == 0 {
                    break;
                }
                self.pos = 0;
                self.end = nn;
                n += self.drain_leftover(&mut frames[n..]);
                debug!(
                    delivered = nn.min(remaining),
                    kept = self.buffered(),
                    "partial block buffered"
                );
            }
        }

        (n, n > 0 || !self.exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::StreamFn;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Producer yielding `total` frames numbered from zero, enforcing `size`-frame reads.
    fn counting_source(
        total: usize,
        size: usize,
        pulls: Arc<AtomicUsize>,
    ) -> impl Stream {
        let mut next = 0usize;
        StreamFn(move |frames: &mut [StereoFrame]| {
            assert_eq!(frames.len(), size, "wrapped stream read with wrong length");
            pulls.fetch_add(1, Ordering::Relaxed);
            if next == total {
                return (0, false);
            }
            let n = (total - next).min(size);
            for (i, frame) in frames.iter_mut().take(n).enumerate() {
                *frame = StereoFrame::mono((next + i) as f64);
            }
            next += n;
            (n, true)
        })
    }

    fn collect(adapter: &mut impl Stream, requests: &[usize]) -> Vec<(usize, bool, Vec<f64>)> {
        requests
            .iter()
            .map(|&len| {
                let mut buf = vec![StereoFrame::SILENCE; len];
                let (n, more) = adapter.read(&mut buf);
                (n, more, buf[..n].iter().map(|f| f.left).collect())
            })
            .collect()
    }

    #[test]
    fn zero_size_is_rejected() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let err = ChunkAdapter::new(counting_source(8, 4, pulls), 0).err();
        assert!(matches!(err, Some(FirStreamError::ZeroBlockSize)));
    }

    #[test]
    fn empty_request_never_pulls() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter = ChunkAdapter::new(counting_source(8, 4, Arc::clone(&pulls)), 4).unwrap();

        assert_eq!(adapter.read(&mut []), (0, true));
        assert_eq!(pulls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn exact_block_request_bypasses_leftover() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter = ChunkAdapter::new(counting_source(8, 4, Arc::clone(&pulls)), 4).unwrap();

        let out = collect(&mut adapter, &[4, 4]);
        assert_eq!(out[0], (4, true, vec![0.0, 1.0, 2.0, 3.0]));
        assert_eq!(out[1], (4, true, vec![4.0, 5.0, 6.0, 7.0]));
        assert_eq!(adapter.buffered(), 0);
        assert_eq!(pulls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn short_requests_are_served_from_leftover() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter = ChunkAdapter::new(counting_source(8, 4, Arc::clone(&pulls)), 4).unwrap();

        let out = collect(&mut adapter, &[3, 1, 2]);
        assert_eq!(out[0], (3, true, vec![0.0, 1.0, 2.0]));
        assert_eq!(out[1], (1, true, vec![3.0]));
        assert_eq!(out[2], (2, true, vec![4.0, 5.0]));
        assert_eq!(adapter.buffered(), 2);
        // One pull per block; the drain of frame 3 touched nothing.
        assert_eq!(pulls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn long_request_mixes_direct_pulls_and_leftover() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter =
            ChunkAdapter::new(counting_source(16, 4, Arc::clone(&pulls)), 4).unwrap();

        let out = collect(&mut adapter, &[10, 3]);
        assert_eq!(out[0].0, 10);
        assert_eq!(out[0].2, (0..10).map(|i| i as f64).collect::<Vec<_>>());
        assert_eq!(out[1], (3, true, vec![10.0, 11.0, 12.0]));
        assert_eq!(adapter.buffered(), 3);
        assert_eq!(pulls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn partial_final_block_is_delivered_before_exhaustion() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter = ChunkAdapter::new(counting_source(6, 4, pulls), 4).unwrap();

        let out = collect(&mut adapter, &[5, 5, 5]);
        assert_eq!(out[0], (5, true, vec![0.0, 1.0, 2.0, 3.0, 4.0]));
        assert_eq!(out[1], (1, true, vec![5.0]));
        assert_eq!(out[2], (0, false, vec![]));
    }

    #[test]
    fn exhaustion_is_sticky() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut adapter =
            ChunkAdapter::new(counting_source(4, 4, Arc::clone(&pulls)), 4).unwrap();

        let out = collect(&mut adapter, &[4, 4, 2]);
        assert_eq!(out[0].0, 4);
        assert_eq!((out[1].0, out[1].1), (0, false));
        assert_eq!((out[2].0, out[2].1), (0, false));
        assert_eq!(pulls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn idle_wrapped_stream_does_not_spin() {
        let mut adapter =
            ChunkAdapter::new(StreamFn(|_: &mut [StereoFrame]| (0, true)), 4).unwrap();

        let mut buf = [StereoFrame::SILENCE; 9];
        assert_eq!(adapter.read(&mut buf), (0, true));
        assert_eq!(adapter.read(&mut buf[..2]), (0, true));
    }
}
