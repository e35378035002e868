//! Producer → ChunkAdapter(ConvolutionFilter) composition with a one-shot
//! completion signal.
//!
//! [`Pipeline`] is itself a [`Stream`]: the consumer (an output device
//! callback, a test loop) pulls any number of frames per call. The first
//! read that comes back `(0, false)` fulfils the [`Completion`] returned by
//! [`Pipeline::new`]; later reads keep returning `(0, false)` without
//! signalling again.

use std::future::Future;
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{
    buffering::{ChunkAdapter, StereoFrame, Stream},
    engine::EngineConfig,
    error::{FirStreamError, Result},
    filter::{ConvolutionFilter, Kernel},
};

/// Counters shared between the pulling thread and observers.
pub struct PipelineDiagnostics {
    pub reads: AtomicUsize,
    pub frames_out: AtomicU64,
    pub blocks_filtered: AtomicU64,
    pub frames_filtered: AtomicU64,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            reads: AtomicUsize::new(0),
            frames_out: AtomicU64::new(0),
            blocks_filtered: AtomicU64::new(0),
            frames_filtered: AtomicU64::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.frames_out.store(0, Ordering::Relaxed);
        self.blocks_filtered.store(0, Ordering::Relaxed);
        self.frames_filtered.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            blocks_filtered: self.blocks_filtered.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub reads: usize,
    pub frames_out: u64,
    pub blocks_filtered: u64,
    pub frames_filtered: u64,
}

/// Resolves once the pipeline has delivered its last frame.
///
/// Await it from async code, or use [`Completion::wait`] /
/// [`Completion::try_wait`] from a plain thread. Resolves to
/// `FirStreamError::PipelineDropped` if the pipeline goes away first.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<()>,
    /// Cached outcome once observed, so repeated polls agree.
    outcome: Option<bool>,
}

impl Completion {
    fn record(&mut self, completed: bool) {
        self.outcome = Some(completed);
        if completed {
            info!("pipeline completed");
        } else {
            warn!("pipeline dropped before completing");
        }
    }

    fn outcome_to_result(completed: bool) -> Result<()> {
        if completed {
            Ok(())
        } else {
            Err(FirStreamError::PipelineDropped)
        }
    }

    /// Block the current thread until the pipeline completes.
    ///
    /// # Panics
    /// When called from inside an async runtime; `.await` instead.
    pub fn wait(mut self) -> Result<()> {
        if let Some(completed) = self.outcome {
            return Self::outcome_to_result(completed);
        }
        let rx = std::mem::replace(&mut self.rx, oneshot::channel().1);
        let completed = rx.blocking_recv().is_ok();
        self.record(completed);
        Self::outcome_to_result(completed)
    }

    /// Non-blocking check. `None` while frames are still flowing.
    pub fn try_wait(&mut self) -> Option<Result<()>> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(()) => self.record(true),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => self.record(false),
            }
        }
        self.outcome.map(Self::outcome_to_result)
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(completed) = self.outcome {
            return Poll::Ready(Self::outcome_to_result(completed));
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(res) => {
                let completed = res.is_ok();
                self.record(completed);
                Poll::Ready(Self::outcome_to_result(completed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// The composed filter stage.
pub struct Pipeline<P> {
    adapter: ChunkAdapter<ConvolutionFilter<P>>,
    /// Taken on the first exhausted read.
    completion_tx: Option<oneshot::Sender<()>>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl<P: Stream> Pipeline<P> {
    /// Wrap `producer` in a `block_size` adapter and filter.
    ///
    /// # Errors
    /// `FirStreamError::ZeroBlockSize` when `block_size == 0`.
    pub fn new(producer: P, kernel: Arc<Kernel>, block_size: usize) -> Result<(Self, Completion)> {
        let taps = kernel.len();
        let decay_rate = kernel.decay_rate();
        let filter = ConvolutionFilter::new(producer, kernel, block_size)?;
        let adapter = ChunkAdapter::new(filter, block_size)?;
        let (tx, rx) = oneshot::channel();

        info!(block_size, taps, decay_rate, "pipeline created");

        Ok((
            Self {
                adapter,
                completion_tx: Some(tx),
                diagnostics: Arc::new(PipelineDiagnostics::default()),
            },
            Completion { rx, outcome: None },
        ))
    }

    /// Validate `config`, generate its kernel and build the pipeline.
    pub fn from_config(producer: P, config: &EngineConfig) -> Result<(Self, Completion)> {
        config.validate()?;
        Self::new(producer, config.kernel()?, config.block_size)
    }

    /// `true` once the completion has been signalled.
    pub fn is_finished(&self) -> bool {
        self.completion_tx.is_none()
    }

    pub fn block_size(&self) -> usize {
        self.adapter.block_size()
    }

    pub fn kernel(&self) -> &Kernel {
        self.adapter.get_ref().kernel()
    }

    pub fn diagnostics(&self) -> Arc<PipelineDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    fn signal_completion(&mut self) {
        // Runs on the consumer's thread, possibly an audio callback: no logging.
        if let Some(tx) = self.completion_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl<P: Stream> Stream for Pipeline<P> {
    fn read(&mut self, frames: &mut [StereoFrame]) -> (usize, bool) {
        let (n, more) = self.adapter.read(frames);

        let filter = self.adapter.get_ref();
        self.diagnostics.reads.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .frames_out
            .fetch_add(n as u64, Ordering::Relaxed);
        self.diagnostics
            .blocks_filtered
            .store(filter.blocks_processed(), Ordering::Relaxed);
        self.diagnostics
            .frames_filtered
            .store(filter.frames_processed(), Ordering::Relaxed);

        if !more {
            self.signal_completion();
        }
        (n, more)
    }
}
