//! # firstream-core
//!
//! Block-buffered FIR low-pass filtering for pull-based stereo streams.
//!
//! ## Architecture
//!
//! ```text
//! AudioPlayback (cpal callback) ──read(R)──► Pipeline
//!                                               │
//!                                     ChunkAdapter(size = N)
//!                                               │ read(N)
//!                                     ConvolutionFilter(Kernel)
//!                                               │ read(≤ N)
//!                                        WavSource / any Stream
//! ```
//!
//! The consumer's thread drives everything synchronously; the core never
//! blocks, sleeps or locks. When the producer runs dry the pipeline
//! fulfils a one-shot [`Completion`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod filter;

// Convenience re-exports for downstream crates
pub use audio::{wav::WavSource, AudioPlayback};
pub use buffering::{ChunkAdapter, StereoFrame, Stream, StreamFn, VecStream};
pub use engine::{
    pipeline::{Completion, DiagnosticsSnapshot, Pipeline, PipelineDiagnostics},
    EngineConfig,
};
pub use error::FirStreamError;
pub use filter::{ConvolutionFilter, FilterStrength, Kernel};
