//! Pipeline configuration and composition.
//!
//! ## Data flow
//!
//! ```text
//! consumer ──read(R)──► ChunkAdapter ──read(N)──► ConvolutionFilter ──read(≤N)──► producer
//!                        (leftover)                 (tails L/R)
//! ```
//!
//! Everything runs synchronously on the consumer's thread. When the adapter
//! first reports exhaustion the pipeline fulfils its [`pipeline::Completion`].

pub mod pipeline;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{FirStreamError, Result},
    filter::{FilterStrength, Kernel},
};

/// Block size used by the reference design (frames per filter invocation).
pub const DEFAULT_BLOCK_SIZE: usize = 512;
/// Kernel length used by the reference design (taps).
pub const DEFAULT_KERNEL_LENGTH: usize = 64;

/// Configuration for a [`pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per filter invocation. Default: 512.
    pub block_size: usize,
    /// FIR kernel taps. Default: 64.
    pub kernel_length: usize,
    /// Exponential decay per tap. Smaller is a stronger low-pass.
    /// Default: 25.0 (the light preset).
    pub decay_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            kernel_length: DEFAULT_KERNEL_LENGTH,
            decay_rate: FilterStrength::Light.decay_rate(),
        }
    }
}

impl EngineConfig {
    pub fn with_strength(strength: FilterStrength) -> Self {
        Self {
            decay_rate: strength.decay_rate(),
            ..Self::default()
        }
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(FirStreamError::ZeroBlockSize);
        }
        if self.kernel_length == 0 || !self.decay_rate.is_finite() || self.decay_rate <= 0.0 {
            return Err(FirStreamError::InvalidKernelParameters {
                length: self.kernel_length,
                decay_rate: self.decay_rate,
            });
        }
        Ok(())
    }

    /// Generate the kernel described by this config.
    pub fn kernel(&self) -> Result<Arc<Kernel>> {
        Kernel::generate(self.kernel_length, self.decay_rate).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_design() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.block_size, 512);
        assert_eq!(cfg.kernel_length, 64);
        assert_eq!(cfg.decay_rate, 25.0);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.kernel().unwrap().len(), 64);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut cfg = EngineConfig::default();
        cfg.block_size = 0;
        assert!(matches!(cfg.validate(), Err(FirStreamError::ZeroBlockSize)));

        let mut cfg = EngineConfig::with_strength(FilterStrength::Strong);
        cfg.decay_rate = -0.5;
        assert!(matches!(
            cfg.validate(),
            Err(FirStreamError::InvalidKernelParameters { length: 64, .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"decayRate": 0.1}"#).unwrap();
        assert_eq!(cfg, EngineConfig::with_strength(FilterStrength::Strong));

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"blockSize\":512"), "{json}");
    }
}
