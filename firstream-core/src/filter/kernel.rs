//! Exponential-decay FIR kernel generator.
//!
//! ## Algorithm
//!
//! 1. For each tap `i` in `0..length`, `w[i] = exp(-decay_rate * i)`.
//! 2. Divide every tap by `Σ w`, so the kernel has unity DC gain.
//!
//! A small decay spreads energy over many taps (heavy smoothing, low
//! cutoff); a large decay piles it onto tap 0 (close to pass-through).

use serde::{Deserialize, Serialize};

use crate::error::{FirStreamError, Result};

/// A normalized FIR impulse response. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Vec<f64>,
    decay_rate: f64,
}

impl Kernel {
    /// Build a `length`-tap exponential-decay kernel.
    ///
    /// # Errors
    /// `FirStreamError::InvalidKernelParameters` when `length == 0` or
    /// `decay_rate` is not a positive finite number.
    pub fn generate(length: usize, decay_rate: f64) -> Result<Self> {
        if length == 0 || !decay_rate.is_finite() || decay_rate <= 0.0 {
            return Err(FirStreamError::InvalidKernelParameters { length, decay_rate });
        }

        let mut weights: Vec<f64> = (0..length)
            .map(|i| (-decay_rate * i as f64).exp())
            .collect();
        // w[0] == 1.0, so the sum is never zero.
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        Ok(Self {
            weights,
            decay_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always `false`: generation rejects zero-length kernels.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    /// Weight centroid `Σ i·w[i]` in samples.
    pub fn group_delay(&self) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .map(|(i, w)| i as f64 * w)
            .sum()
    }
}

/// Reference decay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStrength {
    /// Nearly all energy on tap 0; a gentle top-end roll-off.
    Light,
    /// Energy spread over roughly ten taps; heavy smoothing.
    Strong,
}

impl FilterStrength {
    pub fn decay_rate(self) -> f64 {
        match self {
            FilterStrength::Light => 25.0,
            FilterStrength::Strong => 0.1,
        }
    }

    /// Case-insensitive name lookup (`"light"`, `"strong"`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(FilterStrength::Light),
            "strong" => Some(FilterStrength::Strong),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterStrength::Light => "light",
            FilterStrength::Strong => "strong",
        }
    }
}
