//! FIR low-pass filtering.
//!
//! [`kernel`] builds the impulse response; [`convolution`] applies it to a
//! stream one fixed-size block at a time, carrying the convolution tail
//! across block boundaries (overlap-add).

pub mod convolution;
pub mod kernel;

pub use convolution::ConvolutionFilter;
pub use kernel::{FilterStrength, Kernel};

/// Direct (time-domain) full linear convolution of `input` with `kernel`.
///
/// Writes `input.len() + kernel.len() - 1` samples into the front of `out`,
/// overwriting whatever was there. O(N·L); for a 64-tap kernel this beats an
/// FFT round trip.
pub fn convolve(input: &[f64], kernel: &[f64], out: &mut [f64]) {
    if input.is_empty() || kernel.is_empty() {
        return;
    }
    let len = input.len() + kernel.len() - 1;
    debug_assert!(out.len() >= len, "convolution output too short");

    let out = &mut out[..len];
    out.fill(0.0);
    for (i, &x) in input.iter().enumerate() {
        for (o, &k) in out[i..i + kernel.len()].iter_mut().zip(kernel) {
            *o += x * k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convolve_matches_hand_computed_result() {
        let mut out = [9.0; 4];
        convolve(&[1.0, 2.0], &[0.5, 0.25, 0.25], &mut out);
        assert_eq!(out, [0.5, 1.25, 0.75, 0.5]);
    }

    #[test]
    fn convolve_leaves_extra_output_untouched() {
        let mut out = [7.0; 5];
        convolve(&[1.0], &[0.5, 0.5], &mut out);
        assert_eq!(out, [0.5, 0.5, 7.0, 7.0, 7.0]);
    }
}
