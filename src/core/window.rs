//! Window and kernel shapes used for filter design.

use std::f64::consts::PI;

/// Hamming window coefficients.
const HAMMING_A0: f64 = 0.54;
const HAMMING_A1: f64 = 0.46;

/// Generates a Hamming window of `size` taps centred on tap `size / 2`.
///
/// Tap `i` sits at offset `i - size / 2` from the centre, so the peak value of
/// 1.0 lands on the centre tap for both even and odd sizes.
pub fn hamming_centered(size: usize) -> Vec<f64> {
    if size == 0 {
        return vec![];
    }
    let step = 2.0 * PI / size as f64;
    let half = (size / 2) as f64;
    (0..size)
        .map(|i| {
            let offset = i as f64 - half;
            HAMMING_A0 + HAMMING_A1 * (step * offset).cos()
        })
        .collect()
}

/// Ideal low-pass impulse response `sin(wc·n) / (wc·n)` sampled at `size`
/// taps centred on tap `size / 2`, with angular cutoff `wc` in radians per
/// sample.
pub fn lowpass_sinc(size: usize, wc: f64) -> Vec<f64> {
    let half = (size / 2) as f64;
    (0..size)
        .map(|i| {
            let x = (i as f64 - half) * wc;
            if x != 0.0 {
                x.sin() / x
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_peak_at_centre() {
        let w = hamming_centered(64);
        assert_eq!(w.len(), 64);
        assert!((w[32] - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.08).abs() < 1e-12, "edge {}", w[0]);
        for (i, &v) in w.iter().enumerate() {
            assert!(v <= w[32] + 1e-12, "tap {} = {} exceeds centre", i, v);
        }
    }

    #[test]
    fn test_hamming_symmetric_about_centre() {
        let w = hamming_centered(32);
        for k in 1..16 {
            assert!((w[16 - k] - w[16 + k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_lowpass_sinc_half_band_zeros() {
        let h = lowpass_sinc(16, PI);
        assert_eq!(h[8], 1.0);
        for (i, &v) in h.iter().enumerate() {
            if i != 8 {
                assert!(v.abs() < 1e-12, "tap {} = {}", i, v);
            }
        }
    }

    #[test]
    fn test_empty() {
        assert!(hamming_centered(0).is_empty());
        assert!(lowpass_sinc(0, 1.0).is_empty());
    }
}
