#![allow(dead_code)]

use std::f32::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};
use voxstretch::{SamplePipe, StreamProcessor, StretchError};

pub fn gen_sine<F>(freq_hz: f32, sr: u32, n: usize, amp_fn: F) -> Vec<f32>
where
    F: Fn(usize) -> f32,
{
    (0..n)
        .map(|i| {
            let phase = 2.0 * PI * freq_hz * i as f32 / sr as f32;
            amp_fn(i) * phase.sin()
        })
        .collect()
}

/// Deterministic noise in [-0.5, 0.5) from a linear congruential generator.
pub fn gen_noise(n: usize, seed: u32) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
        })
        .collect()
}

pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * channels.len());
    for i in 0..frames {
        for ch in channels {
            out.push(ch[i]);
        }
    }
    out
}

pub fn channel(interleaved: &[f32], channels: usize, index: usize) -> Vec<f32> {
    interleaved
        .iter()
        .skip(index)
        .step_by(channels)
        .copied()
        .collect()
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    if signal.is_empty() || len == 0 {
        return 0.0;
    }
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    let sum_sq: f64 = signal[start..end]
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    (sum_sq / (end - start) as f64).sqrt()
}

pub fn count_positive_zero_crossings(signal: &[f32], start: usize, end: usize) -> usize {
    if signal.len() < 2 {
        return 0;
    }
    let start = start.min(signal.len() - 1);
    let end = end.min(signal.len());
    if end <= start + 1 {
        return 0;
    }
    (start..end - 1)
        .filter(|&i| signal[i] <= 0.0 && signal[i + 1] > 0.0)
        .count()
}

pub fn estimate_freq_zero_crossings(signal: &[f32], sr: u32, start: usize, end: usize) -> f64 {
    if end <= start + 1 {
        return 0.0;
    }
    let crossings = count_positive_zero_crossings(signal, start, end) as f64;
    let duration_secs = (end - start) as f64 / sr as f64;
    if duration_secs <= 0.0 {
        0.0
    } else {
        crossings / duration_secs
    }
}

/// Magnitude in dB of the Hann-windowed FFT bin nearest `freq_hz`, taking
/// the strongest of the neighbouring bins to absorb leakage.
pub fn spectrum_level_db(signal: &[f32], sr: u32, freq_hz: f32) -> f64 {
    let n = signal.len().next_power_of_two() / 2;
    assert!(n >= 1024, "signal too short for spectral analysis");
    let start = (signal.len() - n) / 2;

    let mut buf: Vec<Complex<f64>> = signal[start..start + n]
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos();
            Complex::new(s as f64 * w, 0.0)
        })
        .collect();
    FftPlanner::new().plan_fft_forward(n).process(&mut buf);

    let bin = (freq_hz as f64 * n as f64 / sr as f64).round() as usize;
    let lo = bin.saturating_sub(2);
    let hi = (bin + 2).min(n / 2);
    let peak = buf[lo..=hi]
        .iter()
        .map(|c| c.norm())
        .fold(0.0f64, f64::max);
    20.0 * (peak / n as f64 + 1e-12).log10()
}

/// Pushes `input` in chunks, flushes and collects all output.
pub fn run_streaming(
    proc: &mut StreamProcessor<f32>,
    input: &[f32],
    chunk_frames: usize,
) -> Result<Vec<f32>, StretchError> {
    let channels = proc.channels();
    let mut output = Vec::new();
    let mut scratch = vec![0.0f32; 4096 * channels];
    for chunk in input.chunks(chunk_frames.max(1) * channels) {
        proc.put_samples(chunk)?;
        drain_into(proc, &mut scratch, &mut output);
    }
    proc.flush()?;
    drain_into(proc, &mut scratch, &mut output);
    Ok(output)
}

pub fn drain_into(proc: &mut StreamProcessor<f32>, scratch: &mut [f32], output: &mut Vec<f32>) {
    let channels = proc.channels();
    loop {
        let n = proc.receive_samples(scratch, scratch.len() / channels);
        if n == 0 {
            break;
        }
        output.extend_from_slice(&scratch[..n * channels]);
    }
}

pub fn configured(sample_rate: u32, channels: usize) -> StreamProcessor<f32> {
    let mut proc = StreamProcessor::<f32>::new();
    proc.set_sample_rate(sample_rate).unwrap();
    proc.set_channels(channels).unwrap();
    proc
}
