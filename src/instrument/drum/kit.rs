//! Synthesized drum voices.
//!
//! Each generator produces a mono f32 buffer at the given sample rate.
//! Noise-based generators use a seeded `ChaCha8Rng` so a kit built from the
//! same seed is bit-identical.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::DrumSound;
use crate::beat::SAMPLE_RATE;

pub const DEFAULT_KIT_SEED: u64 = 808;

fn num_samples(sample_rate: u32, seconds: f64) -> usize {
    (sample_rate as f64 * seconds) as usize
}

/// Sine with an exponential pitch sweep from `start_hz` down to `end_hz`.
fn pitched_sweep(
    sample_rate: u32,
    seconds: f64,
    start_hz: f64,
    end_hz: f64,
    sweep: f64,
    decay: f64,
) -> Vec<f32> {
    let n = num_samples(sample_rate, seconds);
    let mut phase = 0.0_f64;
    (0..n)
        .map(|i| {
            let norm = i as f64 / sample_rate as f64 / seconds;
            let freq = end_hz + (start_hz - end_hz) * (-norm * sweep).exp();
            let amp = (-norm * decay).exp();
            phase += freq / sample_rate as f64;
            ((phase * 2.0 * PI).sin() * amp) as f32
        })
        .collect()
}

/// Kick: 150 Hz → 50 Hz sweep, 250 ms.
pub fn generate_kick(sample_rate: u32) -> Vec<f32> {
    pitched_sweep(sample_rate, 0.25, 150.0, 50.0, 8.0, 10.0)
}

/// Snare: 180 Hz body plus a faster-decaying noise burst, 200 ms.
pub fn generate_snare(sample_rate: u32, seed: u64) -> Vec<f32> {
    let seconds = 0.2;
    let n = num_samples(sample_rate, seconds);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut phase = 0.0_f64;

    (0..n)
        .map(|i| {
            let norm = i as f64 / sample_rate as f64 / seconds;
            phase += 180.0 / sample_rate as f64;
            let body = (phase * 2.0 * PI).sin() * (-norm * 15.0).exp();
            let noise: f64 = rng.gen_range(-1.0..1.0) * (-norm * 12.0).exp();
            (body * 0.5 + noise * 0.5) as f32
        })
        .collect()
}

/// High-passed noise with exponential decay. Shared by both hats.
fn metallic_noise(sample_rate: u32, seed: u64, seconds: f64, decay: f64) -> Vec<f32> {
    let n = num_samples(sample_rate, seconds);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let alpha = 0.85;
    let mut prev_in = 0.0_f64;
    let mut prev_out = 0.0_f64;

    (0..n)
        .map(|i| {
            let norm = i as f64 / sample_rate as f64 / seconds;
            let noise: f64 = rng.gen_range(-1.0..1.0);
            // y[n] = a * (y[n-1] + x[n] - x[n-1])
            let filtered = alpha * (prev_out + noise - prev_in);
            prev_in = noise;
            prev_out = filtered;
            (filtered * (-norm * decay).exp() * 0.5) as f32
        })
        .collect()
}

pub fn generate_closed_hat(sample_rate: u32, seed: u64) -> Vec<f32> {
    metallic_noise(sample_rate, seed, 0.08, 20.0)
}

pub fn generate_open_hat(sample_rate: u32, seed: u64) -> Vec<f32> {
    metallic_noise(sample_rate, seed, 0.45, 6.0)
}

/// Clap: three staggered noise bursts followed by a band-limited tail.
pub fn generate_clap(sample_rate: u32, seed: u64) -> Vec<f32> {
    let n = num_samples(sample_rate, 0.15);
    let sr = sample_rate as f64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut output = vec![0.0f32; n];

    let burst_seconds = 0.01;
    for offset in [0.0, 0.015, 0.030] {
        let start = (offset * sr) as usize;
        let end = (((offset + burst_seconds) * sr) as usize).min(n);
        for (i, sample) in output.iter_mut().enumerate().take(end).skip(start) {
            let local = (i - start) as f64 / (burst_seconds * sr);
            let noise: f64 = rng.gen_range(-1.0..1.0);
            *sample += (noise * (-local * 15.0).exp() * 0.7) as f32;
        }
    }

    let tail_start = (0.04 * sr) as usize;
    let coeff = 1200.0 * 0.5 / sr;
    let mut state = 0.0_f64;
    for (i, sample) in output.iter_mut().enumerate().skip(tail_start) {
        let t = (i - tail_start) as f64 / sr;
        let noise: f64 = rng.gen_range(-1.0..1.0);
        state += (noise - state) * coeff;
        *sample += (state * (-t * 18.0).exp() * 0.5) as f32;
    }

    output
}

/// Cowbell: two detuned square waves at 540 Hz and 800 Hz, 300 ms.
pub fn generate_cowbell(sample_rate: u32) -> Vec<f32> {
    let seconds = 0.3;
    let n = num_samples(sample_rate, seconds);
    let sr = sample_rate as f64;
    let square = |freq: f64, t: f64| if (freq * t).fract() < 0.5 { 1.0 } else { -1.0 };

    (0..n)
        .map(|i| {
            let t = i as f64 / sr;
            let norm = t / seconds;
            let tone = (square(540.0, t) + square(800.0, t)) * 0.5;
            (tone * (-norm * 8.0).exp() * 0.4) as f32
        })
        .collect()
}

/// Tom: short downward sweep settling on `freq`.
pub fn generate_tom(sample_rate: u32, freq: f64) -> Vec<f32> {
    pitched_sweep(sample_rate, 0.3, freq * 1.5, freq, 10.0, 7.0)
}

/// Rimshot: 1.7 kHz click with a touch of noise, 30 ms.
pub fn generate_rimshot(sample_rate: u32, seed: u64) -> Vec<f32> {
    let seconds = 0.03;
    let n = num_samples(sample_rate, seconds);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let amp = (-t / seconds * 12.0).exp();
            let tone = (t * 1700.0 * 2.0 * PI).sin();
            let noise: f64 = rng.gen_range(-1.0..1.0);
            ((tone * 0.7 + noise * 0.3) * amp * 0.8) as f32
        })
        .collect()
}

/// Pre-rendered buffers for all ten drum sounds.
#[derive(Debug, Clone)]
pub struct DrumKit {
    sample_rate: u32,
    voices: BTreeMap<DrumSound, Vec<f32>>,
}

impl DrumKit {
    /// Synthesize every sound at `sample_rate`. `seed` drives the noise
    /// generators.
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        let sr = sample_rate;
        let voices = DrumSound::ALL
            .into_iter()
            .map(|sound| {
                let buffer = match sound {
                    DrumSound::Kick => generate_kick(sr),
                    DrumSound::Snare => generate_snare(sr, seed),
                    DrumSound::ClosedHat => generate_closed_hat(sr, seed.wrapping_add(1)),
                    DrumSound::OpenHat => generate_open_hat(sr, seed.wrapping_add(2)),
                    DrumSound::Clap => generate_clap(sr, seed.wrapping_add(3)),
                    DrumSound::Cowbell => generate_cowbell(sr),
                    DrumSound::LowTom => generate_tom(sr, 100.0),
                    DrumSound::MidTom => generate_tom(sr, 140.0),
                    DrumSound::HighTom => generate_tom(sr, 190.0),
                    DrumSound::Rimshot => generate_rimshot(sr, seed.wrapping_add(4)),
                };
                (sound, buffer)
            })
            .collect();
        Self {
            sample_rate,
            voices,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The rendered buffer for `sound`.
    pub fn sample(&self, sound: DrumSound) -> &[f32] {
        self.voices.get(&sound).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add `sound` scaled by `gain` into `out` starting at `offset`.
    /// The tail is cut at the end of `out`.
    pub fn mix_hit(&self, sound: DrumSound, gain: f32, out: &mut [f32], offset: usize) {
        let Some(target) = out.get_mut(offset..) else {
            return;
        };
        for (dst, src) in target.iter_mut().zip(self.sample(sound)) {
            *dst += src * gain;
        }
    }
}

impl Default for DrumKit {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, DEFAULT_KIT_SEED)
    }
}
