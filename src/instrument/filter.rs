//! Low-pass filters used by the bass and synth voices.
//!
//! All filters are per-sample state machines. Coefficients are computed on
//! every call because the voices sweep cutoff per sample from an envelope.

use std::f64::consts::PI;

/// 24 dB/oct resonant low-pass: four cascaded one-pole stages with the last
/// stage fed back into the input.
#[derive(Debug, Clone)]
pub struct LadderFilter {
    sample_rate: u32,
    cutoff: f64,
    resonance: f64,
    stages: [f64; 4],
}

/// Highest resonance before the feedback loop runs away.
pub const MAX_LADDER_RESONANCE: f64 = 0.97;

impl LadderFilter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            cutoff: 1000.0,
            resonance: 0.0,
            stages: [0.0; 4],
        }
    }

    /// Set cutoff in Hz, clamped to `[20, 0.45 * sample_rate]`.
    pub fn set_cutoff(&mut self, hz: f64) {
        let max = self.sample_rate as f64 * 0.45;
        self.cutoff = hz.clamp(20.0, max);
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Set resonance, clamped to `[0, 0.97]`.
    pub fn set_resonance(&mut self, resonance: f64) {
        self.resonance = resonance.clamp(0.0, MAX_LADDER_RESONANCE);
    }

    pub fn resonance(&self) -> f64 {
        self.resonance
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let f = 2.0 * (PI * self.cutoff / self.sample_rate as f64).sin();
        let fb = self.resonance + self.resonance / (1.0 - f + 0.001);

        let x = input - fb * self.stages[3];
        self.stages[0] += f * (x - self.stages[0]);
        self.stages[1] += f * (self.stages[0] - self.stages[1]);
        self.stages[2] += f * (self.stages[1] - self.stages[2]);
        self.stages[3] += f * (self.stages[2] - self.stages[3]);

        self.stages[3]
    }

    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
    }
}

/// One-pole low-pass. The first sample after a reset passes straight through.
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    state: Option<f64>,
}

impl OnePole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample with normalized cutoff `fc` (cycles per sample),
    /// clamped to `[0.001, 0.49]`.
    pub fn process(&mut self, input: f64, fc: f64) -> f64 {
        let fc = fc.clamp(0.001, 0.49);
        let out = match self.state {
            Some(prev) => prev + fc * (input - prev),
            None => input,
        };
        self.state = Some(out);
        out
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Two-pole resonant low-pass built from two cascaded integrators.
#[derive(Debug, Clone, Default)]
pub struct ResonantTwoPole {
    band: f64,
    low: f64,
}

impl ResonantTwoPole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample. `cutoff` is in Hz and `feedback` scales the
    /// resonance path.
    pub fn process(&mut self, input: f64, cutoff: f64, feedback: f64, sample_rate: u32) -> f64 {
        let fc = (2.0 * (PI * cutoff / sample_rate as f64).sin()).clamp(0.01, 0.99);

        let high = input - self.band - feedback * self.low;
        let band = fc * high + self.band;
        let low = fc * band + self.low;

        self.band = band;
        self.low = low;
        low
    }

    pub fn reset(&mut self) {
        self.band = 0.0;
        self.low = 0.0;
    }
}
