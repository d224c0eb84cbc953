//! Envelope generators: the shared ADSR and the 303 decay envelope.

/// Attack-Decay-Sustain-Release settings.
///
/// All time values are in seconds. Sustain is a level (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrEnvelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl AdsrEnvelope {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// A running envelope with these settings at `sample_rate`.
    pub fn start(&self, sample_rate: u32) -> Adsr {
        let mut adsr = Adsr::new(*self, sample_rate);
        adsr.trigger();
        adsr
    }
}

/// Envelope stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Per-sample ADSR state machine.
///
/// Attack ramps linearly 0 → 1, decay ramps linearly to the sustain level,
/// sustain holds while the gate is open, and release ramps down at a rate
/// that takes `release` seconds to fall from the sustain level to zero.
/// Stage times are floored at 1 ms.
#[derive(Debug, Clone)]
pub struct Adsr {
    attack_rate: f64,
    decay_rate: f64,
    release_rate: f64,
    sustain: f64,
    level: f64,
    stage: Stage,
}

const MIN_STAGE_SECONDS: f64 = 0.001;

impl Adsr {
    pub fn new(env: AdsrEnvelope, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let sustain = env.sustain.clamp(0.0, 1.0);
        Self {
            attack_rate: 1.0 / (env.attack.max(MIN_STAGE_SECONDS) * sr),
            decay_rate: (1.0 - sustain) / (env.decay.max(MIN_STAGE_SECONDS) * sr),
            release_rate: sustain / (env.release.max(MIN_STAGE_SECONDS) * sr),
            sustain,
            level: 0.0,
            stage: Stage::Idle,
        }
    }

    /// Open the gate and restart from silence.
    pub fn trigger(&mut self) {
        self.stage = Stage::Attack;
        self.level = 0.0;
    }

    /// Close the gate.
    pub fn release(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Advance one sample and return the new level.
    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => return 0.0,
            Stage::Attack => {
                self.level += self.attack_rate;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= self.decay_rate;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= self.release_rate;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
        self.level
    }
}

/// Single-stage exponential decay used by the 303 voice for both VCA and VCF.
#[derive(Debug, Clone)]
pub struct DecayEnvelope {
    sample_rate: u32,
    decay_seconds: f64,
    accent_decay_seconds: f64,
    level: f64,
    decay_rate: f64,
}

/// Below this level the decay envelope snaps to zero.
const DECAY_FLOOR: f64 = 0.001;

impl DecayEnvelope {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            decay_seconds: 0.3,
            accent_decay_seconds: 0.1,
            level: 0.0,
            decay_rate: 0.0,
        }
    }

    /// Map a 0–1 knob onto 0.05–1.0 seconds.
    pub fn set_decay(&mut self, decay: f64) {
        self.decay_seconds = 0.05 + decay.clamp(0.0, 1.0) * 0.95;
    }

    pub fn decay_seconds(&self) -> f64 {
        self.decay_seconds
    }

    /// Jump to full level. Accented notes use the shorter accent decay.
    pub fn trigger(&mut self, accent: bool) {
        self.level = 1.0;
        let seconds = if accent {
            self.accent_decay_seconds
        } else {
            self.decay_seconds
        };
        self.decay_rate = 1.0 / (seconds * self.sample_rate as f64);
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.level > DECAY_FLOOR {
            self.level *= 1.0 - self.decay_rate;
        } else {
            self.level = 0.0;
        }
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
        self.decay_rate = 0.0;
    }
}
