//! 80s polysynth voices: PWM pad, two-operator FM and a resonant
//! poly lead behind one patch type.
//!
//! Each note is rendered independently with its own oscillator, filter and
//! envelope state, created at the start of the render call. Chords are the
//! per-note renders summed and scaled by `1 / notes`.

use std::fmt;

use super::chorus::Chorus;
use super::envelope::{Adsr, AdsrEnvelope};
use super::filter::{OnePole, ResonantTwoPole};
use super::oscillator::{advance_phase, cents_ratio, midi_to_freq, oscillator, Lfo, Waveform};
use crate::beat::SAMPLE_RATE;

/// Shortest note the voice will render, in seconds.
pub const MIN_NOTE_SECONDS: f64 = 0.001;

/// Saw plus PWM pulse into a one-pole low-pass and chorus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadParams {
    /// Pulse oscillator detune in cents.
    pub detune: f64,
    pub pulse_width: f64,
    pub pwm_depth: f64,
    pub pwm_rate: f64,
    pub cutoff: f64,
    pub env_amount: f64,
    /// 0 disables the chorus.
    pub chorus_depth: f64,
    pub chorus_rate: f64,
}

impl Default for PadParams {
    fn default() -> Self {
        Self {
            detune: 0.0,
            pulse_width: 0.5,
            pwm_depth: 0.0,
            pwm_rate: 0.5,
            cutoff: 0.7,
            env_amount: 0.3,
            chorus_depth: 0.3,
            chorus_rate: 0.8,
        }
    }
}

/// Sine modulator into a sine carrier. `index_decay` is the decay time of
/// the brightness envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmParams {
    pub ratio: f64,
    pub index: f64,
    pub index_decay: f64,
}

impl Default for FmParams {
    fn default() -> Self {
        Self {
            ratio: 2.0,
            index: 2.0,
            index_decay: 0.5,
        }
    }
}

/// Two detuned saws into a resonant two-pole low-pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadParams {
    pub detune: f64,
    pub cutoff: f64,
    pub resonance: f64,
    pub env_amount: f64,
}

impl Default for LeadParams {
    fn default() -> Self {
        Self {
            detune: 0.0,
            cutoff: 0.7,
            resonance: 0.3,
            env_amount: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynthAlgorithm {
    Pad(PadParams),
    Fm(FmParams),
    Lead(LeadParams),
}

impl SynthAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            SynthAlgorithm::Pad(_) => "pad",
            SynthAlgorithm::Fm(_) => "fm",
            SynthAlgorithm::Lead(_) => "lead",
        }
    }
}

/// A named synth sound: the algorithm with its parameters plus the amplitude
/// envelope shared by all three.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthPatch {
    pub name: String,
    pub algorithm: SynthAlgorithm,
    pub envelope: AdsrEnvelope,
}

impl SynthPatch {
    pub fn new(name: impl Into<String>, algorithm: SynthAlgorithm, envelope: AdsrEnvelope) -> Self {
        Self {
            name: name.into(),
            algorithm,
            envelope,
        }
    }
}

impl fmt::Display for SynthPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.algorithm.name())
    }
}

/// A note placed in time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthNote {
    pub pitch: u8,
    /// 0-1.
    pub velocity: f64,
    pub start: f64,
    pub duration: f64,
}

impl SynthNote {
    /// Velocity is clamped to 0-1 and duration to at least 1 ms.
    pub fn new(pitch: u8, velocity: f64, start: f64, duration: f64) -> Self {
        Self {
            pitch: pitch.min(127),
            velocity: velocity.clamp(0.0, 1.0),
            start: start.max(0.0),
            duration: duration.max(MIN_NOTE_SECONDS),
        }
    }
}

/// Renders notes and chords for any [`SynthPatch`].
#[derive(Debug, Clone)]
pub struct SynthVoice {
    sample_rate: u32,
}

impl SynthVoice {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render one note of `duration` seconds. The buffer holds
    /// `duration * sample_rate` samples, truncated.
    pub fn render_note(&self, patch: &SynthPatch, midi_note: u8, duration: f64, velocity: f64) -> Vec<f32> {
        if duration <= 0.0 {
            return Vec::new();
        }
        let freq = midi_to_freq(midi_note.min(127));
        let mut note = NoteState::new(patch.envelope, duration, self.sample_rate);
        let velocity = velocity.clamp(0.0, 1.0);

        let out = match &patch.algorithm {
            SynthAlgorithm::Pad(p) => self.render_pad(p, freq, velocity, &mut note),
            SynthAlgorithm::Fm(p) => self.render_fm(p, freq, velocity, &mut note),
            SynthAlgorithm::Lead(p) => self.render_lead(p, freq, velocity, &mut note),
        };
        log::debug!(
            target: "render",
            "rendered {} note {}: {} samples",
            patch.algorithm.name(),
            midi_note,
            out.len()
        );
        out
    }

    /// Render a [`SynthNote`]; its start time is left to the caller.
    pub fn render(&self, patch: &SynthPatch, note: &SynthNote) -> Vec<f32> {
        self.render_note(patch, note.pitch, note.duration, note.velocity)
    }

    /// Render several notes at once, mixed with equal weight and scaled by
    /// `1 / notes.len()`.
    pub fn render_chord(&self, patch: &SynthPatch, midi_notes: &[u8], duration: f64, velocity: f64) -> Vec<f32> {
        if midi_notes.is_empty() {
            return Vec::new();
        }

        let voices: Vec<Vec<f32>> = midi_notes
            .iter()
            .map(|note| self.render_note(patch, *note, duration, velocity))
            .collect();
        let len = voices.iter().map(Vec::len).max().unwrap_or(0);
        let scale = 1.0 / midi_notes.len() as f32;

        let mut mixed = vec![0.0f32; len];
        for voice in &voices {
            for (dst, src) in mixed.iter_mut().zip(voice) {
                *dst += src;
            }
        }
        for s in &mut mixed {
            *s *= scale;
        }
        mixed
    }

    fn render_pad(&self, p: &PadParams, freq: f64, velocity: f64, note: &mut NoteState) -> Vec<f32> {
        let sr = self.sample_rate;
        let mut filter_env = note.modulation_envelope(AdsrEnvelope::new(0.01, 0.3, 0.5, 0.5));
        let mut pwm_lfo = Lfo::new(p.pwm_rate, sr);
        let mut filter = OnePole::new();
        let mut chorus = (p.chorus_depth > 0.0).then(|| Chorus::new(sr, p.chorus_depth * 0.005, p.chorus_rate));
        let freq2 = freq * cents_ratio(p.detune);
        let (mut saw_phase, mut pulse_phase) = (0.0, 0.0);

        let mut out = Vec::with_capacity(note.samples);
        for i in 0..note.samples {
            let amp = note.next_level(i, &mut filter_env);
            let filter_level = filter_env.next_sample();

            saw_phase = advance_phase(saw_phase, freq, sr);
            pulse_phase = advance_phase(pulse_phase, freq2, sr);
            let width = (p.pulse_width + p.pwm_depth * pwm_lfo.next_sample() * 0.3).clamp(0.1, 0.9);
            let mix = (oscillator(Waveform::Saw, saw_phase) + oscillator(Waveform::Pulse(width), pulse_phase) * 0.8) * 0.5;

            let cutoff = 200.0 + p.cutoff * 4000.0 + filter_level * p.env_amount * 3000.0;
            let filtered = filter.process(mix, cutoff / sr as f64);

            let mut sample = filtered * amp * velocity * 0.6;
            if let Some(chorus) = chorus.as_mut() {
                sample = chorus.process(sample);
            }
            out.push(sample as f32);
        }
        out
    }

    fn render_fm(&self, p: &FmParams, freq: f64, velocity: f64, note: &mut NoteState) -> Vec<f32> {
        let sr = self.sample_rate;
        let mut index_env = note.modulation_envelope(AdsrEnvelope::new(0.001, p.index_decay, 0.2, 0.1));
        let mod_freq = freq * p.ratio;
        let (mut carrier_phase, mut mod_phase) = (0.0, 0.0);

        let mut out = Vec::with_capacity(note.samples);
        for i in 0..note.samples {
            let amp = note.next_level(i, &mut index_env);
            let index = index_env.next_sample();

            mod_phase = advance_phase(mod_phase, mod_freq, sr);
            let modulator = oscillator(Waveform::Sine, mod_phase);
            let deviation = modulator * p.index * index;

            carrier_phase = advance_phase(carrier_phase, freq + freq * deviation * 0.1, sr);
            let carrier = oscillator(Waveform::Sine, carrier_phase);

            out.push((carrier * amp * velocity * 0.7) as f32);
        }
        out
    }

    fn render_lead(&self, p: &LeadParams, freq: f64, velocity: f64, note: &mut NoteState) -> Vec<f32> {
        let sr = self.sample_rate;
        let mut filter_env = note.modulation_envelope(AdsrEnvelope::new(0.005, 0.15, 0.4, 0.2));
        let mut filter = ResonantTwoPole::new();
        let freq2 = freq * cents_ratio(p.detune);
        let feedback = p.resonance * 3.5;
        let (mut phase1, mut phase2) = (0.0, 0.0);

        let mut out = Vec::with_capacity(note.samples);
        for i in 0..note.samples {
            let amp = note.next_level(i, &mut filter_env);
            let filter_level = filter_env.next_sample();

            phase1 = advance_phase(phase1, freq, sr);
            phase2 = advance_phase(phase2, freq2, sr);
            let mix = (oscillator(Waveform::Saw, phase1) + oscillator(Waveform::Saw, phase2)) * 0.5;

            let cutoff = 300.0 + p.cutoff * 5000.0 + filter_level * p.env_amount * 4000.0;
            let low = filter.process(mix, cutoff, feedback, sr);

            out.push((low * amp * velocity * 0.6) as f32);
        }
        out
    }
}

impl Default for SynthVoice {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

/// Per-note timing and amplitude envelope.
struct NoteState {
    samples: usize,
    sample_rate: u32,
    /// Sample index where the gate closes, `release` seconds before the end.
    /// `None` when the release is longer than the note.
    release_at: Option<usize>,
    amp: Adsr,
}

impl NoteState {
    fn new(envelope: AdsrEnvelope, duration: f64, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        // Truncate toward zero, so a release within one sample of the note
        // length still fires on the first sample.
        let release_at = ((duration - envelope.release) * sr).trunc();
        Self {
            samples: (duration * sr) as usize,
            sample_rate,
            release_at: (release_at >= 0.0).then_some(release_at as usize),
            amp: envelope.start(sample_rate),
        }
    }

    /// A triggered envelope that releases together with the amplitude
    /// envelope.
    fn modulation_envelope(&self, envelope: AdsrEnvelope) -> Adsr {
        envelope.start(self.sample_rate)
    }

    /// Close both gates at the release point, then advance the amplitude
    /// envelope.
    fn next_level(&mut self, i: usize, modulation: &mut Adsr) -> f64 {
        if self.release_at == Some(i) {
            self.amp.release();
            modulation.release();
        }
        self.amp.next_sample()
    }
}

fn juno_pad() -> SynthPatch {
    SynthPatch::new(
        "Warm Pad",
        SynthAlgorithm::Pad(PadParams {
            detune: 8.0,
            pulse_width: 0.5,
            pwm_depth: 0.4,
            pwm_rate: 0.3,
            cutoff: 0.6,
            env_amount: 0.3,
            chorus_depth: 0.4,
            chorus_rate: 0.6,
        }),
        AdsrEnvelope::new(0.15, 0.5, 0.8, 0.8),
    )
}

fn dx7_epiano() -> SynthPatch {
    SynthPatch::new(
        "E.Piano 1",
        SynthAlgorithm::Fm(FmParams {
            ratio: 1.0,
            index: 3.5,
            index_decay: 0.4,
        }),
        AdsrEnvelope::new(0.005, 0.8, 0.3, 0.5),
    )
}

fn dx7_bells() -> SynthPatch {
    SynthPatch::new(
        "Tubular Bells",
        SynthAlgorithm::Fm(FmParams {
            ratio: 3.5,
            index: 5.0,
            index_decay: 0.2,
        }),
        AdsrEnvelope::new(0.001, 2.0, 0.1, 1.0),
    )
}

fn prophet_lead() -> SynthPatch {
    SynthPatch::new(
        "Prophet Lead",
        SynthAlgorithm::Lead(LeadParams {
            detune: 12.0,
            cutoff: 0.7,
            resonance: 0.5,
            env_amount: 0.5,
        }),
        AdsrEnvelope::new(0.01, 0.2, 0.6, 0.3),
    )
}

fn prophet_brass() -> SynthPatch {
    SynthPatch::new(
        "Poly Brass",
        SynthAlgorithm::Lead(LeadParams {
            detune: 6.0,
            cutoff: 0.5,
            resonance: 0.3,
            env_amount: 0.6,
        }),
        AdsrEnvelope::new(0.08, 0.3, 0.7, 0.4),
    )
}

const PRESETS: &[(&str, fn() -> SynthPatch)] = &[
    ("juno-pad", juno_pad),
    ("dx7-epiano", dx7_epiano),
    ("dx7-bells", dx7_bells),
    ("prophet-lead", prophet_lead),
    ("prophet-brass", prophet_brass),
];

/// The default patch, used when a preset name is unknown.
pub const DEFAULT_PRESET: &str = "juno-pad";

pub fn preset(name: &str) -> Option<SynthPatch> {
    PRESETS
        .iter()
        .find(|(preset_name, _)| *preset_name == name)
        .map(|(_, build)| build())
}

/// Like [`preset`], falling back to the warm pad.
pub fn preset_or_default(name: &str) -> SynthPatch {
    preset(name).unwrap_or_else(juno_pad)
}

pub fn list_presets() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}
