//! Acid bass voice: a 303-style monosynth.
//!
//! A saw or square oscillator runs into a resonant 4-pole ladder low-pass.
//! One exponential decay envelope drives both the VCA and the filter cutoff.
//! Accented steps decay faster, open the filter further and play louder.
//! Slide is read one step ahead: when the next step is flagged, the current
//! step glides into its pitch over 50 ms instead of jumping.

use super::envelope::DecayEnvelope;
use super::filter::LadderFilter;
use super::oscillator::midi_to_freq;
use crate::beat::{self, SAMPLE_RATE};

/// Steps in every bass pattern.
pub const STEPS: usize = 16;

const SLIDE_SECONDS: f64 = 0.05;
const ACCENT_CUTOFF_BOOST: f64 = 2000.0;
const VCA_FLOOR: f64 = 0.3;
const MASTER_GAIN: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassWaveform {
    Saw,
    Square,
}

/// One step of a bass pattern. `accent` and `slide` only matter when
/// `gate` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BassStep {
    /// MIDI note, 36 = C2.
    pub pitch: u8,
    pub gate: bool,
    pub accent: bool,
    pub slide: bool,
    pub octave_up: bool,
    pub octave_down: bool,
}

impl BassStep {
    pub fn note(pitch: u8) -> Self {
        Self {
            pitch,
            ..Self::default()
        }
    }

    pub fn rest() -> Self {
        Self {
            gate: false,
            ..Self::default()
        }
    }

    pub fn accent(mut self) -> Self {
        self.accent = true;
        self
    }

    pub fn slide(mut self) -> Self {
        self.slide = true;
        self
    }

    /// Pitch after the octave flags are applied, clamped to the MIDI range.
    pub fn sounding_pitch(&self) -> u8 {
        let mut pitch = self.pitch as i32;
        if self.octave_up {
            pitch += 12;
        }
        if self.octave_down {
            pitch -= 12;
        }
        pitch.clamp(0, 127) as u8
    }
}

impl Default for BassStep {
    fn default() -> Self {
        Self {
            pitch: 36,
            gate: true,
            accent: false,
            slide: false,
            octave_up: false,
            octave_down: false,
        }
    }
}

/// Sixteen steps plus the tone settings of the voice. Knob values are 0-1.
#[derive(Debug, Clone, PartialEq)]
pub struct BassPattern {
    pub steps: [BassStep; STEPS],
    pub tempo: u32,
    pub waveform: BassWaveform,
    pub cutoff: f64,
    pub resonance: f64,
    pub env_mod: f64,
    pub decay: f64,
    pub accent_level: f64,
}

impl Default for BassPattern {
    fn default() -> Self {
        Self {
            steps: [BassStep::default(); STEPS],
            tempo: 120,
            waveform: BassWaveform::Saw,
            cutoff: 0.5,
            resonance: 0.7,
            env_mod: 0.6,
            decay: 0.3,
            accent_level: 0.8,
        }
    }
}

impl BassPattern {
    /// Samples per 16th-note step at this pattern's tempo.
    pub fn samples_per_step(&self, sample_rate: u32) -> usize {
        beat::samples_per_step(beat::clamp_tempo(self.tempo) as f64, sample_rate)
    }

    /// Copy the tone settings (waveform and knobs) of `other`, keeping this
    /// pattern's steps and tempo.
    pub fn set_tone_from(&mut self, other: &BassPattern) {
        self.waveform = other.waveform;
        self.cutoff = other.cutoff;
        self.resonance = other.resonance;
        self.env_mod = other.env_mod;
        self.decay = other.decay;
        self.accent_level = other.accent_level;
    }
}

/// Renders [`BassPattern`]s. Oscillator, filter and envelope state live on
/// the voice, so one voice renders one pattern at a time.
#[derive(Debug, Clone)]
pub struct BassVoice {
    sample_rate: u32,
    filter: LadderFilter,
    envelope: DecayEnvelope,
    phase: f64,
    frequency: f64,
    target_frequency: f64,
    slide_rate: f64,
    waveform: BassWaveform,
    base_cutoff: f64,
    env_mod: f64,
}

impl BassVoice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            filter: LadderFilter::new(sample_rate),
            envelope: DecayEnvelope::new(sample_rate),
            phase: 0.0,
            frequency: 110.0,
            target_frequency: 110.0,
            slide_rate: 0.0,
            waveform: BassWaveform::Saw,
            base_cutoff: 500.0,
            env_mod: 3000.0,
        }
    }

    /// Return oscillator, filter and envelope to their power-on state.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.envelope.reset();
        self.phase = 0.0;
        self.frequency = 110.0;
        self.target_frequency = 110.0;
        self.slide_rate = 0.0;
    }

    /// Render all sixteen steps. The output is exactly
    /// `16 * pattern.samples_per_step(sample_rate)` samples long.
    pub fn render_pattern(&mut self, pattern: &BassPattern) -> Vec<f32> {
        self.reset();
        self.waveform = pattern.waveform;
        self.base_cutoff = 200.0 + pattern.cutoff * 2000.0;
        self.env_mod = pattern.env_mod * 5000.0;
        self.envelope.set_decay(pattern.decay);
        self.filter.set_resonance(pattern.resonance);

        let samples_per_step = pattern.samples_per_step(self.sample_rate);
        let mut output = Vec::with_capacity(samples_per_step * STEPS);

        for (i, step) in pattern.steps.iter().enumerate() {
            // The last step never slides.
            let slide = pattern.steps.get(i + 1).is_some_and(|next| next.slide);
            self.render_step(
                step,
                slide,
                samples_per_step,
                pattern.accent_level,
                &mut output,
            );
        }

        log::debug!(target: "render", "rendered bass pattern: {} samples", output.len());
        output
    }

    fn render_step(
        &mut self,
        step: &BassStep,
        slide: bool,
        samples: usize,
        accent_level: f64,
        output: &mut Vec<f32>,
    ) {
        let accent = step.gate && step.accent;
        if step.gate {
            self.set_note(step.sounding_pitch(), slide);
            self.envelope.trigger(accent);
        }

        for _ in 0..samples {
            let osc = self.next_oscillator();
            let env = self.envelope.next_sample();

            let mut cutoff = self.base_cutoff + env * self.env_mod;
            if accent {
                cutoff += ACCENT_CUTOFF_BOOST * env;
            }
            self.filter.set_cutoff(cutoff);
            let filtered = self.filter.process(osc);

            let mut volume = VCA_FLOOR + env * (1.0 - VCA_FLOOR);
            if accent {
                volume *= 1.0 + accent_level * 0.5;
            }

            output.push((filtered * volume * MASTER_GAIN) as f32);
        }
    }

    fn set_note(&mut self, pitch: u8, slide: bool) {
        self.target_frequency = midi_to_freq(pitch);
        if slide {
            let slide_samples = ((SLIDE_SECONDS * self.sample_rate as f64) as usize).max(1);
            self.slide_rate = (self.target_frequency - self.frequency) / slide_samples as f64;
        } else {
            self.frequency = self.target_frequency;
            self.slide_rate = 0.0;
        }
    }

    fn next_oscillator(&mut self) -> f64 {
        if self.slide_rate != 0.0 {
            self.frequency += self.slide_rate;
            let arrived = (self.slide_rate > 0.0 && self.frequency >= self.target_frequency)
                || (self.slide_rate < 0.0 && self.frequency <= self.target_frequency);
            if arrived {
                self.frequency = self.target_frequency;
                self.slide_rate = 0.0;
            }
        }

        self.phase += self.frequency / self.sample_rate as f64;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        match self.waveform {
            BassWaveform::Saw => 2.0 * self.phase - 1.0,
            BassWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

impl Default for BassVoice {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

/// Classic acid house line in C.
pub fn acid_pattern() -> BassPattern {
    let n = BassStep::note;
    BassPattern {
        steps: [
            n(36).accent(),
            n(36),
            n(36).slide(),
            n(40).accent(),
            n(43),
            n(43).slide(),
            n(48).accent(),
            n(48),
            n(36),
            BassStep::rest(),
            n(40).slide(),
            n(43).accent(),
            n(43),
            n(36).slide(),
            n(36).accent(),
            BassStep::rest(),
        ],
        tempo: 130,
        waveform: BassWaveform::Saw,
        cutoff: 0.3,
        resonance: 0.85,
        env_mod: 0.8,
        decay: 0.2,
        accent_level: 0.9,
    }
}

/// Dark minimal techno line on A.
pub fn techno_pattern() -> BassPattern {
    let n = BassStep::note;
    BassPattern {
        steps: [
            n(33).accent(),
            BassStep::rest(),
            n(33),
            BassStep::rest(),
            n(33).accent(),
            n(33).slide(),
            n(45),
            BassStep::rest(),
            n(33),
            n(33).accent(),
            BassStep::rest(),
            n(33),
            n(33).slide(),
            n(40).accent(),
            n(33),
            BassStep::rest(),
        ],
        tempo: 138,
        waveform: BassWaveform::Square,
        cutoff: 0.2,
        resonance: 0.75,
        env_mod: 0.6,
        decay: 0.15,
        accent_level: 0.7,
    }
}

/// A preset pattern by name. `303` is an alias of `acid`.
pub fn preset(name: &str) -> Option<BassPattern> {
    match name {
        "acid" | "303" => Some(acid_pattern()),
        "techno" => Some(techno_pattern()),
        _ => None,
    }
}

pub fn list_presets() -> Vec<&'static str> {
    vec!["acid", "techno"]
}

/// Parse bass shorthand into a pattern with default tone settings.
///
/// Each whitespace-separated token is one step, `NOTE[#][OCTAVE][modifiers]`:
/// a note letter, optional sharp, optional single-digit octave (default 2),
/// then any of `*` accent, `~` slide, `+` octave up, `-` octave down. A token
/// starting with `r` is a rest. Tokens with an unknown note letter are
/// skipped. At most 16 tokens are read; missing steps are rests.
///
/// ```
/// let pattern = groovebox::instrument::bass::parse_shorthand("c2* c c~ e* g");
/// assert!(pattern.steps[0].accent);
/// assert_eq!(pattern.steps[3].pitch, 40);
/// assert!(!pattern.steps[5].gate);
/// ```
pub fn parse_shorthand(text: &str) -> BassPattern {
    let lowered = text.to_lowercase();
    let mut steps: Vec<BassStep> = Vec::with_capacity(STEPS);

    for token in lowered.split_whitespace().take(STEPS) {
        if token.starts_with('r') {
            steps.push(BassStep::rest());
            continue;
        }
        if let Some(step) = parse_step(token) {
            steps.push(step);
        }
    }

    let mut pattern = BassPattern::default();
    for (slot, step) in pattern.steps.iter_mut().enumerate() {
        *step = steps.get(slot).copied().unwrap_or_else(BassStep::rest);
    }
    pattern
}

fn parse_step(token: &str) -> Option<BassStep> {
    let mut chars = token.chars().peekable();
    let base = match chars.next()? {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let sharp = chars.next_if_eq(&'#').is_some();
    // no e# or b#
    if sharp && (base == 4 || base == 11) {
        return None;
    }
    let octave = chars
        .next_if(char::is_ascii_digit)
        .and_then(|c| c.to_digit(10))
        .unwrap_or(2) as i32;

    let mut step = BassStep::note((12 + octave * 12 + base + sharp as i32).clamp(0, 127) as u8);
    for modifier in chars {
        match modifier {
            '*' => step.accent = true,
            '~' => step.slide = true,
            '+' => step.octave_up = true,
            '-' => step.octave_down = true,
            _ => {}
        }
    }
    Some(step)
}
