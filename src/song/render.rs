//! Song rendering: each track is rendered on its own, summed with the mix
//! gains and normalized when the sum clips.

use super::{BassTrack, DrumTrack, Song, SynthTrack};
use crate::beat::{self, SAMPLE_RATE};
use crate::instrument::{self, BassVoice, DrumKit, SynthVoice};

/// Renders songs. Owns one instance of every voice, so a renderer renders
/// one song at a time.
pub struct SongRenderer {
    sample_rate: u32,
    kit: DrumKit,
    bass: BassVoice,
    synth: SynthVoice,
}

impl SongRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            kit: DrumKit::new(sample_rate, instrument::drum::DEFAULT_KIT_SEED),
            bass: BassVoice::new(sample_rate),
            synth: SynthVoice::new(sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render the whole song. The buffer is exactly
    /// `bars * 16` steps long at the song tempo, truncated to whole samples.
    pub fn render(&mut self, song: &Song) -> Vec<f32> {
        let sr = self.sample_rate as f64;
        let total_samples = (song.duration_seconds() * sr) as usize;
        let mut mix = vec![0.0f32; total_samples];

        if let Some(drums) = &song.drums {
            let samples = self.render_drums(drums, song.tempo(), song.total_steps());
            instrument::mix_into(&mut mix, &samples, 0, song.mix.drums);
            log::info!(target: "render", "rendered drums: {} samples", samples.len());
        }
        if let Some(bass) = &song.bass {
            let samples = self.render_bass(bass, song.tempo(), total_samples);
            instrument::mix_into(&mut mix, &samples, 0, song.mix.bass);
            log::info!(target: "render", "rendered bass: {} samples", samples.len());
        }
        if let Some(synth) = &song.synth {
            let samples = self.render_synth(synth, total_samples);
            instrument::mix_into(&mut mix, &samples, 0, song.mix.synth);
            log::info!(target: "render", "rendered synth: {} samples", samples.len());
        }

        normalize(&mut mix);
        log::info!(
            target: "render",
            "song {:?} rendered: {} samples, {:.1}s",
            song.name,
            mix.len(),
            song.duration_seconds()
        );
        mix
    }

    /// Kit hits placed on whole-sample step boundaries.
    fn render_drums(&self, track: &DrumTrack, tempo: u32, total_steps: usize) -> Vec<f32> {
        let samples_per_step = (beat::step_seconds(tempo as f64) * self.sample_rate as f64) as usize;
        let mut out = vec![0.0f32; total_steps * samples_per_step];

        for lane in &track.lanes {
            for (step, velocity) in lane.hits().take_while(|(step, _)| *step < total_steps) {
                self.kit.mix_hit(lane.sound, velocity, &mut out, step * samples_per_step);
            }
        }
        out
    }

    /// The one-bar bass pattern, repeated to fill the song.
    fn render_bass(&mut self, track: &BassTrack, tempo: u32, total_samples: usize) -> Vec<f32> {
        let mut pattern = track.pattern.clone();
        pattern.tempo = tempo;
        let bar = self.bass.render_pattern(&pattern);
        if bar.is_empty() {
            return bar;
        }
        bar.iter().copied().cycle().take(total_samples).collect()
    }

    fn render_synth(&self, track: &SynthTrack, total_samples: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; total_samples];
        for (start, duration, pitches) in track.chords() {
            let offset = (start * self.sample_rate as f64) as usize;
            if offset >= total_samples {
                break;
            }
            let chord = self
                .synth
                .render_chord(&track.patch, &pitches, duration, super::parser::SYNTH_VELOCITY);
            instrument::mix_into(&mut out, &chord, offset, 1.0);
        }
        out
    }
}

impl Default for SongRenderer {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

/// Scale the buffer down by its peak when the peak exceeds 1. Quieter
/// buffers are left untouched.
pub fn normalize(samples: &mut [f32]) {
    let peak = instrument::peak(samples);
    if peak > 1.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// Render with a fresh [`SongRenderer`] at the engine sample rate.
pub fn render(song: &Song) -> Vec<f32> {
    SongRenderer::default().render(song)
}
