//! Full pipeline integration tests: text → parse → voices → mix → WAV/MIDI.
//!
//! Everything renders offline; files go to temporary directories.

use groovebox::beat::SAMPLE_RATE;
use groovebox::export::{wav_bytes, write_wav, MidiExporter};
use groovebox::instrument::{bass, peak, synth, BassVoice, SynthVoice};
use groovebox::mml;
use groovebox::song::{self, render::normalize, SongRenderer};

const SONG: &str = "\
#SONG \"Pipeline\"
#TEMPO 124
#BARS 2

#DRUMS
x-x-x-x-x-x-x-x-
----X-------X---
X-------X-------

#BASS <acid>
c2* c c~ e* g g~ c3* c r c e~ g* g c~ c* r

#SYNTH <juno-pad>
[c4 e4 g4]4 [a3 c4 e4]4
";

/// Helper: parse and render the reference song.
fn render_song() -> (song::Song, Vec<f32>) {
    let song = song::parse(SONG);
    let samples = SongRenderer::new(SAMPLE_RATE).render(&song);
    (song, samples)
}

// =============================================================================
// Song rendering
// =============================================================================

#[test]
fn song_parses_all_sections() {
    let song = song::parse(SONG);
    assert_eq!(song.name, "Pipeline");
    assert_eq!(song.tempo(), 124);
    assert_eq!(song.bars, 2);
    assert_eq!(song.drums.as_ref().unwrap().lanes.len(), 3);
    assert_eq!(song.bass.as_ref().unwrap().preset, "acid");
    assert_eq!(song.synth.as_ref().unwrap().chords().len(), 2);
}

#[test]
fn song_mix_is_audible_and_never_clips() {
    let (song, samples) = render_song();
    let expected = (song.duration_seconds() * SAMPLE_RATE as f64) as usize;
    assert_eq!(samples.len(), expected);
    let level = peak(&samples);
    assert!(level > 0.1, "mix too quiet: {level}");
    assert!(level <= 1.0, "mix clipped: {level}");
}

#[test]
fn normalization_leaves_quiet_buffers_alone() {
    let mut quiet = vec![0.25, -0.5, 0.9];
    normalize(&mut quiet);
    assert_eq!(quiet, vec![0.25, -0.5, 0.9]);

    let mut loud = vec![0.5, -4.0, 2.0];
    normalize(&mut loud);
    assert!(loud.iter().all(|s| s.abs() <= 1.0));
    assert_eq!(loud[1], -1.0);
}

// =============================================================================
// Instruments
// =============================================================================

#[test]
fn acid_preset_renders_sixteen_steps() {
    let pattern = bass::preset("acid").unwrap();
    let samples = BassVoice::new(SAMPLE_RATE).render_pattern(&pattern);
    let step = (SAMPLE_RATE as f64 * 60.0 / (pattern.tempo as f64 * 4.0)).round() as usize;
    assert_eq!(pattern.samples_per_step(SAMPLE_RATE), step);
    assert_eq!(samples.len(), 16 * step);
    assert!(peak(&samples) > 0.0);
}

#[test]
fn every_synth_preset_renders_a_chord() {
    let voice = SynthVoice::new(SAMPLE_RATE);
    for name in synth::list_presets() {
        let patch = synth::preset(name).unwrap();
        let samples = voice.render_chord(&patch, &[60, 64, 67], 0.5, 0.8);
        assert_eq!(samples.len(), 22050, "{name}");
        assert!(peak(&samples) > 0.0, "{name} is silent");
    }
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn wav_file_matches_rendered_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("song.wav");
    let (song, samples) = render_song();
    write_wav(&path, &samples).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.bits_per_sample, 16);

    let expected = (song.duration_seconds() * 44_100.0).round() as i64;
    let written = reader.len() as i64;
    assert!((written - expected).abs() <= 1, "{written} vs {expected}");
}

#[test]
fn wav_bytes_has_riff_header() {
    let bytes = wav_bytes(&[0.0; 10]).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(bytes.len(), 44 + 20);
}

#[test]
fn midi_file_holds_one_track_per_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two.mid");

    let mut exporter = MidiExporter::new();
    exporter.add_pattern(&mml::parse("t140 l8 o3 c c g g"), 0, "Bass");
    exporter.add_drum_pattern(&groovebox::instrument::drum::basic_beat("house"));
    exporter.export(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"MThd");
    // format 1, two tracks, 480 PPQ
    assert_eq!(&bytes[8..14], &[0u8, 1, 0, 2, 0x01, 0xE0]);
    let tracks = bytes.windows(4).filter(|w| w == b"MTrk").count();
    assert_eq!(tracks, 2);
}
