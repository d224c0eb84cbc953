//! Standard MIDI File writer.
//!
//! One `MTrk` chunk per added pattern at 480 PPQ. A single track is written
//! as format 0, several as format 1. The first track carries the tempo.

use std::path::Path;

use super::ExportError;
use crate::beat::TICKS_PER_BEAT;
use crate::instrument::drum;
use crate::mml::{NoteEvent, Pattern};

/// General MIDI percussion channel (channel 10, zero-based).
pub const DRUM_CHANNEL: u8 = 9;

const DEFAULT_TEMPO: u32 = 120;
const MAX_TRACK_NAME_BYTES: usize = 127;

/// Encode a MIDI variable-length quantity: seven bits per byte, most
/// significant group first, continuation bit set on all but the last byte.
///
/// ```
/// use groovebox::export::encode_vlq;
/// assert_eq!(encode_vlq(0), vec![0x00]);
/// assert_eq!(encode_vlq(128), vec![0x81, 0x00]);
/// assert_eq!(encode_vlq(16_383), vec![0xFF, 0x7F]);
/// ```
pub fn encode_vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

/// Decode a variable-length quantity from the front of `bytes`, returning
/// the value and the number of bytes read. `None` when the input ends
/// mid-quantity or runs past the four bytes MIDI allows.
pub fn decode_vlq(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(4).enumerate() {
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEventKind {
    TrackName(String),
    /// Microseconds per quarter note.
    Tempo(u32),
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    EndOfTrack,
}

/// A track event at an absolute tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    pub tick: u64,
    pub channel: u8,
    pub kind: MidiEventKind,
}

impl MidiEvent {
    fn meta(tick: u64, kind: MidiEventKind) -> Self {
        Self { tick, channel: 0, kind }
    }

    /// Append the status and data bytes, without the delta time.
    fn write(&self, out: &mut Vec<u8>) {
        match &self.kind {
            MidiEventKind::TrackName(name) => {
                let bytes = truncate_utf8(name, MAX_TRACK_NAME_BYTES);
                out.extend_from_slice(&[0xFF, 0x03]);
                out.extend(encode_vlq(bytes.len() as u32));
                out.extend_from_slice(bytes);
            }
            MidiEventKind::Tempo(us) => {
                out.extend_from_slice(&[0xFF, 0x51, 0x03]);
                out.extend_from_slice(&us.to_be_bytes()[1..]);
            }
            MidiEventKind::NoteOn { note, velocity } => {
                out.extend_from_slice(&[0x90 | self.channel, *note, *velocity]);
            }
            MidiEventKind::NoteOff { note } => {
                out.extend_from_slice(&[0x80 | self.channel, *note, 0]);
            }
            MidiEventKind::EndOfTrack => out.extend_from_slice(&[0xFF, 0x2F, 0x00]),
        }
    }
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate_utf8(text: &str, max: usize) -> &[u8] {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}

/// One pattern queued for export.
#[derive(Debug, Clone)]
struct ExportTrack {
    name: String,
    channel: u8,
    notes: Vec<NoteEvent>,
    length_ticks: u64,
}

/// Collects patterns and writes them as one MIDI file.
///
/// ```no_run
/// use groovebox::export::MidiExporter;
/// use groovebox::instrument::drum;
///
/// let mut exporter = MidiExporter::new();
/// exporter.add_drum_pattern(&drum::basic_beat("house"));
/// exporter.add_pattern(&groovebox::mml::parse("t125 o2 l8 c c g c"), 0, "Bass");
/// exporter.export("song.mid".as_ref())?;
/// # Ok::<(), groovebox::export::ExportError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MidiExporter {
    tracks: Vec<ExportTrack>,
    tempo: u32,
}

impl MidiExporter {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            tempo: DEFAULT_TEMPO,
        }
    }

    /// Tempo written to the first track, in BPM.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = crate::beat::clamp_tempo(bpm);
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Queue a melodic pattern on `channel` (0-15). An empty `name` uses the
    /// pattern's name. The file tempo follows the most recently added
    /// pattern.
    pub fn add_pattern(&mut self, pattern: &Pattern, channel: u8, name: &str) {
        let name = if name.is_empty() { pattern.name.as_str() } else { name };
        self.tempo = pattern.tempo();
        self.tracks.push(ExportTrack {
            name: name.to_string(),
            channel: channel.min(15),
            notes: pattern.events(),
            length_ticks: pattern.total_ticks(),
        });
    }

    /// Queue a drum pattern on the GM drum channel, with note letters mapped
    /// to GM percussion numbers. The track is named `Drums`.
    pub fn add_drum_pattern(&mut self, pattern: &Pattern) {
        let notes = drum::hits(pattern)
            .into_iter()
            .map(|hit| NoteEvent {
                tick: hit.tick,
                midi_note: hit.midi_note(),
                velocity: hit.velocity,
                duration: hit.duration,
                note_index: 0,
            })
            .collect();
        self.tempo = pattern.tempo();
        self.tracks.push(ExportTrack {
            name: "Drums".to_string(),
            channel: DRUM_CHANNEL,
            notes,
            length_ticks: pattern.total_ticks(),
        });
    }

    /// Drop every queued pattern.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Events of every track in write order. With nothing queued this is a
    /// single track holding only the end marker.
    pub fn build_tracks(&self) -> Vec<Vec<MidiEvent>> {
        if self.tracks.is_empty() {
            return vec![vec![MidiEvent::meta(0, MidiEventKind::EndOfTrack)]];
        }

        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let mut events = Vec::new();
                if !track.name.is_empty() {
                    events.push(MidiEvent::meta(0, MidiEventKind::TrackName(track.name.clone())));
                }
                if index == 0 {
                    events.push(MidiEvent::meta(0, MidiEventKind::Tempo(60_000_000 / self.tempo.max(1))));
                }

                let mut notes = Vec::with_capacity(track.notes.len() * 2);
                for note in &track.notes {
                    notes.push(MidiEvent {
                        tick: note.tick,
                        channel: track.channel,
                        kind: MidiEventKind::NoteOn {
                            note: note.midi_note,
                            velocity: note.velocity,
                        },
                    });
                    // one tick early so the next onset never overlaps
                    notes.push(MidiEvent {
                        tick: note.tick + note.duration.saturating_sub(1),
                        channel: track.channel,
                        kind: MidiEventKind::NoteOff { note: note.midi_note },
                    });
                }
                notes.sort_by_key(|e| (e.tick, !matches!(e.kind, MidiEventKind::NoteOn { .. })));
                events.extend(notes);

                events.push(MidiEvent::meta(track.length_ticks, MidiEventKind::EndOfTrack));
                events
            })
            .collect()
    }

    /// The complete file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tracks = self.build_tracks();
        let format: u16 = if tracks.len() == 1 { 0 } else { 1 };

        let mut out = Vec::new();
        out.extend_from_slice(b"MThd");
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&format.to_be_bytes());
        out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&(TICKS_PER_BEAT as u16).to_be_bytes());

        for events in &tracks {
            let mut data = Vec::new();
            let mut last_tick = 0;
            for event in events {
                let delta = event.tick.saturating_sub(last_tick);
                data.extend(encode_vlq(delta.min(0x0FFF_FFFF) as u32));
                last_tick = last_tick.max(event.tick);
                event.write(&mut data);
            }
            out.extend_from_slice(b"MTrk");
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend(data);
        }
        out
    }

    /// Write the file to `path`, creating parent directories as needed.
    pub fn export(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes();
        std::fs::write(path, &bytes)?;
        log::info!(
            target: "export",
            "wrote {} MIDI track(s), {} bytes to {}",
            self.tracks.len().max(1),
            bytes.len(),
            path.display()
        );
        Ok(())
    }
}

impl Default for MidiExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mml::parse;

    #[test]
    fn vlq_uses_minimum_bytes() {
        for (value, len) in [(0, 1), (127, 1), (128, 2), (16_383, 2), (16_384, 3), (0x0FFF_FFFF, 4)] {
            let bytes = encode_vlq(value);
            assert_eq!(bytes.len(), len, "{value}");
            assert_eq!(decode_vlq(&bytes), Some((value, len)));
        }
    }

    #[test]
    fn vlq_known_encodings() {
        assert_eq!(encode_vlq(0x40), vec![0x40]);
        assert_eq!(encode_vlq(0x2000), vec![0xC0, 0x00]);
        assert_eq!(encode_vlq(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn vlq_decode_stops_at_last_byte() {
        assert_eq!(decode_vlq(&[0x81, 0x00, 0x55]), Some((128, 2)));
        assert_eq!(decode_vlq(&[0x81]), None);
        assert_eq!(decode_vlq(&[]), None);
        assert_eq!(decode_vlq(&[0x80, 0x80, 0x80, 0x80, 0x00]), None);
    }

    #[test]
    fn empty_exporter_writes_one_empty_track() {
        let bytes = MidiExporter::new().to_bytes();
        assert_eq!(&bytes[..4], b"MThd");
        // format 0, one track, 480 PPQ
        assert_eq!(&bytes[8..14], &[0, 0, 0, 1, 0x01, 0xE0]);
        assert_eq!(&bytes[14..18], b"MTrk");
        assert_eq!(&bytes[18..], &[0, 0, 0, 4, 0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn single_pattern_events() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("t150 l4 o4 c d"), 2, "Lead");
        assert_eq!(exporter.tempo(), 150);

        let tracks = exporter.build_tracks();
        assert_eq!(tracks.len(), 1);
        let kinds: Vec<(u64, MidiEventKind)> = tracks[0].iter().map(|e| (e.tick, e.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (0, MidiEventKind::TrackName("Lead".to_string())),
                (0, MidiEventKind::Tempo(400_000)),
                (0, MidiEventKind::NoteOn { note: 60, velocity: 101 }),
                (479, MidiEventKind::NoteOff { note: 60 }),
                (480, MidiEventKind::NoteOn { note: 62, velocity: 101 }),
                (959, MidiEventKind::NoteOff { note: 62 }),
                (960, MidiEventKind::EndOfTrack),
            ]
        );
        assert!(tracks[0][2..4].iter().all(|e| e.channel == 2));
    }

    #[test]
    fn tempo_meta_bytes() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("t120 c"), 0, "x");
        let bytes = exporter.to_bytes();
        let needle = [0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn note_bytes_with_deltas() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("t120 v15 l4 c"), 0, "");
        let bytes = exporter.to_bytes();
        // name "" falls back to the pattern name, which is empty: no name event
        let track = &bytes[22..];
        let tempo_len = 1 + 6;
        let notes = &track[tempo_len..];
        assert_eq!(&notes[..4], &[0x00, 0x90, 60, 127]);
        // 479 = 0x83 0x5F
        assert_eq!(&notes[4..9], &[0x83, 0x5F, 0x80, 60, 0]);
        assert_eq!(&notes[9..], &[0x01, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn rests_shift_later_notes() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("l4 r c"), 0, "");
        let tracks = exporter.build_tracks();
        let on = tracks[0]
            .iter()
            .find(|e| matches!(e.kind, MidiEventKind::NoteOn { .. }))
            .unwrap();
        assert_eq!(on.tick, 480);
    }

    #[test]
    fn ties_merge_into_one_note() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("l4 c&c"), 0, "");
        let tracks = exporter.build_tracks();
        let offs: Vec<u64> = tracks[0]
            .iter()
            .filter(|e| matches!(e.kind, MidiEventKind::NoteOff { .. }))
            .map(|e| e.tick)
            .collect();
        assert_eq!(offs, vec![959]);
    }

    #[test]
    fn multi_track_is_format_one_with_single_tempo() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("t100 c d"), 0, "Bass");
        exporter.add_drum_pattern(&drum::parse_pattern("t130 l8 c d"));
        let bytes = exporter.to_bytes();
        assert_eq!(&bytes[8..12], &[0, 1, 0, 2]);
        assert_eq!(bytes.windows(4).filter(|w| *w == b"MTrk").count(), 2);

        let tracks = exporter.build_tracks();
        let tempos = tracks
            .iter()
            .flatten()
            .filter(|e| matches!(e.kind, MidiEventKind::Tempo(_)))
            .count();
        assert_eq!(tempos, 1);
        // the last added pattern sets the tempo
        assert!(tracks[0].contains(&MidiEvent::meta(0, MidiEventKind::Tempo(60_000_000 / 130))));
    }

    #[test]
    fn drum_pattern_uses_gm_channel_and_notes() {
        let mut exporter = MidiExporter::new();
        exporter.add_drum_pattern(&drum::parse_pattern("l16 c d a b"));
        let tracks = exporter.build_tracks();
        assert_eq!(tracks[0][0].kind, MidiEventKind::TrackName("Drums".to_string()));
        let notes: Vec<(u8, u8)> = tracks[0]
            .iter()
            .filter_map(|e| match e.kind {
                MidiEventKind::NoteOn { note, .. } => Some((e.channel, note)),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![(9, 36), (9, 38), (9, 42), (9, 46)]);
    }

    #[test]
    fn note_on_sorts_before_note_off_on_same_tick() {
        let note = |tick, midi_note| NoteEvent {
            tick,
            midi_note,
            velocity: 100,
            duration: 1,
            note_index: 0,
        };
        let mut exporter = MidiExporter::new();
        exporter.tracks.push(ExportTrack {
            name: String::new(),
            channel: 0,
            notes: vec![note(5, 64), note(0, 60)],
            length_ticks: 6,
        });
        let kinds: Vec<(u64, bool)> = exporter.build_tracks()[0]
            .iter()
            .filter_map(|e| match e.kind {
                MidiEventKind::NoteOn { .. } => Some((e.tick, true)),
                MidiEventKind::NoteOff { .. } => Some((e.tick, false)),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![(0, true), (0, false), (5, true), (5, false)]);
    }

    #[test]
    fn clear_drops_tracks() {
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("c"), 0, "a");
        exporter.clear();
        assert_eq!(exporter.track_count(), 0);
        assert_eq!(exporter.build_tracks().len(), 1);
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "é".repeat(100);
        let bytes = truncate_utf8(&name, MAX_TRACK_NAME_BYTES);
        assert_eq!(bytes.len(), 126);
        assert!(std::str::from_utf8(bytes).is_ok());
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("midi").join("out.mid");
        let mut exporter = MidiExporter::new();
        exporter.add_pattern(&parse("c e g"), 0, "Arp");
        exporter.export(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), exporter.to_bytes());
    }
}
