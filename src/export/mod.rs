//! Exporters for Standard MIDI Files and 16-bit mono WAV.

pub mod midi;
pub mod wav;

pub use midi::{decode_vlq, encode_vlq, MidiEvent, MidiEventKind, MidiExporter};
pub use wav::{wav_bytes, write_wav};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}
