//! Mono 16-bit PCM WAV at the engine sample rate.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use super::ExportError;
use crate::beat::SAMPLE_RATE;

fn spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Clamp to [-1, 1] and scale by 32767, truncating toward zero.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

fn write_samples<W: Write + Seek>(writer: W, samples: &[f32]) -> Result<(), ExportError> {
    let mut wav = hound::WavWriter::new(writer, spec())?;
    for &sample in samples {
        wav.write_sample(to_pcm16(sample))?;
    }
    wav.finalize()?;
    Ok(())
}

/// Write `samples` to `path`, creating parent directories as needed.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_samples(file, samples)?;
    log::info!(target: "export", "wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// The complete WAV file in memory.
pub fn wav_bytes(samples: &[f32]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    write_samples(&mut buf, samples)?;
    Ok(buf.into_inner())
}
