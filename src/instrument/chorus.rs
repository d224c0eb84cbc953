//! Modulated-delay chorus.

use super::oscillator::Lfo;

/// Longest delay the buffer can hold, in seconds.
const MAX_DELAY_SECONDS: f64 = 0.02;
/// Fixed part of the delay, in seconds.
const BASE_DELAY_SECONDS: f64 = 0.01;
const DRY: f64 = 0.7;
const WET: f64 = 0.3;

/// Mono chorus: a sine LFO sweeps a 10 ms base delay by up to `depth`
/// seconds and the delayed signal is mixed 70/30 with the dry input.
#[derive(Debug, Clone)]
pub struct Chorus {
    sample_rate: u32,
    depth: f64,
    lfo: Lfo,
    buffer: Vec<f64>,
    write_pos: usize,
}

impl Chorus {
    /// `depth` is the modulation sweep in seconds, `rate` the LFO rate in Hz.
    pub fn new(sample_rate: u32, depth: f64, rate: f64) -> Self {
        let len = ((MAX_DELAY_SECONDS * sample_rate as f64) as usize).max(1);
        Self {
            sample_rate,
            depth: depth.clamp(0.0, MAX_DELAY_SECONDS - BASE_DELAY_SECONDS),
            lfo: Lfo::new(rate, sample_rate),
            buffer: vec![0.0; len],
            write_pos: 0,
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = input;

        let lfo = self.lfo.next_sample();
        let delay_seconds = BASE_DELAY_SECONDS + self.depth * (lfo + 1.0) * 0.5;
        let delay = ((delay_seconds * self.sample_rate as f64) as usize).min(len - 1);

        let read_pos = (self.write_pos + len - delay) % len;
        let delayed = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) % len;

        input * DRY + delayed * WET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn impulse_is_dry_then_echoed() {
        let sr = 1000;
        let mut chorus = Chorus::new(sr, 0.0, 1.0);
        let mut out = vec![chorus.process(1.0)];
        for _ in 0..19 {
            out.push(chorus.process(0.0));
        }
        assert_approx_eq!(out[0], 0.7, 1e-12);
        // 10 ms base delay at 1 kHz
        assert_approx_eq!(out[10], 0.3, 1e-12);
        assert!(out[1..10].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn silence_stays_silent() {
        let mut chorus = Chorus::new(44_100, 0.002, 0.6);
        assert!((0..2000).all(|_| chorus.process(0.0) == 0.0));
    }

    #[test]
    fn output_bounded_by_input() {
        let mut chorus = Chorus::new(44_100, 0.005, 2.0);
        for i in 0..10_000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            assert!(chorus.process(x).abs() <= 1.0 + 1e-12);
        }
    }
}
