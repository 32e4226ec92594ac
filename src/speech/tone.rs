//! Synthesized alert tone.
//!
//! Three staggered partials, each with a short linear attack and an
//! exponential decay. Rendered to 16-bit mono PCM, optionally wrapped as WAV.

use std::f32::consts::TAU;

/// Output sample rate for rendered tones.
pub const SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

/// One oscillator of the alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub frequency: f32,
    pub waveform: Waveform,
    /// Start offset in seconds
    pub delay: f32,
}

/// Envelope and partials of the alert tone.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTone {
    pub partials: Vec<Partial>,
    /// Linear ramp from silence to `peak`, seconds
    pub attack: f32,
    pub peak: f32,
    /// Gain reached at the end of each partial
    pub floor: f32,
    /// Lifetime of each partial, seconds
    pub length: f32,
}

impl Default for AlertTone {
    fn default() -> Self {
        let partials = (0..3)
            .map(|i| Partial {
                frequency: 600.0 + 200.0 * i as f32,
                waveform: if i == 0 { Waveform::Sine } else { Waveform::Square },
                delay: 0.1 * i as f32,
            })
            .collect();

        Self {
            partials,
            attack: 0.1,
            peak: 0.3,
            floor: 0.01,
            length: 0.5,
        }
    }
}

impl AlertTone {
    /// Total duration in seconds.
    pub fn duration(&self) -> f32 {
        self.partials
            .iter()
            .map(|p| p.delay + self.length)
            .fold(0.0, f32::max)
    }

    /// Gain of one partial `t` seconds after it starts.
    pub fn envelope(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.length {
            0.0
        } else if t < self.attack {
            self.peak * t / self.attack
        } else {
            let progress = (t - self.attack) / (self.length - self.attack);
            self.peak * (self.floor / self.peak).powf(progress)
        }
    }

    /// Render to signed 16-bit mono samples at [`SAMPLE_RATE`].
    pub fn render(&self) -> Vec<i16> {
        let total = (self.duration() * SAMPLE_RATE as f32).ceil() as usize;

        (0..total)
            .map(|n| {
                let t = n as f32 / SAMPLE_RATE as f32;
                let mixed: f32 = self
                    .partials
                    .iter()
                    .map(|p| {
                        let local = t - p.delay;
                        let gain = self.envelope(local);
                        if gain == 0.0 {
                            return 0.0;
                        }
                        let phase = (TAU * p.frequency * local).sin();
                        let value = match p.waveform {
                            Waveform::Sine => phase,
                            Waveform::Square => phase.signum(),
                        };
                        value * gain
                    })
                    .sum();
                (mixed.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })
            .collect()
    }

    /// Render as a complete WAV file.
    pub fn to_wav(&self) -> Vec<u8> {
        wav_bytes(&self.render(), SAMPLE_RATE)
    }
}

/// Wrap mono 16-bit PCM in a RIFF/WAVE container.
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
