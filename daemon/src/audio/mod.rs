//! Audio input for wake windows and command capture

mod microphone;

use std::time::Duration;

use crate::error::{Error, Result};

pub use microphone::Microphone;

/// Sample rate requested from the input device (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// One captured audio segment, mono f32 samples
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Encode as 16-bit PCM WAV for STT uploads
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| Error::Audio(e.to_string()))?;

            for &sample in &self.samples {
                let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(sample_i16)
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }

            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

/// Bounds for one listen call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenParams {
    /// How long to wait for speech to start; `None` waits forever
    pub timeout: Option<Duration>,
    /// Maximum phrase length once speech started
    pub phrase_limit: Duration,
    /// Trailing silence that ends the phrase
    pub pause: Duration,
}

/// Source of spoken audio
///
/// `listen` returns `Ok(None)` when the timeout elapses before any speech.
pub trait AudioSource: Send {
    /// Measure ambient noise and adapt the speech threshold
    fn calibrate(&mut self, duration: Duration) -> Result<()>;

    /// Record one phrase
    fn listen(&mut self, params: &ListenParams) -> Result<Option<AudioClip>>;

    /// Play the short "listening" cue
    fn play_cue(&mut self) -> Result<()>;
}

/// RMS energy of audio samples
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
