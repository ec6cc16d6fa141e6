//! Microphone capture with energy-based phrase detection

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, trace};

use super::{rms_energy, AudioClip, AudioSource, ListenParams, SAMPLE_RATE};
use crate::error::{Error, Result};

/// Analysis frame length
const FRAME_MS: u32 = 30;

/// How often the capture loop drains the device buffer
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Audio kept from before speech started so the first syllable survives
const PRE_ROLL_MS: u32 = 300;

/// Ambient energy multiplier used by calibration
const DYNAMIC_RATIO: f32 = 1.5;

const CUE_FREQUENCY_HZ: f32 = 1000.0;
const CUE_DURATION: Duration = Duration::from_millis(180);
const CUE_AMPLITUDE: f32 = 0.3;

/// Progress of one phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhraseStatus {
    /// No speech yet
    Waiting,
    /// Speech started, still accumulating
    Recording,
    /// Enough trailing silence or the phrase limit was reached
    Complete,
}

/// Splits a frame stream into one spoken phrase
pub(crate) struct PhraseDetector {
    threshold: f32,
    pause_samples: usize,
    limit_samples: usize,
    pre_roll_cap: usize,
    pre_roll: VecDeque<f32>,
    phrase: Vec<f32>,
    started: bool,
    silence: usize,
}

impl PhraseDetector {
    pub(crate) fn new(threshold: f32, sample_rate: u32, params: &ListenParams) -> Self {
        let rate = sample_rate as f32;
        Self {
            threshold,
            pause_samples: (params.pause.as_secs_f32() * rate) as usize,
            limit_samples: (params.phrase_limit.as_secs_f32() * rate) as usize,
            pre_roll_cap: (sample_rate * PRE_ROLL_MS / 1000) as usize,
            pre_roll: VecDeque::new(),
            phrase: Vec::new(),
            started: false,
            silence: 0,
        }
    }

    /// Feed one analysis frame
    pub(crate) fn push(&mut self, frame: &[f32]) -> PhraseStatus {
        let is_speech = rms_energy(frame) > self.threshold;

        if !self.started {
            if !is_speech {
                self.pre_roll.extend(frame.iter().copied());
                while self.pre_roll.len() > self.pre_roll_cap {
                    self.pre_roll.pop_front();
                }
                return PhraseStatus::Waiting;
            }
            trace!(threshold = self.threshold, "speech started");
            self.started = true;
            self.phrase.extend(self.pre_roll.drain(..));
        }

        self.phrase.extend_from_slice(frame);
        if is_speech {
            self.silence = 0;
        } else {
            self.silence += frame.len();
        }

        if self.silence >= self.pause_samples || self.phrase.len() >= self.limit_samples {
            PhraseStatus::Complete
        } else {
            PhraseStatus::Recording
        }
    }

    pub(crate) fn has_started(&self) -> bool {
        self.started
    }

    pub(crate) fn into_samples(self) -> Vec<f32> {
        self.phrase
    }
}

/// Default input device, opened fresh for every listen call
pub struct Microphone {
    threshold: f32,
    min_threshold: f32,
}

impl Microphone {
    /// Create a microphone source with a minimum speech threshold
    pub fn new(min_threshold: f32) -> Self {
        Self {
            threshold: min_threshold,
            min_threshold,
        }
    }
}

impl AudioSource for Microphone {
    fn calibrate(&mut self, duration: Duration) -> Result<()> {
        let input = InputStream::open()?;
        thread::sleep(duration);
        let ambient = rms_energy(&input.take());

        self.threshold = (ambient * DYNAMIC_RATIO).max(self.min_threshold);
        debug!(ambient, threshold = self.threshold, "ambient noise calibrated");
        Ok(())
    }

    fn listen(&mut self, params: &ListenParams) -> Result<Option<AudioClip>> {
        let input = InputStream::open()?;
        let frame_len = (input.sample_rate * FRAME_MS / 1000) as usize;
        let mut detector = PhraseDetector::new(self.threshold, input.sample_rate, params);
        let mut pending: Vec<f32> = Vec::new();
        let started = Instant::now();

        loop {
            thread::sleep(POLL_INTERVAL);
            pending.extend(input.take());

            let mut complete = false;
            while pending.len() >= frame_len && !complete {
                let frame: Vec<f32> = pending.drain(..frame_len).collect();
                complete = detector.push(&frame) == PhraseStatus::Complete;
            }
            if complete {
                break;
            }

            if !detector.has_started() {
                if let Some(timeout) = params.timeout {
                    if started.elapsed() >= timeout {
                        trace!(?timeout, "no speech before timeout");
                        return Ok(None);
                    }
                }
            }
        }

        let clip = AudioClip::new(detector.into_samples(), input.sample_rate);
        debug!(duration_ms = clip.duration().as_millis() as u64, "phrase captured");
        Ok(Some(clip))
    }

    fn play_cue(&mut self) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(Error::Audio("cue playback requires f32 output".to_string()));
        }

        let config = supported.config();
        let channels = usize::from(config.channels);
        let rate = config.sample_rate.0 as f32;
        let total = (rate * CUE_DURATION.as_secs_f32()) as usize;
        let mut position = 0usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = if position < total {
                            (position as f32 * CUE_FREQUENCY_HZ * TAU / rate).sin() * CUE_AMPLITUDE
                        } else {
                            0.0
                        };
                        position += 1;
                        frame.fill(value);
                    }
                },
                |err| error!(error = %err, "cue playback error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        thread::sleep(CUE_DURATION + Duration::from_millis(40));
        Ok(())
    }
}

/// A running input stream downmixed to mono
struct InputStream {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

impl InputStream {
    fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let (config, sample_format) = input_config(&device)?;
        let buffer = Arc::new(Mutex::new(Vec::new()));

        let stream = match sample_format {
            SampleFormat::F32 => build_input::<f32>(&device, &config, Arc::clone(&buffer)),
            SampleFormat::I16 => build_input::<i16>(&device, &config, Arc::clone(&buffer)),
            SampleFormat::U16 => build_input::<u16>(&device, &config, Arc::clone(&buffer)),
            other => Err(Error::Audio(format!("unsupported sample format {other:?}"))),
        }?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            buffer,
            sample_rate: config.sample_rate.0,
        })
    }

    /// Samples captured since the last call
    fn take(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

/// Prefer 16kHz mono f32, else whatever the device defaults to
fn input_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
    let preferred = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        });

    let supported = match preferred {
        Some(range) => range.with_sample_rate(SampleRate(SAMPLE_RATE)),
        None => device
            .default_input_config()
            .map_err(|e| Error::Audio(e.to_string()))?,
    };

    Ok((supported.config(), supported.sample_format()))
}

fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend(data.chunks(channels).map(|frame| {
                        frame.iter().map(|s| f32::from_sample(*s)).sum::<f32>() / frame.len() as f32
                    }));
                }
            },
            |err| error!(error = %err, "audio capture error"),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}
