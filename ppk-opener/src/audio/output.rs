//! Audio output using cpal
//!
//! Plays one in-memory buffer through the selected device and reports when
//! the buffer has been drained.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shortest wait after drain before the stream may be released
const MIN_DRAIN_TAIL: Duration = Duration::from_millis(20);

/// Interleaved samples already shaped for the device (rate and channels)
struct PlaybackCursor {
    samples: Vec<f32>,
    position: AtomicUsize,
    /// Size of the most recent device buffer, in samples
    last_buffer_len: AtomicUsize,
    drained: AtomicBool,
}

impl PlaybackCursor {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: AtomicUsize::new(0),
            last_buffer_len: AtomicUsize::new(0),
            drained: AtomicBool::new(false),
        }
    }

    /// Fill one device buffer.
    ///
    /// Drained is only reported by a callback that starts past the last
    /// sample, i.e. once the buffer carrying the tail was handed to the device.
    fn fill<T: SizedSample + FromSample<f32>>(&self, data: &mut [T], volume: f32) {
        let len = self.samples.len();
        let start = self.position.load(Ordering::Relaxed);
        let mut pos = start;

        for slot in data.iter_mut() {
            let value = if pos < len {
                let v = self.samples[pos] * volume;
                pos += 1;
                v.clamp(-1.0, 1.0)
            } else {
                0.0
            };
            *slot = T::from_sample(value);
        }

        self.position.store(pos, Ordering::Relaxed);
        self.last_buffer_len.store(data.len(), Ordering::Relaxed);
        if start >= len {
            self.drained.store(true, Ordering::Release);
        }
    }
}

/// Playback time of one device buffer of `buffer_len` interleaved samples
fn buffer_period(buffer_len: usize, channels: u16, sample_rate: u32) -> Duration {
    if channels == 0 || sample_rate == 0 {
        return MIN_DRAIN_TAIL;
    }
    let frames = buffer_len / channels as usize;
    Duration::from_secs_f64(frames as f64 / sample_rate as f64).max(MIN_DRAIN_TAIL)
}

/// Audio output manager using cpal
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    volume: f32,
    stream: Option<Stream>,
    cursor: Option<Arc<PlaybackCursor>>,
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<&str>, volume: f32) -> Result<Self> {
        let host = cpal::default_host();

        let named = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;
                let found = devices.find(|d| d.name().ok().as_deref() == Some(name));
                if found.is_none() {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
                found
            }
            None => None,
        };

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Audio device opened"
        );

        Ok(Self {
            device,
            config,
            sample_format,
            volume: volume.clamp(0.0, 1.0),
            stream: None,
            cursor: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start playing `samples` (interleaved, device rate and channel count).
    ///
    /// Returns once the stream is running.
    pub fn start(&mut self, samples: Vec<f32>) -> Result<()> {
        let cursor = Arc::new(PlaybackCursor::new(samples));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(Arc::clone(&cursor))?,
            SampleFormat::I16 => self.build_stream::<i16>(Arc::clone(&cursor))?,
            SampleFormat::U16 => self.build_stream::<u16>(Arc::clone(&cursor))?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        self.cursor = Some(cursor);
        info!("Audio stream started");
        Ok(())
    }

    fn build_stream<T>(&self, cursor: Arc<PlaybackCursor>) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let volume = self.volume;
        let error_flag = Arc::clone(&self.error_flag);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    cursor.fill(data, volume);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Block until the buffer is drained, the stream fails, or `timeout` elapses.
    ///
    /// After the drain one more device buffer period is waited so the last
    /// buffer is heard before the stream is released.
    pub fn wait_until_drained(&self, timeout: Duration) -> Result<()> {
        let cursor = self
            .cursor
            .as_ref()
            .ok_or_else(|| Error::Playback("Stream not started".to_string()))?;
        let deadline = Instant::now() + timeout;

        loop {
            if self.error_flag.load(Ordering::SeqCst) {
                return Err(Error::AudioOutput("Stream failed during playback".to_string()));
            }
            if cursor.drained.load(Ordering::Acquire) {
                let tail = buffer_period(
                    cursor.last_buffer_len.load(Ordering::Relaxed),
                    self.channels(),
                    self.sample_rate(),
                );
                debug!(tail_ms = tail.as_millis() as u64, "Buffer drained, waiting for tail");
                std::thread::sleep(tail);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Playback("Playback did not finish in time".to_string()));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Stop and release the stream
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause stream before release: {}", e);
            }
        }
        self.cursor = None;
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map interleaved audio from `src` to `dst` channels.
///
/// Mono is duplicated to every output channel. Otherwise channels are copied
/// by index: extra source channels are dropped, missing ones are silent.
pub fn remix_channels(samples: &[f32], src: u16, dst: u16) -> Vec<f32> {
    if src == dst || src == 0 || dst == 0 {
        return samples.to_vec();
    }

    let (src, dst) = (src as usize, dst as usize);
    let mut out = Vec::with_capacity(samples.len() / src * dst);
    for frame in samples.chunks_exact(src) {
        for ch in 0..dst {
            let value = if src == 1 {
                frame[0]
            } else {
                frame.get(ch).copied().unwrap_or(0.0)
            };
            out.push(value);
        }
    }
    out
}
