//! Audio token playback
//!
//! [`Player::start`] returns only once playback has actually started, so a
//! cycle reports success on a running stream rather than on an attempt.

use crate::audio::output::remix_channels;
use crate::audio::{AudioOutput, Resampler, WavDecoder};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Extra time allowed past the token duration before playback is abandoned
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Starts audio playback of an extracted token
pub trait Player: Send + Sync {
    /// Start playing `path`. Blocks until the output is running or has failed.
    fn start(&self, path: &Path) -> Result<PlaybackHandle>;
}

/// Handle to a running playback
#[derive(Debug)]
pub struct PlaybackHandle {
    path: PathBuf,
    completion: oneshot::Receiver<Result<()>>,
}

impl PlaybackHandle {
    pub fn new(path: PathBuf, completion: oneshot::Receiver<Result<()>>) -> Self {
        Self { path, completion }
    }

    /// Handle for playback that has already finished successfully
    pub fn completed(path: PathBuf) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(()));
        Self::new(path, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for playback to end
    pub async fn finished(self) -> Result<()> {
        self.completion
            .await
            .map_err(|_| Error::Playback("Playback thread ended without reporting".to_string()))?
    }
}

/// Exact, literal match of the expected entry among extracted names
pub fn find_audio_entry<'a>(entries: &'a [String], expected: &str) -> Option<&'a str> {
    entries.iter().map(String::as_str).find(|name| *name == expected)
}

/// Plays through a cpal output device
///
/// Each playback owns a dedicated thread holding the stream. The stream is
/// released when the buffer drains and on every failure path.
#[derive(Debug, Clone)]
pub struct CpalPlayer {
    device: Option<String>,
    volume: f32,
}

impl CpalPlayer {
    pub fn new(device: Option<String>, volume: f32) -> Self {
        Self { device, volume }
    }
}

impl Player for CpalPlayer {
    fn start(&self, path: &Path) -> Result<PlaybackHandle> {
        let (started_tx, started_rx) = mpsc::channel::<Result<()>>();
        let (done_tx, done_rx) = oneshot::channel::<Result<()>>();

        let device = self.device.clone();
        let volume = self.volume;
        let thread_path = path.to_path_buf();

        std::thread::Builder::new()
            .name("ppk-playback".to_string())
            .spawn(move || {
                let prepared = prepare_and_start(&thread_path, device.as_deref(), volume);
                let (output, duration) = match prepared {
                    Ok(started) => started,
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                let _ = started_tx.send(Ok(()));

                let result = output.wait_until_drained(duration + DRAIN_GRACE);
                drop(output);

                match &result {
                    Ok(()) => info!(path = %thread_path.display(), "Playback finished"),
                    Err(e) => warn!(path = %thread_path.display(), error = %e, "Playback ended with error"),
                }
                let _ = done_tx.send(result);
            })
            .map_err(|e| Error::Playback(format!("Failed to spawn playback thread: {}", e)))?;

        match started_rx.recv() {
            Ok(Ok(())) => {
                info!(path = %path.display(), "Playing audio");
                Ok(PlaybackHandle::new(path.to_path_buf(), done_rx))
            }
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Error preparing or starting playback");
                Err(match e {
                    Error::Playback(_) => e,
                    other => Error::Playback(other.to_string()),
                })
            }
            Err(_) => Err(Error::Playback("Playback thread exited before starting".to_string())),
        }
    }
}

fn prepare_and_start(path: &Path, device: Option<&str>, volume: f32) -> Result<(AudioOutput, Duration)> {
    let decoded = WavDecoder::decode_file(path)?;
    if decoded.samples.is_empty() {
        return Err(Error::Decode(format!("{} contains no audio", path.display())));
    }
    let duration = Duration::from_millis(decoded.duration_ms());

    let mut output = AudioOutput::open(device, volume)?;
    let resampled = Resampler::resample(
        &decoded.samples,
        decoded.sample_rate,
        output.sample_rate(),
        decoded.channels,
    )?;
    let shaped = remix_channels(&resampled, decoded.channels, output.channels());
    debug!(
        frames = shaped.len() / output.channels().max(1) as usize,
        "Prepared playback buffer"
    );

    output.start(shaped)?;
    Ok((output, duration))
}
