//! Player double that records start calls

use ppk_opener::error::{Error, Result};
use ppk_opener::player::{PlaybackHandle, Player};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingPlayer {
    fail: bool,
    calls: Mutex<Vec<PathBuf>>,
    /// File contents observed at the time of each call
    contents: Mutex<Vec<Option<Vec<u8>>>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Player whose start always fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contents(&self) -> Vec<Option<Vec<u8>>> {
        self.contents.lock().unwrap().clone()
    }
}

impl Player for RecordingPlayer {
    fn start(&self, path: &Path) -> Result<PlaybackHandle> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        self.contents.lock().unwrap().push(std::fs::read(path).ok());

        if self.fail {
            return Err(Error::Playback("no output device".to_string()));
        }
        Ok(PlaybackHandle::completed(path.to_path_buf()))
    }
}
