//! Test helper modules for ppk-opener integration tests
//!
//! - mock access API: axum server on an ephemeral port
//! - fixtures: in-memory ZIP archives and WAV tokens
//! - RecordingPlayer: Player that records calls instead of touching audio hardware

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_api;
pub mod recording_player;

pub use fixtures::{build_zip, sine_wav_bytes, token_response_body, ZipEntry};
pub use mock_api::{start_mock_api, MockAccessApi, RecordedRequest};
pub use recording_player::RecordingPlayer;
