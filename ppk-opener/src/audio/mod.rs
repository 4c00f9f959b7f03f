//! Audio token playback pipeline
//!
//! - `decoder`: WAV (and other PCM containers) to interleaved f32 via symphonia
//! - `resampler`: sample rate conversion to the device rate via rubato
//! - `output`: cpal output stream fed from a decoded buffer

pub mod decoder;
pub mod output;
pub mod resampler;

pub use decoder::{DecodedAudio, WavDecoder};
pub use output::AudioOutput;
pub use resampler::Resampler;
