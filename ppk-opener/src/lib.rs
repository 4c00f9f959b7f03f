//! # PPK Box Opener Library (ppk-opener)
//!
//! Opens a parcel box from its scanned code: the code is sent to the remote
//! access-control API, the returned archive is unpacked and the audio token
//! inside it is played to the box.
//!
//! **Architecture:** scanner → access API (reqwest) → unpacker (base64 + zip)
//! → player (symphonia + rubato + cpal), driven by [`cycle::CycleRunner`];
//! [`session::run_scan_session`] repeats cycles for interactive use.

pub mod api;
pub mod audio;
pub mod config;
pub mod cycle;
pub mod error;
pub mod player;
pub mod scanner;
pub mod session;
pub mod unpack;

pub use cycle::{CycleOutcome, CycleRunner};
pub use error::{Error, Result};
