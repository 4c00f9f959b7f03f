//! # PPK Common Library
//!
//! Shared code for the parcel box opener workspace:
//! - Bootstrap configuration (TOML, environment, compiled defaults)
//! - Storage folder resolution
//! - Scan cycle states and the event bus
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{CycleEvent, CycleState, EventBus};
