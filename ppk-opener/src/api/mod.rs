//! Remote access-control API
//!
//! - `types`: open-box request and response bodies
//! - `client`: HTTP client performing the open-box call

pub mod client;
pub mod types;

pub use client::{AccessApi, AccessClient};
pub use types::{AccessRequest, AccessResponse, BoxId};
