//! Scan cycle states and the event bus
//!
//! One scan cycle walks `Scanning → Scanned → Idle → Connecting → Sending →
//! Processing → Playing → (Success | Error)`. Every transition is published
//! on the [`EventBus`]; front ends render [`CycleState`] with `Display`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Externally visible state of one scan cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleState {
    /// Code accepted, request not started yet
    Idle,
    Scanning,
    Scanned { box_id: String },
    Connecting,
    Sending,
    Processing,
    Playing,
    Success,
    Error { message: String },
}

impl CycleState {
    /// True for `Success` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Success | CycleState::Error { .. })
    }

    pub fn error(message: impl Into<String>) -> Self {
        CycleState::Error {
            message: message.into(),
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::Idle => write!(f, "Processing..."),
            CycleState::Scanning => write!(f, "Scanning..."),
            CycleState::Scanned { box_id } => write!(f, "Scanned Box ID: {}", box_id),
            CycleState::Connecting => write!(f, "Connecting to server..."),
            CycleState::Sending => write!(f, "Sending request..."),
            CycleState::Processing => write!(f, "Processing response..."),
            CycleState::Playing => write!(f, "Playing audio..."),
            CycleState::Success => write!(f, "Success! Audio played"),
            CycleState::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Events published during a scan cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CycleEvent {
    /// Cycle moved to a new state
    StateChanged {
        cycle_id: Uuid,
        state: CycleState,
        timestamp: DateTime<Utc>,
    },

    /// Archive entries written to the extraction directory, in archive order
    EntriesExtracted {
        cycle_id: Uuid,
        entries: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Audio playback ended (error is set when the stream failed mid-way)
    PlaybackFinished {
        cycle_id: Uuid,
        path: PathBuf,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl CycleEvent {
    pub fn state_changed(cycle_id: Uuid, state: CycleState) -> Self {
        CycleEvent::StateChanged {
            cycle_id,
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn cycle_id(&self) -> Uuid {
        match self {
            CycleEvent::StateChanged { cycle_id, .. }
            | CycleEvent::EntriesExtracted { cycle_id, .. }
            | CycleEvent::PlaybackFinished { cycle_id, .. } => *cycle_id,
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// observe `Lagged` instead of stalling the cycle.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CycleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CycleEvent,
    ) -> Result<usize, broadcast::error::SendError<CycleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CycleEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
