//! Scan cycle orchestration
//!
//! One cycle: request the box to open, unpack the returned token, play it.
//! Every transition is published on the [`EventBus`]. Only one cycle may be in
//! flight at a time; a cycle stays in flight until its playback ends.

use crate::api::{AccessApi, BoxId};
use crate::error::{Error, Result};
use crate::player::{find_audio_entry, PlaybackHandle, Player};
use crate::unpack::{decode_payload, resolve_entry_path, Unpacker};
use chrono::Utc;
use ppk_common::events::{CycleEvent, CycleState, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of a successful cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    /// Extracted entry names in archive order
    pub entries: Vec<String>,
    /// Running playback of the audio token
    pub playback: PlaybackHandle,
}

/// Clears the in-flight flag when dropped
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives scan cycles
pub struct CycleRunner<A> {
    api: A,
    unpacker: Unpacker,
    player: Arc<dyn Player>,
    events: EventBus,
    expected_entry: String,
    keep_artifacts: bool,
    in_flight: Arc<AtomicBool>,
}

impl<A: AccessApi> CycleRunner<A> {
    pub fn new(
        api: A,
        unpacker: Unpacker,
        player: Arc<dyn Player>,
        events: EventBus,
        expected_entry: impl Into<String>,
    ) -> Self {
        Self {
            api,
            unpacker,
            player,
            events,
            expected_entry: expected_entry.into(),
            keep_artifacts: false,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Keep the saved archive and extracted files after the cycle
    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Publish `Scanning` for a cycle about to start; returns its id
    pub fn begin_scan(&self) -> Uuid {
        let cycle_id = Uuid::new_v4();
        self.set_state(cycle_id, CycleState::Scanning);
        cycle_id
    }

    /// Close a scan attempt that never produced a code
    pub fn fail_scan(&self, cycle_id: Uuid, error: &Error) {
        warn!(%cycle_id, error = %error, "Scan attempt failed");
        self.set_state(cycle_id, CycleState::error(error.to_string()));
    }

    /// Run a cycle for freshly scanned text
    pub async fn run(&self, scanned: &str) -> Result<CycleOutcome> {
        self.run_cycle(Uuid::new_v4(), scanned).await
    }

    /// Run a cycle under a known id (see [`CycleRunner::begin_scan`]).
    ///
    /// Fails with [`Error::Busy`] without publishing anything if another
    /// cycle is still in flight.
    pub async fn run_cycle(&self, cycle_id: Uuid, scanned: &str) -> Result<CycleOutcome> {
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(Error::Busy)?;
        let box_id = BoxId::new(scanned);
        let span = info_span!("cycle", %cycle_id, box_id = %box_id);

        async move {
            self.set_state(
                cycle_id,
                CycleState::Scanned {
                    box_id: box_id.to_string(),
                },
            );

            self.set_state(cycle_id, CycleState::Idle);

            match self.execute(cycle_id, &box_id).await {
                Ok((entries, handle)) => {
                    // Success goes out before the watcher can report the end
                    self.set_state(cycle_id, CycleState::Success);
                    let playback = self.watch_playback(cycle_id, handle, guard);
                    Ok(CycleOutcome {
                        cycle_id,
                        entries,
                        playback,
                    })
                }
                Err(e) => {
                    warn!(error = %e, retryable = e.is_retryable(), "Scan cycle failed");
                    if !self.keep_artifacts {
                        self.discard_artifacts().await;
                    }
                    self.set_state(cycle_id, CycleState::error(e.to_string()));
                    drop(guard);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Request, unpack and start playback. Returns extracted entries and the
    /// started playback.
    async fn execute(&self, cycle_id: Uuid, box_id: &BoxId) -> Result<(Vec<String>, PlaybackHandle)> {
        self.set_state(cycle_id, CycleState::Connecting);
        self.set_state(cycle_id, CycleState::Sending);
        let response = self.api.open_box(box_id).await?;

        self.set_state(cycle_id, CycleState::Processing);
        let unpacker = self.unpacker.clone();
        let keep_artifacts = self.keep_artifacts;
        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let bytes = decode_payload(&response.data)?;
            let entries = unpacker.unpack(&bytes)?;
            if !keep_artifacts {
                unpacker.remove_archive()?;
            }
            Ok(entries)
        })
        .await
        .map_err(|e| Error::Internal(format!("Unpack task failed: {}", e)))??;

        info!(entries = %entries.join(", "), "Extracted files");
        self.events.emit_lossy(CycleEvent::EntriesExtracted {
            cycle_id,
            entries: entries.clone(),
            timestamp: Utc::now(),
        });

        let entry = find_audio_entry(&entries, &self.expected_entry).ok_or_else(|| {
            Error::MissingAudio {
                expected: self.expected_entry.clone(),
            }
        })?;
        let audio_path = resolve_entry_path(self.unpacker.extract_dir(), entry)?;

        self.set_state(cycle_id, CycleState::Playing);
        let player = Arc::clone(&self.player);
        let handle = tokio::task::spawn_blocking(move || player.start(&audio_path))
            .await
            .map_err(|e| Error::Internal(format!("Playback task failed: {}", e)))??;

        Ok((entries, handle))
    }

    async fn discard_artifacts(&self) {
        let unpacker = self.unpacker.clone();
        match tokio::task::spawn_blocking(move || unpacker.cleanup()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to remove leftover files"),
            Err(e) => warn!(error = %e, "Cleanup task failed"),
        }
    }

    /// Follow a running playback: report its end, clean up, release the cycle
    fn watch_playback(
        &self,
        cycle_id: Uuid,
        handle: PlaybackHandle,
        guard: InFlightGuard,
    ) -> PlaybackHandle {
        let (tx, rx) = oneshot::channel();
        let path = handle.path().to_path_buf();
        let handle_path = path.clone();
        let events = self.events.clone();
        let unpacker = self.unpacker.clone();
        let keep_artifacts = self.keep_artifacts;

        tokio::spawn(async move {
            let result = handle.finished().await;

            if !keep_artifacts {
                let cleanup = tokio::task::spawn_blocking(move || unpacker.cleanup()).await;
                match cleanup {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%cycle_id, error = %e, "Failed to remove extracted files"),
                    Err(e) => warn!(%cycle_id, error = %e, "Cleanup task failed"),
                }
            }

            events.emit_lossy(CycleEvent::PlaybackFinished {
                cycle_id,
                path,
                error: result.as_ref().err().map(|e| e.to_string()),
                timestamp: Utc::now(),
            });
            drop(guard);
            let _ = tx.send(result);
        });

        PlaybackHandle::new(handle_path, rx)
    }

    fn set_state(&self, cycle_id: Uuid, state: CycleState) {
        info!(%cycle_id, status = %state, "Cycle state changed");
        self.events.emit_lossy(CycleEvent::state_changed(cycle_id, state));
    }
}
