//! Interactive scan session
//!
//! Scan, run the cycle, wait for its playback, repeat until the scanner is
//! cancelled. A scanner that was refused access is never reopened on its own:
//! the next attempt waits for the caller's `on_denied` decision.
//!
//! Scanning and `on_denied` block, so the session needs the multi-thread
//! runtime.

use crate::api::AccessApi;
use crate::cycle::CycleRunner;
use crate::error::{Error, Result};
use crate::scanner::{ScanOptions, ScanOutcome, Scanner};
use tracing::{info, warn};

/// Prompt shown once a cycle has ended
pub const SCAN_AGAIN_PROMPT: &str = "Scan another QR code (empty line to quit)";

/// Counters for one session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Codes read from the scanner
    pub scanned: usize,
    /// Cycles that reached playback
    pub opened: usize,
    /// Cycles that ended in an error
    pub failed: usize,
    /// Attempts refused by the scanner
    pub denied: usize,
}

/// Run scan cycles until the scanner is cancelled.
///
/// On a permission denial the attempt is closed with an error status and
/// `on_denied` is called with the reason. Returning `true` starts a new
/// attempt; returning `false` ends the session with
/// [`Error::PermissionDenied`].
pub async fn run_scan_session<A, S, F>(
    runner: &CycleRunner<A>,
    scanner: &mut S,
    options: &ScanOptions,
    mut on_denied: F,
) -> Result<SessionSummary>
where
    A: AccessApi,
    S: Scanner + ?Sized,
    F: FnMut(&str) -> bool,
{
    let mut summary = SessionSummary::default();
    let mut current = options.clone();

    loop {
        let cycle_id = runner.begin_scan();
        let outcome = tokio::task::block_in_place(|| scanner.scan(&current));

        match outcome {
            ScanOutcome::Scanned(code) => {
                summary.scanned += 1;
                match runner.run_cycle(cycle_id, &code).await {
                    Ok(outcome) => {
                        summary.opened += 1;
                        if let Err(e) = outcome.playback.finished().await {
                            warn!(error = %e, "Playback did not complete");
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        info!(retryable = e.is_retryable(), "Cycle ended with error");
                    }
                }
                if !options.prompt.is_empty() {
                    current.prompt = SCAN_AGAIN_PROMPT.to_string();
                }
            }
            ScanOutcome::Cancelled => {
                info!(?summary, "Scanning cancelled");
                return Ok(summary);
            }
            ScanOutcome::PermissionDenied(reason) => {
                summary.denied += 1;
                let error = Error::PermissionDenied(reason.clone());
                runner.fail_scan(cycle_id, &error);

                if !tokio::task::block_in_place(|| on_denied(&reason)) {
                    return Err(error);
                }
            }
        }
    }
}
