//! Cancellation and timeouts for long recognition passes

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{OcrError, Result};

/// Cooperative cancellation flag, polled by the cell and row loops
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(OcrError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run `job` on a worker thread and give up after `timeout`
///
/// On expiry the token handed to `job` is cancelled and the worker is joined,
/// so no computation outlives the call. `job` must poll the token.
pub fn run_with_timeout<T, F>(timeout: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
{
    let token = CancelToken::new();
    let (tx, rx) = bounded(1);

    let worker_token = token.clone();
    let handle = std::thread::Builder::new()
        .name("ocr-worker".to_string())
        .spawn(move || {
            let _ = tx.send(job(worker_token));
        })
        .map_err(|e| OcrError::Worker(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("Recognition exceeded {:?}, cancelling", timeout);
            token.cancel();
            let _ = handle.join();
            Err(OcrError::Timeout(timeout.as_millis() as u64))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            Err(OcrError::Worker("worker exited without a result".to_string()))
        }
    }
}
