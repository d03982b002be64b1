//! Cooperative cancellation for the session loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Create a connected stop handle and token
pub fn stop_pair() -> (StopHandle, StopToken) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let stopped = Arc::new(AtomicBool::new(false));
    (
        StopHandle {
            stopped: stopped.clone(),
            tx,
        },
        StopToken { stopped, rx },
    )
}

/// Requests the session to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    tx: Sender<()>,
}

impl StopHandle {
    /// Ask the loop to stop at its next checkpoint
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Wake a sleeping loop; a full channel already holds a wakeup
        let _ = self.tx.try_send(());
    }
}

/// Observed by the session between iterations
#[derive(Debug, Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    rx: Receiver<()>,
}

impl StopToken {
    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, waking early on stop; returns whether stopped
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Err(RecvTimeoutError::Disconnected) => {
                // Every handle is gone, nobody can stop us any more
                std::thread::sleep(timeout);
                self.is_stopped()
            }
        }
    }
}
