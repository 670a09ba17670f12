//! Shared cancellation signal for concurrent probes
//!
//! One [`CancelHandle`] fans out to any number of [`CancelSignal`]s. Probes
//! check the signal at loop boundaries and race every sleep against it, so
//! a cancelled probe stops within one read-timeout interval.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::DetectError;

/// Owner side: cancels every signal derived from it
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cheap to clone into each probe task
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Return `Err(Cancelled)` if the signal has fired
    pub fn check(&self) -> Result<(), DetectError> {
        if self.is_cancelled() {
            Err(DetectError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the signal fires
    ///
    /// Pends forever if the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless cancelled first
    pub async fn sleep(&self, duration: Duration) -> Result<(), DetectError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(DetectError::Cancelled),
        }
    }
}
