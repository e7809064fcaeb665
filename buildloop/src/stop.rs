//! Stop signal observed by the loop at its pause boundary.
//!
//! A stop raised at any time is latched: if it arrives while a gateway call is
//! in flight, the loop sees it at the next pause.

use std::sync::Arc;

use tokio::sync::watch;

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Raises the stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving side held by the loop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal that can never fire.
    pub fn never() -> Self {
        let (_, signal) = stop_channel();
        signal
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop has been raised.
    ///
    /// If every handle is dropped without raising a stop, this never resolves.
    pub async fn stopped(&mut self) {
        let raised = self.rx.wait_for(|stopped| *stopped).await.map(|_| ());
        if raised.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
