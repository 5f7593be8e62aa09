//! A cooperative shutdown signal for single-task event loops.
//!
//! The Segmenter engine loop selects on [`ShutdownSignal::signaled`] alongside
//! its other event sources; when it fires the loop drains its in-flight
//! state and returns instead of running forever.

use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

#[derive(Clone, Debug)]
pub struct ShutdownWatcher {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, ShutdownWatcher) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownWatcher { rx })
    }

    /// Idempotent: signaling twice is fine.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownWatcher {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`ShutdownSignal::shutdown`] has been called.
    pub async fn signaled(&mut self) {
        if self.is_shutdown() {
            return;
        }
        // A closed sender (the ShutdownSignal was dropped) is treated the same
        // as an explicit shutdown: there's no one left who could ever signal us.
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_wakes_watcher() {
        let (signal, mut watcher) = ShutdownSignal::new();
        assert!(!watcher.is_shutdown());
        signal.shutdown();
        watcher.signaled().await;
        assert!(watcher.is_shutdown());
    }
}
