//! Hand-off buffer between the socket reader and the dispatcher

use tokio::sync::{Mutex, mpsc};

/// Unbounded FIFO of raw sentences
///
/// The connection manager pushes without ever waiting; the dispatcher pops
/// and waits while the queue is empty. There is no backpressure: if
/// listeners fall behind a busy feed, the queue grows.
///
/// The queue outlives individual connections, so lines read before a
/// reconnect are still delivered after it.
#[derive(Debug)]
pub struct IngestionQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Default for IngestionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        IngestionQueue {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Appends a line; never blocks
    pub fn push(&self, line: String) {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.tx.send(line);
    }

    /// Waits for the oldest line
    ///
    /// Cancel safe: dropping the future never loses a line. Returns `None`
    /// only if the queue is being torn down.
    pub async fn pop(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Returns the oldest line if one is immediately available
    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}
