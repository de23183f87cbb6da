//! Periodic heartbeat for a live connection
//!
//! Some APRS servers drop clients that stay silent. While a connection is
//! up, the keep-alive resends the login line as a comment (`#user ...`),
//! first right away and then once per interval.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::protocol::{AprsLineEncode, aprs::keep_alive_line};

/// Heartbeat task bound to one connection's write half
///
/// The task owns the writer, so a heartbeat can only ever reach the
/// connection it was started for. Dropping the `KeepAlive` stops it.
#[derive(Debug)]
pub struct KeepAlive {
    interval: Duration,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        KeepAlive {
            interval,
            task: None,
        }
    }

    /// Starts sending heartbeats derived from `login_line` to `writer`
    ///
    /// A no-op if a heartbeat is already running and not cancelled; the
    /// writer is dropped in that case. `token` cancels the heartbeat from
    /// outside, typically as a child of the client's shutdown token.
    pub fn start<W>(&mut self, writer: W, login_line: &str, token: CancellationToken)
    where
        W: futures_io::AsyncWrite + Unpin + Send + 'static,
    {
        if let Some((running, _)) = &self.task {
            if !running.is_cancelled() {
                debug!("keep-alive already running");
                return;
            }
        }

        let message = keep_alive_line(login_line);
        let handle = tokio::spawn(heartbeat(writer, message, self.interval, token.clone()));
        self.task = Some((token, handle));
    }

    /// Stops the heartbeat; safe to call when never started
    ///
    /// The task is aborted as well as cancelled, so the writer is released
    /// even if a write is stuck.
    pub fn stop(&mut self) {
        if let Some((token, handle)) = self.task.take() {
            token.cancel();
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(token, handle)| !token.is_cancelled() && !handle.is_finished())
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn heartbeat<W>(mut writer: W, message: String, interval: Duration, token: CancellationToken)
where
    W: futures_io::AsyncWrite + Unpin + Send,
{
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                debug!(line = %message, "sending keep-alive message");
                if let Err(e) = writer.write_line(&message).await {
                    warn!(error = %e, "failed to send keep-alive message");
                }
            }
        }
    }

    trace!("keep-alive stopped");
    let _ = futures_util::AsyncWriteExt::close(&mut writer).await;
}
