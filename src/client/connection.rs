//! Connection lifecycle: connect, log in, stream, reconnect
//!
//! The connection manager runs as a single task for the lifetime of a
//! client session:
//!
//! ```text
//! Idle -> Connecting -> LoggedIn -> Streaming -+-> Failed -> (delay) -> Connecting
//!                                              +-> Terminated (cancelled)
//! ```
//!
//! Every failure (name resolution, connect, read, end of stream) is logged,
//! the stream and its keep-alive are torn down, and a new attempt starts
//! after the configured delay. The delay is fixed and there is no retry
//! limit; only cancellation ends the loop.

use std::sync::Arc;

use futures_util::AsyncReadExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::{
    Result,
    client::{keep_alive::KeepAlive, queue::IngestionQueue},
    config::ClientConfig,
    error::OgnClientError,
    protocol::{
        AprsLineDecode, AprsLineEncode, LoginFormatter,
        aprs::{READ_ONLY_PASSCODE, generate_client_id},
    },
};

/// Observable state of a client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected
    #[default]
    Idle,
    /// Resolving the server and opening the stream
    Connecting,
    /// Login line sent, keep-alive started
    LoggedIn,
    /// Reading sentences
    Streaming,
    /// Last attempt failed; waiting for the reconnection delay
    Failed,
    /// Disconnected on request
    Terminated,
}

/// Opens byte streams to the APRS server
///
/// [`TcpDialer`] is the production implementation. Any
/// `futures_io` stream works, which keeps the connection manager testable
/// over in-memory pipes.
pub trait Dialer: Send + Sync + 'static {
    type Stream: futures_io::AsyncRead + futures_io::AsyncWrite + Unpin + Send + 'static;

    /// Resolves `host` and connects to `port`
    fn dial(
        &self,
        host: &str,
        port: u16,
    ) -> impl std::future::Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// Plain TCP dialer on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = tokio_util::compat::Compat<tokio::net::TcpStream>;

    async fn dial(&self, host: &str, port: u16) -> std::io::Result<Self::Stream> {
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            info!("connecting to server: {}[{}]:{}", host, addr.ip(), port);
            match tokio::net::TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream.compat()),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {host}"),
            )
        }))
    }
}

/// Per-session connection task
pub(crate) struct ConnectionManager<D: Dialer> {
    pub(crate) dialer: Arc<D>,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) login: Arc<dyn LoginFormatter>,
    pub(crate) filter: Option<String>,
    pub(crate) queue: Arc<IngestionQueue>,
    pub(crate) state: Arc<watch::Sender<ConnectionState>>,
    pub(crate) shutdown: CancellationToken,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Connects and reconnects until the shutdown token is cancelled
    pub(crate) async fn run(self) {
        debug!("connection manager starting");

        while !self.shutdown.is_cancelled() {
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.session() => result,
            };

            // `session` never returns Ok: streaming only ends on error or EOF.
            if let Err(e) = result {
                self.set_state(ConnectionState::Failed);
                error!(
                    "connection to {}:{} lost: {}. retrying in {} ms",
                    self.config.server_name(),
                    self.port(),
                    e,
                    self.config.reconnection_delay().as_millis()
                );
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("cancelled while waiting to reconnect");
                    break;
                }
                _ = tokio::time::sleep(self.config.reconnection_delay()) => {}
            }
        }

        debug!("connection manager stopped");
    }

    fn port(&self) -> u16 {
        self.config.port_for(self.filter.as_deref())
    }

    /// Publishes `state` unless the session was cancelled
    ///
    /// The check runs under the channel lock, so a manager that is still
    /// unwinding can never overwrite the `Terminated` state published by
    /// `OgnClient::disconnect`, nor the state of the session after it.
    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if self.shutdown.is_cancelled() || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// One connection: dial, log in, start the keep-alive and stream lines
    ///
    /// Dropping the returned future tears the connection down: the read half
    /// is dropped here and the keep-alive (owning the write half) is stopped
    /// by its `Drop`, which closes the socket.
    async fn session(&self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let port = self.port();
        let client_id = generate_client_id();
        let login_line = self.login.format(
            &client_id,
            READ_ONLY_PASSCODE,
            self.config.app_name(),
            self.config.app_version(),
            self.filter.as_deref(),
        );

        let stream = self
            .dialer
            .dial(self.config.server_name(), port)
            .await
            .map_err(OgnClientError::IoError)?;
        let (reader, mut writer) = stream.split();

        info!("logging in as: {}", login_line);
        writer.write_line(&login_line).await?;
        self.set_state(ConnectionState::LoggedIn);

        let mut keep_alive = KeepAlive::new(self.config.keep_alive_interval());
        keep_alive.start(writer, &login_line, self.shutdown.child_token());

        self.set_state(ConnectionState::Streaming);
        info!("connected, waiting for data");

        let result = self.stream_lines(reader).await;
        keep_alive.stop();
        result
    }

    async fn stream_lines<R>(&self, reader: R) -> Result<()>
    where
        R: futures_io::AsyncRead + Unpin + Send,
    {
        let mut reader = futures_util::io::BufReader::new(reader);
        let mut buf = Vec::new();

        while let Some(line) = reader.read_sentence(&mut buf).await? {
            trace!("{}", line);
            self.queue.push(line);
        }

        Err(OgnClientError::ConnectionClosed)
    }
}
