//! OGN client facade
//!
//! [`OgnClient`] ties the pieces together. A connected client runs two
//! tokio tasks and one thread:
//!
//! - the connection manager task, which owns the socket, logs in, pushes
//!   every received line onto the ingestion queue and reconnects after
//!   failures
//! - the keep-alive heartbeat task of the current connection
//! - the dispatcher thread, which decodes queued lines and notifies listeners
//!
//! Listener callbacks run on the dispatcher thread, one beacon at a time and
//! in arrival order. A callback that blocks delays later beacons, but not
//! the socket reader or the heartbeat.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ogn_client::client::OgnClient;
//! use ogn_client::config::ClientConfig;
//! use ogn_client::protocol::beacon::{Beacon, ReceiverBeacon};
//!
//! # async fn example(
//! #     decoder: impl Fn(&str, bool, bool) -> ogn_client::Result<Option<Beacon>> + Send + Sync + 'static,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let client = OgnClient::new(ClientConfig::builder().build()?, decoder);
//!
//! client.subscribe_receiver(Arc::new(|beacon: &ReceiverBeacon| {
//!     println!("receiver {} at {:.3}/{:.3}", beacon.id, beacon.lat, beacon.lon);
//! }));
//!
//! client.connect()?;
//! tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Result,
    client::{
        connection::{ConnectionManager, ConnectionState, Dialer, TcpDialer},
        dispatcher::Dispatcher,
        listener::{AircraftBeaconListener, ListenerRegistry, ReceiverBeaconListener},
        queue::IngestionQueue,
    },
    config::ClientConfig,
    error::OgnClientError,
    protocol::{LoginFormatter, SentenceDecoder, aprs::AprsLoginFormatter},
};

/// Connection lifecycle and reconnection
pub mod connection;

/// Queue consumer delivering beacons to listeners
pub mod dispatcher;

/// Per-connection heartbeat
pub mod keep_alive;

/// Listener traits and copy-on-write listener sets
pub mod listener;

/// Line hand-off between network and dispatcher
pub mod queue;

/// Tasks of one connect/disconnect cycle
struct Session {
    shutdown: CancellationToken,
    connection: JoinHandle<()>,
    dispatcher: thread::JoinHandle<()>,
}

/// Long-lived client for the OGN APRS feed
///
/// # Type Parameters
/// * `D` - How streams to the server are opened; [`TcpDialer`] by default
pub struct OgnClient<D: Dialer = TcpDialer> {
    config: Arc<ClientConfig>,
    dialer: Arc<D>,
    decoder: Arc<dyn SentenceDecoder>,
    login: Arc<dyn LoginFormatter>,
    listeners: Arc<ListenerRegistry>,
    queue: Arc<IngestionQueue>,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<Session>>,
    /// Dispatcher of a disconnected session that may still be delivering
    retired: Mutex<Option<thread::JoinHandle<()>>>,
}

impl OgnClient<TcpDialer> {
    /// Creates a client connecting over TCP
    ///
    /// Nothing happens on the network until [`connect`](Self::connect).
    pub fn new<Dec>(config: ClientConfig, decoder: Dec) -> Self
    where
        Dec: SentenceDecoder + 'static,
    {
        Self::with_dialer(config, decoder, TcpDialer)
    }
}

impl<D: Dialer> OgnClient<D> {
    /// Creates a client opening its streams through `dialer`
    pub fn with_dialer<Dec>(config: ClientConfig, decoder: Dec, dialer: D) -> Self
    where
        Dec: SentenceDecoder + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Idle);
        OgnClient {
            config: Arc::new(config),
            dialer: Arc::new(dialer),
            decoder: Arc::new(decoder),
            login: Arc::new(AprsLoginFormatter),
            listeners: Arc::new(ListenerRegistry::default()),
            queue: Arc::new(IngestionQueue::new()),
            state: Arc::new(state),
            session: Mutex::new(None),
            retired: Mutex::new(None),
        }
    }

    /// Replaces the login line formatter
    pub fn with_login_formatter<F>(mut self, formatter: F) -> Self
    where
        F: LoginFormatter + 'static,
    {
        self.login = Arc::new(formatter);
        self
    }

    /// Configuration the client was created with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connects using the configured default filter
    ///
    /// See [`connect_with_filter`](Self::connect_with_filter).
    pub fn connect(&self) -> Result<()> {
        let filter = self.config.filter().map(str::to_string);
        self.connect_with_filter(filter.as_deref())
    }

    /// Starts the connection manager and the dispatcher
    ///
    /// With a filter the client logs in on the filtered port and passes the
    /// filter to the server; without one it uses the unfiltered port.
    ///
    /// If the client is already running this only logs a warning. Must be
    /// called within a tokio runtime, whose handle the tasks are spawned on.
    ///
    /// After a [`disconnect`](Self::disconnect) the new dispatcher only
    /// starts delivering once the previous one has returned from the
    /// callback it was in.
    pub fn connect_with_filter(&self, filter: Option<&str>) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("client is currently connected and running. stop it first!");
            return Ok(());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| OgnClientError::NoRuntime)?;
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher {
            config: self.config.clone(),
            decoder: self.decoder.clone(),
            listeners: self.listeners.clone(),
            queue: self.queue.clone(),
        };
        let manager = ConnectionManager {
            dialer: self.dialer.clone(),
            config: self.config.clone(),
            login: self.login.clone(),
            filter: filter.map(str::to_string),
            queue: self.queue.clone(),
            state: self.state.clone(),
            shutdown: shutdown.clone(),
        };

        info!(
            server = self.config.server_name(),
            port = self.config.port_for(filter),
            filter = filter.unwrap_or(""),
            "starting OGN client"
        );
        let previous = self.retired.lock().take();
        let dispatcher = dispatcher
            .spawn(runtime.clone(), shutdown.clone(), previous)
            .map_err(OgnClientError::IoError)?;
        *session = Some(Session {
            dispatcher,
            connection: runtime.spawn(manager.run()),
            shutdown,
        });
        Ok(())
    }

    /// Stops the connection, its keep-alive and the dispatcher
    ///
    /// Does not wait for the tasks to unwind, so it is safe to call from a
    /// listener. A dispatcher in the middle of a callback finishes that
    /// callback and then stops. A following [`connect`](Self::connect)
    /// starts a fresh connection; heartbeats of the old one can never reach
    /// it since each keep-alive owns the write half of its own connection.
    /// Lines already queued stay queued for the next session. A no-op when
    /// not connected.
    pub fn disconnect(&self) {
        let mut guard = self.session.lock();
        let Some(session) = guard.take() else {
            debug!("client is not connected");
            return;
        };

        // Cancelling the session token also cancels the keep-alive, whose
        // token is a child of it, and stops the dispatcher after its current
        // line. Aborting drops the connection task's stream halves, which
        // closes the socket.
        session.shutdown.cancel();
        session.connection.abort();
        *self.retired.lock() = Some(session.dispatcher);

        self.state.send_replace(ConnectionState::Terminated);
        info!("OGN client disconnected");
    }

    /// Whether a session is running
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every connection state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Registers an aircraft beacon listener; registering it again is a no-op
    pub fn subscribe_aircraft(&self, listener: Arc<dyn AircraftBeaconListener>) {
        self.listeners.aircraft.insert(listener);
    }

    /// Removes an aircraft beacon listener; a no-op if it is not registered
    pub fn unsubscribe_aircraft(&self, listener: &Arc<dyn AircraftBeaconListener>) {
        self.listeners.aircraft.remove(listener);
    }

    /// Registers a receiver beacon listener; registering it again is a no-op
    pub fn subscribe_receiver(&self, listener: Arc<dyn ReceiverBeaconListener>) {
        self.listeners.receiver.insert(listener);
    }

    /// Removes a receiver beacon listener; a no-op if it is not registered
    pub fn unsubscribe_receiver(&self, listener: &Arc<dyn ReceiverBeaconListener>) {
        self.listeners.receiver.remove(listener);
    }
}

impl<D: Dialer> Drop for OgnClient<D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<D: Dialer> core::fmt::Debug for OgnClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OgnClient")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
