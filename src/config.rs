//! Client configuration
//!
//! [`ClientConfig`] is an immutable value built once at startup with
//! [`ClientConfig::builder`]. The client never reads environment variables
//! itself; applications that want environment-driven settings seed the
//! builder with [`ClientConfigBuilder::from_env`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ogn_client::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .filter("r/+49.782/+19.450/200")
//!     .reconnection_delay(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.port_for(config.filter()), 14580);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::{Result, descriptor::AircraftDescriptorProvider, error::OgnClientError};

/// Default APRS server of the Open Glider Network
pub const DEFAULT_SERVER_NAME: &str = "aprs.glidernet.org";
/// Port serving the full, unfiltered feed
pub const DEFAULT_PORT: u16 = 10152;
/// Port accepting a server-side filter in the login line
pub const DEFAULT_PORT_FILTERED: u16 = 14580;
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_millis(10_000);
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(300_000);
pub const DEFAULT_APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const DEFAULT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_SERVER_NAME: &str = "OGN_SERVER_NAME";
pub const ENV_PORT: &str = "OGN_SERVER_PORT";
pub const ENV_PORT_FILTERED: &str = "OGN_SERVER_PORT_FILTERED";
pub const ENV_FILTER: &str = "OGN_APRS_FILTER";
pub const ENV_RECONNECTION_TIMEOUT_MS: &str = "OGN_RECONNECTION_TIMEOUT_MS";
pub const ENV_KEEP_ALIVE_INTERVAL_MS: &str = "OGN_KEEP_ALIVE_INTERVAL_MS";
pub const ENV_APP_NAME: &str = "OGN_APP_NAME";
pub const ENV_APP_VERSION: &str = "OGN_APP_VERSION";
pub const ENV_IGNORE_AIRCRAFT_BEACONS: &str = "OGN_IGNORE_AIRCRAFT_BEACONS";
pub const ENV_IGNORE_RECEIVER_BEACONS: &str = "OGN_IGNORE_RECEIVER_BEACONS";

/// Connection and behavior parameters of an [`OgnClient`](crate::client::OgnClient)
#[derive(Clone)]
pub struct ClientConfig {
    server_name: String,
    port: u16,
    port_filtered: u16,
    filter: Option<String>,
    reconnection_delay: Duration,
    keep_alive_interval: Duration,
    app_name: String,
    app_version: String,
    ignore_aircraft_beacons: bool,
    ignore_receiver_beacons: bool,
    descriptor_providers: Vec<Arc<dyn AircraftDescriptorProvider>>,
}

impl ClientConfig {
    /// Creates a builder pre-filled with the defaults
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn port_filtered(&self) -> u16 {
        self.port_filtered
    }

    /// Default filter used by [`OgnClient::connect`](crate::client::OgnClient::connect)
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Port to connect to for the given filter
    ///
    /// The filtered port when a filter is present, the unfiltered one
    /// otherwise.
    pub fn port_for(&self, filter: Option<&str>) -> u16 {
        match filter {
            Some(_) => self.port_filtered,
            None => self.port,
        }
    }

    pub fn reconnection_delay(&self) -> Duration {
        self.reconnection_delay
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn ignore_aircraft_beacons(&self) -> bool {
        self.ignore_aircraft_beacons
    }

    pub fn ignore_receiver_beacons(&self) -> bool {
        self.ignore_receiver_beacons
    }

    /// Descriptor providers, in lookup order
    pub fn descriptor_providers(&self) -> &[Arc<dyn AircraftDescriptorProvider>] {
        &self.descriptor_providers
    }
}

impl core::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_name", &self.server_name)
            .field("port", &self.port)
            .field("port_filtered", &self.port_filtered)
            .field("filter", &self.filter)
            .field("reconnection_delay", &self.reconnection_delay)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("ignore_aircraft_beacons", &self.ignore_aircraft_beacons)
            .field("ignore_receiver_beacons", &self.ignore_receiver_beacons)
            .field("descriptor_providers", &self.descriptor_providers.len())
            .finish()
    }
}

/// Fluent builder for [`ClientConfig`]
#[derive(Clone)]
pub struct ClientConfigBuilder {
    inner: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder {
            inner: ClientConfig {
                server_name: DEFAULT_SERVER_NAME.into(),
                port: DEFAULT_PORT,
                port_filtered: DEFAULT_PORT_FILTERED,
                filter: None,
                reconnection_delay: DEFAULT_RECONNECTION_DELAY,
                keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
                app_name: DEFAULT_APP_NAME.into(),
                app_version: DEFAULT_APP_VERSION.into(),
                ignore_aircraft_beacons: false,
                ignore_receiver_beacons: false,
                descriptor_providers: Vec::new(),
            },
        }
    }
}

impl ClientConfigBuilder {
    /// Seeds a builder from `OGN_*` environment variables
    ///
    /// Unset variables keep their defaults. The two ignore flags are
    /// enabled by the mere presence of their variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Seeds a builder from an arbitrary key lookup
    ///
    /// Same keys and rules as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();

        if let Some(name) = lookup(ENV_SERVER_NAME) {
            builder = builder.server_name(name);
        }
        if let Some(port) = lookup(ENV_PORT) {
            builder = builder.port(parse_number(ENV_PORT, &port)?);
        }
        if let Some(port) = lookup(ENV_PORT_FILTERED) {
            builder = builder.port_filtered(parse_number(ENV_PORT_FILTERED, &port)?);
        }
        if let Some(filter) = lookup(ENV_FILTER) {
            builder = builder.filter(filter);
        }
        if let Some(ms) = lookup(ENV_RECONNECTION_TIMEOUT_MS) {
            let ms = parse_number(ENV_RECONNECTION_TIMEOUT_MS, &ms)?;
            builder = builder.reconnection_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = lookup(ENV_KEEP_ALIVE_INTERVAL_MS) {
            let ms = parse_number(ENV_KEEP_ALIVE_INTERVAL_MS, &ms)?;
            builder = builder.keep_alive_interval(Duration::from_millis(ms));
        }
        if let Some(name) = lookup(ENV_APP_NAME) {
            builder = builder.app_name(name);
        }
        if let Some(version) = lookup(ENV_APP_VERSION) {
            builder = builder.app_version(version);
        }
        if lookup(ENV_IGNORE_AIRCRAFT_BEACONS).is_some() {
            builder = builder.ignore_aircraft_beacons(true);
        }
        if lookup(ENV_IGNORE_RECEIVER_BEACONS).is_some() {
            builder = builder.ignore_receiver_beacons(true);
        }

        Ok(builder)
    }

    pub fn server_name<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.server_name = name.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.inner.port = port;
        self
    }

    pub fn port_filtered(mut self, port: u16) -> Self {
        self.inner.port_filtered = port;
        self
    }

    /// Sets the default server-side filter
    ///
    /// Its presence switches the client to the filtered port.
    pub fn filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.inner.filter = Some(filter.into());
        self
    }

    /// Removes the default filter
    pub fn no_filter(mut self) -> Self {
        self.inner.filter = None;
        self
    }

    /// Fixed wait between a connection failure and the next attempt
    pub fn reconnection_delay(mut self, delay: Duration) -> Self {
        self.inner.reconnection_delay = delay;
        self
    }

    /// Period of the keep-alive heartbeat
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.inner.keep_alive_interval = interval;
        self
    }

    pub fn app_name<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.app_name = name.into();
        self
    }

    pub fn app_version<S: Into<String>>(mut self, version: S) -> Self {
        self.inner.app_version = version.into();
        self
    }

    /// Skips aircraft beacons at decode time
    pub fn ignore_aircraft_beacons(mut self, ignore: bool) -> Self {
        self.inner.ignore_aircraft_beacons = ignore;
        self
    }

    /// Skips receiver beacons at decode time
    pub fn ignore_receiver_beacons(mut self, ignore: bool) -> Self {
        self.inner.ignore_receiver_beacons = ignore;
        self
    }

    /// Appends a descriptor provider; providers are queried in insertion order
    pub fn descriptor_provider(mut self, provider: Arc<dyn AircraftDescriptorProvider>) -> Self {
        self.inner.descriptor_providers.push(provider);
        self
    }

    /// Replaces the descriptor providers
    pub fn descriptor_providers<I>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn AircraftDescriptorProvider>>,
    {
        self.inner.descriptor_providers = providers.into_iter().collect();
        self
    }

    /// Validates and returns the configuration
    pub fn build(self) -> Result<ClientConfig> {
        if self.inner.server_name.trim().is_empty() {
            return Err(OgnClientError::ConfigError(
                "server name must not be empty".into(),
            ));
        }
        if self.inner.keep_alive_interval.is_zero() {
            return Err(OgnClientError::ConfigError(
                "keep-alive interval must be greater than zero".into(),
            ));
        }
        Ok(self.inner)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OgnClientError::ConfigError(format!("invalid value for {key}: {value:?}")))
}
