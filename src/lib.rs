//! # ogn-client
//!
//! A Rust client for the Open Glider Network (OGN) APRS-IS feed.
//!
//! The client keeps a TCP connection to an APRS server, logs in with a
//! read-only pass-code, and streams the text sentences the server pushes.
//! Each sentence is decoded by a pluggable [`SentenceDecoder`](protocol::SentenceDecoder)
//! and delivered to subscribed aircraft or receiver listeners.
//!
//! ## Overview
//!
//! The interesting part is the pipeline around the socket:
//!
//! - a connection manager that reconnects after a fixed delay, forever,
//!   until the client is disconnected
//! - a keep-alive heartbeat bound to the current connection
//! - an unbounded FIFO queue between network reads and sentence processing
//! - a single dispatcher that decodes lines in arrival order, enriches
//!   aircraft beacons with descriptors and notifies listeners
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ogn_client::client::OgnClient;
//! use ogn_client::config::ClientConfig;
//! use ogn_client::protocol::beacon::{AircraftBeacon, AircraftDescriptor, Beacon};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder().ignore_receiver_beacons(true).build()?;
//!
//! // Decoding is provided by the application
//! let decoder = |_line: &str, _aircraft: bool, _receiver: bool| -> ogn_client::Result<Option<Beacon>> {
//!     Ok(None)
//! };
//!
//! let client = OgnClient::new(config, decoder);
//! client.subscribe_aircraft(Arc::new(
//!     |beacon: &AircraftBeacon, descriptor: Option<&AircraftDescriptor>| {
//!         println!("{} {:?}", beacon.address, descriptor.map(|d| &d.reg_number));
//!     },
//! ));
//!
//! client.connect_with_filter(Some("r/+51.537/+5.472/250"))?;
//! # Ok(())
//! # }
//! ```

use crate::error::OgnClientError;

/// Client facade, connection management and beacon dispatch
pub mod client;

/// Client configuration
pub mod config;

/// Aircraft descriptor lookup
pub mod descriptor;

/// Error types used throughout the library
pub mod error;

/// APRS wire helpers, beacon records and external capability traits
pub mod protocol;

/// Convenience type alias for Results with OgnClientError
pub type Result<T> = core::result::Result<T, OgnClientError>;
