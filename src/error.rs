//! Error types for OGN client operations
//!
//! This module defines the errors that can surface while configuring the
//! client, talking to the APRS server or decoding sentences. Most of them
//! never reach the caller: the connection manager and the dispatcher log and
//! absorb them so the client keeps running on an unreliable network.

/// Main error type for OGN client operations
#[derive(Debug)]
pub enum OgnClientError {
    /// I/O error occurred during network communication
    ///
    /// Covers name resolution, connect, read and write failures. The
    /// connection manager reacts to it by reconnecting after the
    /// configured delay.
    IoError(std::io::Error),

    /// The server closed the connection (end of stream)
    ConnectionClosed,

    /// A sentence could not be decoded into a beacon
    ///
    /// Returned by [`SentenceDecoder`](crate::protocol::SentenceDecoder)
    /// implementations; the dispatcher logs it and moves on to the next line.
    DecodeError(String),

    /// Invalid client configuration
    ConfigError(String),

    /// `connect` was called outside of a tokio runtime
    NoRuntime,
}

impl core::fmt::Display for OgnClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OgnClientError::IoError(err) => write!(f, "IoError: {}", err),
            OgnClientError::ConnectionClosed => write!(f, "ConnectionClosed"),
            OgnClientError::DecodeError(msg) => write!(f, "DecodeError: {}", msg),
            OgnClientError::ConfigError(msg) => write!(f, "ConfigError: {}", msg),
            OgnClientError::NoRuntime => {
                write!(f, "NoRuntime: connect must be called within a tokio runtime")
            }
        }
    }
}

impl core::error::Error for OgnClientError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            OgnClientError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OgnClientError {
    fn from(err: std::io::Error) -> Self {
        OgnClientError::IoError(err)
    }
}
