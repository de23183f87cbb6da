//! APRS-IS login conventions
//!
//! An APRS-IS client identifies itself with a single login line:
//!
//! ```text
//! user <callsign> pass <passcode> vers <software> <version> [filter <expr>]
//! ```
//!
//! Read-only clients use the pass-code `-1`. Lines starting with `#` are
//! comments and are ignored by the server, which makes a commented copy of
//! the login line a harmless heartbeat.
//!
//! # References
//!
//! - [Connecting to APRS-IS](http://www.aprs-is.net/Connecting.aspx)
//! - [Server-side filter commands](http://www.aprs-is.net/javAPRSFilter.aspx)

use crate::protocol::LoginFormatter;

/// Pass-code used by receive-only clients
pub const READ_ONLY_PASSCODE: &str = "-1";

/// Marker that starts an APRS comment line
pub const COMMENT_PREFIX: char = '#';

/// Prefix of generated client ids
pub const CLIENT_ID_PREFIX: &str = "OGN";

/// Default [`LoginFormatter`] following the APRS-IS login convention
#[derive(Debug, Clone, Copy, Default)]
pub struct AprsLoginFormatter;

impl LoginFormatter for AprsLoginFormatter {
    fn format(
        &self,
        client_id: &str,
        passcode: &str,
        app_name: &str,
        app_version: &str,
        filter: Option<&str>,
    ) -> String {
        match filter {
            Some(filter) => format!(
                "user {client_id} pass {passcode} vers {app_name} {app_version} filter {filter}"
            ),
            None => format!("user {client_id} pass {passcode} vers {app_name} {app_version}"),
        }
    }
}

/// Generates a fresh client id
///
/// APRS-IS rejects concurrent logins with the same callsign, so every
/// connection attempt gets its own random id: `OGN` followed by six
/// upper-case hex digits.
pub fn generate_client_id() -> String {
    let suffix = rand::random::<u32>() & 0x00FF_FFFF;
    format!("{CLIENT_ID_PREFIX}{suffix:06X}")
}

/// Turns a login line into the heartbeat sent by the keep-alive
pub fn keep_alive_line(login_line: &str) -> String {
    if login_line.starts_with(COMMENT_PREFIX) {
        login_line.to_string()
    } else {
        format!("{COMMENT_PREFIX}{login_line}")
    }
}
