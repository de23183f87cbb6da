//! Beacon and descriptor records
//!
//! These are the values the client routes. They are produced by the
//! application's [`SentenceDecoder`](crate::protocol::SentenceDecoder) and by
//! [`AircraftDescriptorProvider`](crate::descriptor::AircraftDescriptorProvider)s;
//! the client itself never builds one.
//!
//! All records serialize with serde. Optional fields are skipped when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::skip_serializing_none;

/// One decoded report from the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum Beacon {
    Aircraft(AircraftBeacon),
    Receiver(ReceiverBeacon),
}

impl From<AircraftBeacon> for Beacon {
    fn from(beacon: AircraftBeacon) -> Self {
        Beacon::Aircraft(beacon)
    }
}

impl From<ReceiverBeacon> for Beacon {
    fn from(beacon: ReceiverBeacon) -> Self {
        Beacon::Receiver(beacon)
    }
}

/// Kind of device address carried by an aircraft beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum AddressType {
    #[default]
    Random = 0,
    Icao = 1,
    Flarm = 2,
    Ogn = 3,
}

/// * [OGN aircraft type codes](http://wiki.glidernet.org/wiki:ogn-flavoured-aprs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum AircraftType {
    #[default]
    Unknown = 0,
    Glider = 1,
    TowPlane = 2,
    Helicopter = 3,
    Parachute = 4,
    DropPlane = 5,
    HangGlider = 6,
    Paraglider = 7,
    PoweredAircraft = 8,
    JetAircraft = 9,
    Ufo = 10,
    Balloon = 11,
    Airship = 12,
    Uav = 13,
    GroundSupport = 14,
    StaticObject = 15,
}

/// Position report from an aircraft or tracker
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftBeacon {
    /// APRS source callsign (e.g. `FLRDDA5BA`)
    pub id: String,
    /// Device address, the key for descriptor lookups (e.g. `DDA5BA`)
    pub address: String,
    pub address_type: AddressType,
    pub aircraft_type: AircraftType,
    pub timestamp: DateTime<Utc>,
    /// Receiver that heard the aircraft
    pub receiver_name: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in meters
    pub alt: f64,
    /// Track in degrees
    pub track: Option<u16>,
    /// Ground speed in km/h
    pub ground_speed: Option<f32>,
    /// Climb rate in m/s
    pub climb_rate: Option<f32>,
    /// The sentence this beacon was decoded from
    pub raw: String,
}

/// Status/position report from a ground receiver station
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverBeacon {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// APRS server the receiver is connected to
    pub server_name: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    /// Receiver software version
    pub version: Option<String>,
    /// Receiver hardware platform
    pub platform: Option<String>,
    pub raw: String,
}

/// Human-readable metadata about a tracked aircraft
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftDescriptor {
    /// Registration (e.g. `D-KXYZ`)
    pub reg_number: String,
    /// Competition number
    pub cn: Option<String>,
    pub owner: Option<String>,
    pub home_base: Option<String>,
    pub model: Option<String>,
    /// Radio frequency in MHz
    pub freq: Option<String>,
    pub tracked: bool,
    pub identified: bool,
}
