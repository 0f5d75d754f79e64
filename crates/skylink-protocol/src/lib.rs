//! Skylink Protocol Library
//!
//! This crate provides the wire format spoken between the ground station,
//! the mission-control endpoint and the radio transceivers of a balloon
//! flight:
//!
//! - **CCSDS space packets**: 6-byte primary header, optional 6-byte time
//!   secondary header (telemetry only), big-endian 32-bit payload fields
//! - **Static tables**: telemetry APIDs, telecommand classes and command ids
//!   with bidirectional name/value lookup
//! - **Schemas**: the per-vehicle essential telemetry layout
//! - **Rotator telecommands**: decoding of the antenna rotator control set
//! - **Heartbeats**: the ASCII liveness messages exchanged with transceivers
//!
//! # Example
//!
//! ```rust
//! use skylink_protocol::{ccsds, FieldValue, TelemetryApid, Timestamp};
//!
//! let fields = [FieldValue::Float(56.95), FieldValue::Int(7)];
//! let ts = Timestamp::new(1_700_000_000, 0);
//! let bytes = ccsds::encode_telemetry_at(TelemetryApid::PayloadFull.value(), 3, &fields, ts).unwrap();
//!
//! let packet = ccsds::decode(&bytes).unwrap();
//! assert_eq!(packet.apid, 101);
//! assert_eq!(packet.sequence_count, 3);
//! assert_eq!(packet.timestamp, Some(ts));
//! ```

#[macro_use]
mod macros;

pub mod apid;
pub mod ccsds;
pub mod command;
pub mod error;
pub mod field;
pub mod heartbeat;
pub mod position;
pub mod schema;

pub use apid::{CommandId, TelecommandClass, TelemetryApid, Vehicle};
pub use ccsds::{Packet, PacketKind, PacketType, Timestamp};
pub use command::RotatorCommand;
pub use error::{CommandError, DecodeError, EncodeError, FieldError, TableError};
pub use field::{FieldType, FieldValue};
pub use heartbeat::Heartbeat;
pub use position::GeoPosition;
pub use schema::{Schema, SchemaField};
