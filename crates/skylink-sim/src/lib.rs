//! Skylink Simulation Library
//!
//! Lets the relay run end to end without radios or a balloon:
//!
//! - **SimulatedFlight**: a rising, drifting vehicle producing essential
//!   telemetry packets
//! - **SimTransceiver**: a UDP transceiver that answers heartbeats, sends
//!   the flight's telemetry and records the telecommands it receives
//!
//! # Example
//!
//! ```rust
//! use skylink_sim::{FlightConfig, SimulatedFlight};
//! use skylink_protocol::{ccsds, Timestamp};
//!
//! let mut flight = SimulatedFlight::new(FlightConfig::default());
//! flight.advance(5.0);
//! let bytes = flight.essential_packet(Timestamp::new(1_700_000_000, 0)).unwrap();
//! assert_eq!(ccsds::decode(&bytes).unwrap().apid, 100);
//! ```

pub mod flight;
pub mod transceiver;

pub use flight::{FlightConfig, SimulatedFlight};
pub use transceiver::{SimCommand, SimTransceiver};
