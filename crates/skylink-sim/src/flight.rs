//! Simulated balloon flight
//!
//! Produces essential telemetry of a vehicle rising at a constant rate and
//! drifting with a constant wind.

use serde::{Deserialize, Serialize};
use skylink_protocol::ccsds::{self, SEQUENCE_COUNT_MASK};
use skylink_protocol::{EncodeError, FieldValue, GeoPosition, Timestamp, Vehicle};

/// Configuration for creating a simulated flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightConfig {
    pub vehicle: Vehicle,
    /// Launch site
    pub launch: GeoPosition,
    /// Vertical speed in m/s
    pub ascent_rate: f64,
    /// Drift per second in degrees (latitude, longitude)
    pub drift: (f64, f64),
    pub satellites: i32,
    pub rssi: f32,
    pub snr: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            vehicle: Vehicle::Payload,
            launch: GeoPosition::new(56.9496, 24.1052, 10.0),
            ascent_rate: 5.0,
            drift: (0.0001, 0.0002),
            satellites: 9,
            rssi: -85.0,
            snr: 7.5,
        }
    }
}

/// A vehicle in flight
#[derive(Debug, Clone)]
pub struct SimulatedFlight {
    config: FlightConfig,
    position: GeoPosition,
    elapsed_secs: f64,
    sequence: u16,
}

impl SimulatedFlight {
    pub fn new(config: FlightConfig) -> Self {
        Self {
            position: config.launch,
            config,
            elapsed_secs: 0.0,
            sequence: 0,
        }
    }

    pub fn vehicle(&self) -> Vehicle {
        self.config.vehicle
    }

    pub fn position(&self) -> GeoPosition {
        self.position
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Advance the flight by `dt` seconds
    pub fn advance(&mut self, dt: f64) {
        self.elapsed_secs += dt;
        self.position.latitude += self.config.drift.0 * dt;
        self.position.longitude += self.config.drift.1 * dt;
        self.position.altitude += self.config.ascent_rate * dt;
    }

    /// Essential telemetry fields at the current position
    pub fn essential_fields(&self) -> [FieldValue; 8] {
        [
            FieldValue::Float(self.position.latitude as f32),
            FieldValue::Float(self.position.longitude as f32),
            FieldValue::Float(self.position.altitude as f32),
            FieldValue::Float(self.position.altitude as f32),
            FieldValue::Int(self.config.satellites),
            FieldValue::Int(0),
            FieldValue::Float(self.config.rssi),
            FieldValue::Float(self.config.snr),
        ]
    }

    /// Encode an essential telemetry packet stamped with `timestamp`
    pub fn essential_packet(&mut self, timestamp: Timestamp) -> Result<Vec<u8>, EncodeError> {
        let sequence = self.sequence;
        self.sequence = (self.sequence + 1) & SEQUENCE_COUNT_MASK;
        ccsds::encode_telemetry_at(
            self.config.vehicle.essential_apid().value(),
            sequence,
            &self.essential_fields(),
            timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_protocol::schema::ESSENTIAL_SCHEMA;

    #[test]
    fn test_flight_rises() {
        let mut flight = SimulatedFlight::new(FlightConfig::default());
        flight.advance(10.0);
        assert_eq!(flight.position().altitude, 60.0);
        assert!(flight.position().latitude > 56.9496);
        assert_eq!(flight.elapsed_secs(), 10.0);
    }

    #[test]
    fn test_essential_packet_matches_schema() {
        let mut flight = SimulatedFlight::new(FlightConfig {
            vehicle: Vehicle::Balloon,
            ..Default::default()
        });
        let first = ccsds::decode(&flight.essential_packet(Timestamp::new(10, 0)).unwrap()).unwrap();
        let second = ccsds::decode(&flight.essential_packet(Timestamp::new(15, 0)).unwrap()).unwrap();

        assert_eq!(first.apid, 200);
        assert_eq!(second.sequence_count, 1);
        assert_eq!(second.timestamp, Some(Timestamp::new(15, 0)));
        let fields = ESSENTIAL_SCHEMA.decode(&first.data).unwrap();
        assert_eq!(fields[4], FieldValue::Int(9));
    }
}
