//! Per-vehicle telemetry state
//!
//! The packet processor is the only writer. Readers get cloned
//! [`TelemetryState`] snapshots through a `watch` channel.

use serde::Serialize;
use skylink_protocol::ccsds::{self, SEQUENCE_COUNT_MASK};
use skylink_protocol::schema::{Schema, ESSENTIAL_SCHEMA};
use skylink_protocol::{EncodeError, FieldValue, GeoPosition, Timestamp, Vehicle};

use crate::calculations::{
    haversine_km, horizontal_speed, set_if_finite, straight_line_distance, total_speed,
    vertical_speed,
};

/// Latest values of a fixed schema, zero until the first packet
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    schema: &'static Schema,
    values: Vec<f64>,
}

impl TelemetryRecord {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: vec![0.0; schema.fields.len()],
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// Overwrite every value from decoded fields, in schema order
    pub fn update(&mut self, fields: &[FieldValue]) {
        for (slot, field) in self.values.iter_mut().zip(fields) {
            *slot = field.as_f64();
        }
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name, *v))
    }

    /// GPS position of an essential record
    pub fn gps_position(&self) -> GeoPosition {
        GeoPosition::new(
            self.get("gps_latitude").unwrap_or(0.0),
            self.get("gps_longitude").unwrap_or(0.0),
            self.get("gps_altitude").unwrap_or(0.0),
        )
    }

    fn baro_altitude(&self) -> f64 {
        self.get("baro_altitude").unwrap_or(0.0)
    }
}

/// Metrics derived from consecutive essential samples
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CalculationRecord {
    pub gps_vertical_speed: f64,
    pub baro_vertical_speed: f64,
    pub horizontal_speed: f64,
    pub gps_total_speed: f64,
    pub ground_distance_to_rotator: f64,
    pub straight_line_distance_to_rotator: f64,
}

impl CalculationRecord {
    /// Recompute from the previous and the new sample
    ///
    /// Each metric keeps its previous value when its inputs are missing or
    /// degenerate. Nothing is computed until the previous sample had a fix.
    pub fn update(
        &mut self,
        old: &TelemetryRecord,
        new: &TelemetryRecord,
        dt: f64,
        rotator: &GeoPosition,
    ) {
        let old_pos = old.gps_position();
        if !old_pos.has_horizontal_fix() {
            return;
        }
        let new_pos = new.gps_position();

        set_if_finite(
            &mut self.gps_vertical_speed,
            vertical_speed(old_pos.altitude, new_pos.altitude, dt),
        );
        set_if_finite(
            &mut self.baro_vertical_speed,
            vertical_speed(old.baro_altitude(), new.baro_altitude(), dt),
        );
        set_if_finite(&mut self.horizontal_speed, horizontal_speed(&old_pos, &new_pos, dt));
        set_if_finite(
            &mut self.gps_total_speed,
            total_speed(self.horizontal_speed, self.gps_vertical_speed),
        );

        if rotator.has_horizontal_fix() {
            set_if_finite(
                &mut self.ground_distance_to_rotator,
                haversine_km(rotator, &new_pos),
            );
            set_if_finite(
                &mut self.straight_line_distance_to_rotator,
                straight_line_distance(rotator, &new_pos),
            );
        }
    }

    /// Wire fields in calculation-schema order
    pub fn to_fields(&self) -> [FieldValue; 6] {
        [
            self.gps_vertical_speed,
            self.baro_vertical_speed,
            self.horizontal_speed,
            self.gps_total_speed,
            self.ground_distance_to_rotator,
            self.straight_line_distance_to_rotator,
        ]
        .map(|v| FieldValue::Float(v as f32))
    }
}

/// Telemetry and derived metrics of one vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleTelemetry {
    pub vehicle: Vehicle,
    pub record: TelemetryRecord,
    pub calculations: CalculationRecord,
    pub last_timestamp: Option<Timestamp>,
    /// Essential packets received
    pub samples: u64,
    calc_sequence: u16,
}

impl VehicleTelemetry {
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            vehicle,
            record: TelemetryRecord::new(&ESSENTIAL_SCHEMA),
            calculations: CalculationRecord::default(),
            last_timestamp: None,
            samples: 0,
            calc_sequence: 0,
        }
    }

    /// Store a new essential sample and refresh the derived metrics
    pub fn ingest(&mut self, fields: &[FieldValue], timestamp: Timestamp, rotator: &GeoPosition) {
        let old = self.record.clone();
        self.record.update(fields);

        let dt = match self.last_timestamp {
            Some(prev) => timestamp.as_secs_f64() - prev.as_secs_f64(),
            None => 0.0,
        };
        self.calculations.update(&old, &self.record, dt, rotator);

        self.last_timestamp = Some(timestamp);
        self.samples += 1;
    }

    /// Encode the current metrics on this vehicle's calculation APID
    ///
    /// Each call consumes one sequence number.
    pub fn calculation_packet(&mut self) -> Result<Vec<u8>, EncodeError> {
        let sequence = self.calc_sequence;
        self.calc_sequence = (self.calc_sequence + 1) & SEQUENCE_COUNT_MASK;
        ccsds::encode_telemetry(
            self.vehicle.calculations_apid().value(),
            sequence,
            &self.calculations.to_fields(),
        )
    }

    pub fn position(&self) -> GeoPosition {
        self.record.gps_position()
    }
}

/// Snapshot published by the processor
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryState {
    pub payload: VehicleTelemetry,
    pub balloon: VehicleTelemetry,
    /// Last rotator GPS position reported on the rotator APID
    pub rotator_position: GeoPosition,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            payload: VehicleTelemetry::new(Vehicle::Payload),
            balloon: VehicleTelemetry::new(Vehicle::Balloon),
            rotator_position: GeoPosition::default(),
        }
    }
}

impl TelemetryState {
    pub fn vehicle(&self, vehicle: Vehicle) -> &VehicleTelemetry {
        match vehicle {
            Vehicle::Payload => &self.payload,
            Vehicle::Balloon => &self.balloon,
        }
    }

    pub fn vehicle_mut(&mut self, vehicle: Vehicle) -> &mut VehicleTelemetry {
        match vehicle {
            Vehicle::Payload => &mut self.payload,
            Vehicle::Balloon => &mut self.balloon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn essential(lat: f32, lon: f32, alt: f32, baro: f32) -> Vec<FieldValue> {
        vec![
            FieldValue::Float(lat),
            FieldValue::Float(lon),
            FieldValue::Float(alt),
            FieldValue::Float(baro),
            FieldValue::Int(9),
            FieldValue::Int(0),
            FieldValue::Float(-80.0),
            FieldValue::Float(7.5),
        ]
    }

    #[test]
    fn test_record_defaults_to_zero() {
        let record = TelemetryRecord::new(&ESSENTIAL_SCHEMA);
        assert!(record.iter().all(|(_, v)| v == 0.0));
        assert_eq!(record.iter().count(), 8);
        assert_eq!(record.get("nope"), None);
    }

    #[test]
    fn test_vertical_speed_from_two_samples() {
        let rotator = GeoPosition::new(56.95, 24.1, 10.0);
        let mut vt = VehicleTelemetry::new(Vehicle::Payload);
        vt.ingest(&essential(56.9, 24.0, 1000.0, 990.0), Timestamp::new(100, 0), &rotator);
        vt.ingest(&essential(56.9, 24.0, 1010.0, 1000.0), Timestamp::new(105, 0), &rotator);

        assert_eq!(vt.calculations.gps_vertical_speed, 2.0);
        assert_eq!(vt.calculations.baro_vertical_speed, 2.0);
        assert_eq!(vt.calculations.horizontal_speed, 0.0);
        assert_eq!(vt.calculations.gps_total_speed, 2.0);
        assert!(vt.calculations.ground_distance_to_rotator > 0.0);
        assert_eq!(vt.samples, 2);
    }

    #[test]
    fn test_no_fix_leaves_distances_at_zero() {
        let rotator = GeoPosition::new(56.95, 24.1, 10.0);
        let mut vt = VehicleTelemetry::new(Vehicle::Balloon);
        vt.ingest(&essential(0.0, 0.0, 0.0, 0.0), Timestamp::new(100, 0), &rotator);
        vt.ingest(&essential(56.9, 24.0, 1010.0, 1000.0), Timestamp::new(105, 0), &rotator);

        assert_eq!(vt.calculations, CalculationRecord::default());
    }

    #[test]
    fn test_zero_time_delta_keeps_previous_speeds() {
        let rotator = GeoPosition::default();
        let mut vt = VehicleTelemetry::new(Vehicle::Payload);
        vt.ingest(&essential(56.9, 24.0, 1000.0, 1000.0), Timestamp::new(100, 0), &rotator);
        vt.ingest(&essential(56.9, 24.0, 1010.0, 1010.0), Timestamp::new(105, 0), &rotator);
        // duplicate from the redundant link, same timestamp
        vt.ingest(&essential(56.9, 24.0, 1010.0, 1010.0), Timestamp::new(105, 0), &rotator);

        assert_eq!(vt.calculations.gps_vertical_speed, 2.0);
        // no rotator fix, so no distances
        assert_eq!(vt.calculations.ground_distance_to_rotator, 0.0);
    }

    #[test]
    fn test_calculation_packet_sequence() {
        let mut vt = VehicleTelemetry::new(Vehicle::Balloon);
        let first = ccsds::decode(&vt.calculation_packet().unwrap()).unwrap();
        let second = ccsds::decode(&vt.calculation_packet().unwrap()).unwrap();
        assert_eq!(first.apid, 70);
        assert_eq!(first.sequence_count, 0);
        assert_eq!(second.sequence_count, 1);
        assert_eq!(first.data.len(), 24);
    }
}
