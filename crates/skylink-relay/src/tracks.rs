//! Position histories for map displays
//!
//! Vehicle tracks grow by one point per new, distinct fix. The rotator has
//! no history, only its latest position.

use serde::Serialize;
use skylink_protocol::{GeoPosition, Vehicle};

/// `(latitude, longitude)` in degrees
pub type Coordinate = (f64, f64);

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PositionTracks {
    pub payload: Vec<Coordinate>,
    pub balloon: Vec<Coordinate>,
    pub rotator: Option<Coordinate>,
    /// Bumped on every change
    pub revision: u64,
}

impl PositionTracks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, vehicle: Vehicle) -> &[Coordinate] {
        match vehicle {
            Vehicle::Payload => &self.payload,
            Vehicle::Balloon => &self.balloon,
        }
    }

    /// Append a vehicle fix unless it is zero or already recorded
    ///
    /// Returns whether the track changed.
    pub fn record_vehicle(&mut self, vehicle: Vehicle, position: &GeoPosition) -> bool {
        if !position.has_horizontal_fix() {
            return false;
        }
        let point = (position.latitude, position.longitude);
        let track = match vehicle {
            Vehicle::Payload => &mut self.payload,
            Vehicle::Balloon => &mut self.balloon,
        };
        if track.contains(&point) {
            return false;
        }
        track.push(point);
        self.revision += 1;
        true
    }

    /// Replace the rotator position unless it is zero or unchanged
    pub fn record_rotator(&mut self, position: &GeoPosition) -> bool {
        if !position.has_horizontal_fix() {
            return false;
        }
        let point = (position.latitude, position.longitude);
        if self.rotator == Some(point) {
            return false;
        }
        self.rotator = Some(point);
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_track_skips_zero_and_duplicates() {
        let mut tracks = PositionTracks::new();
        assert!(!tracks.record_vehicle(Vehicle::Payload, &GeoPosition::default()));
        assert!(tracks.record_vehicle(Vehicle::Payload, &GeoPosition::new(56.9, 24.0, 100.0)));
        // altitude alone does not make a new point
        assert!(!tracks.record_vehicle(Vehicle::Payload, &GeoPosition::new(56.9, 24.0, 900.0)));
        assert!(tracks.record_vehicle(Vehicle::Payload, &GeoPosition::new(56.91, 24.0, 900.0)));

        assert_eq!(tracks.track(Vehicle::Payload), &[(56.9, 24.0), (56.91, 24.0)]);
        assert!(tracks.track(Vehicle::Balloon).is_empty());
        assert_eq!(tracks.revision, 2);
    }

    #[test]
    fn test_rotator_is_replaced() {
        let mut tracks = PositionTracks::new();
        assert!(tracks.record_rotator(&GeoPosition::new(56.95, 24.1, 10.0)));
        assert!(!tracks.record_rotator(&GeoPosition::new(56.95, 24.1, 10.0)));
        assert!(tracks.record_rotator(&GeoPosition::new(57.0, 24.2, 10.0)));
        assert_eq!(tracks.rotator, Some((57.0, 24.2)));
        assert_eq!(tracks.revision, 2);
    }
}
