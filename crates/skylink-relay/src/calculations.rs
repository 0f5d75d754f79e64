//! Derived flight metrics
//!
//! All results are rounded to two decimals. Speeds are per second of
//! packet time. Horizontal speed and straight-line distance treat latitude
//! and longitude as planar degrees, matching what the mission dashboards
//! have always shown.

use skylink_protocol::GeoPosition;

/// Mean Earth radius used by the haversine distance
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Altitude change per second
pub fn vertical_speed(old_altitude: f64, new_altitude: f64, dt: f64) -> f64 {
    round2((new_altitude - old_altitude) / dt)
}

/// Planar degree distance per second
pub fn horizontal_speed(old: &GeoPosition, new: &GeoPosition, dt: f64) -> f64 {
    let dlat = new.latitude - old.latitude;
    let dlon = new.longitude - old.longitude;
    round2((dlat * dlat + dlon * dlon).sqrt() / dt)
}

pub fn total_speed(horizontal: f64, vertical: f64) -> f64 {
    round2((horizontal * horizontal + vertical * vertical).sqrt())
}

/// Great-circle ground distance in kilometres
pub fn haversine_km(a: &GeoPosition, b: &GeoPosition) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round2(EARTH_RADIUS_KM * c)
}

/// Euclidean norm of (Δlat°, Δlon°, Δalt m), divided by 1000
pub fn straight_line_distance(a: &GeoPosition, b: &GeoPosition) -> f64 {
    let dlat = b.latitude - a.latitude;
    let dlon = b.longitude - a.longitude;
    let dalt = b.altitude - a.altitude;
    round2((dlat * dlat + dlon * dlon + dalt * dalt).sqrt() / 1000.0)
}

/// Store `value` only if it is a real number
pub(crate) fn set_if_finite(slot: &mut f64, value: f64) {
    if value.is_finite() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_speed() {
        assert_eq!(vertical_speed(100.0, 110.0, 5.0), 2.0);
        assert_eq!(vertical_speed(110.0, 100.0, 4.0), -2.5);
        assert!(!vertical_speed(100.0, 110.0, 0.0).is_finite());
    }

    #[test]
    fn test_horizontal_and_total() {
        let old = GeoPosition::new(56.0, 24.0, 0.0);
        let new = GeoPosition::new(56.03, 24.04, 0.0);
        assert_eq!(horizontal_speed(&old, &new, 0.01), 5.0);
        assert_eq!(total_speed(3.0, 4.0), 5.0);
    }

    #[test]
    fn test_haversine_one_degree_of_longitude_on_equator() {
        let a = GeoPosition::new(0.0, 0.0, 0.0);
        let b = GeoPosition::new(0.0, 1.0, 0.0);
        assert_eq!(haversine_km(&a, &b), 111.19);
        assert_eq!(haversine_km(&a, &a), 0.0);
    }

    #[test]
    fn test_straight_line_mixes_units() {
        let a = GeoPosition::new(56.0, 24.0, 0.0);
        let b = GeoPosition::new(56.0, 24.0, 3000.0);
        assert_eq!(straight_line_distance(&a, &b), 3.0);
    }

    #[test]
    fn test_set_if_finite() {
        let mut slot = 1.5;
        set_if_finite(&mut slot, f64::INFINITY);
        set_if_finite(&mut slot, f64::NAN);
        assert_eq!(slot, 1.5);
        set_if_finite(&mut slot, 2.0);
        assert_eq!(slot, 2.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.005_1), -0.01);
    }
}
