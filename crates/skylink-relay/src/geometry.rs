//! Antenna pointing geometry

use serde::{Deserialize, Serialize};
use skylink_protocol::GeoPosition;

use crate::calculations::round2;

/// WGS84 semi-major axis in metres
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Rotator azimuth and elevation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointingAngles {
    /// Clockwise from north, in [0, 360)
    pub azimuth: f64,
    /// Above the horizon, in [0, 90]
    pub elevation: f64,
}

/// Earth-centred Earth-fixed coordinates in metres
pub fn geodetic_to_ecef(position: &GeoPosition) -> [f64; 3] {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let lat = position.latitude.to_radians();
    let lon = position.longitude.to_radians();
    let n = WGS84_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    [
        (n + position.altitude) * lat.cos() * lon.cos(),
        (n + position.altitude) * lat.cos() * lon.sin(),
        (n * (1.0 - e2) + position.altitude) * lat.sin(),
    ]
}

/// Angles from `observer` towards `target`
///
/// Returns `None` when the geometry is degenerate, e.g. both positions
/// are identical or the observer sits on the polar axis.
pub fn pointing_angles(observer: &GeoPosition, target: &GeoPosition) -> Option<PointingAngles> {
    let [x, y, z] = geodetic_to_ecef(observer);
    let [tx, ty, tz] = geodetic_to_ecef(target);
    let (dx, dy, dz) = (tx - x, ty - y, tz - z);

    let r2 = x * x + y * y + z * z;
    let v2 = dx * dx + dy * dy + dz * dz;
    let p2 = x * x + y * y;

    let elevation_cos = (x * dx + y * dy + z * dz) / (r2 * v2).sqrt();
    let azimuth_cos = (-z * x * dx - z * y * dy + p2 * dz) / (p2 * r2 * v2).sqrt();
    let azimuth_sin = (-y * dx + x * dy) / (p2 * v2).sqrt();

    let elevation = 90.0 - elevation_cos.clamp(-1.0, 1.0).acos().to_degrees();
    let mut azimuth = azimuth_sin.atan2(azimuth_cos).to_degrees();
    if azimuth < 0.0 {
        azimuth += 360.0;
    }

    if !elevation.is_finite() || !azimuth.is_finite() {
        return None;
    }

    let azimuth = round2(azimuth);
    Some(PointingAngles {
        azimuth: if azimuth >= 360.0 { 0.0 } else { azimuth },
        elevation: round2(elevation.max(0.0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ecef_equator_prime_meridian() {
        let [x, y, z] = geodetic_to_ecef(&GeoPosition::new(0.0, 0.0, 0.0));
        assert!((x - WGS84_A).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        assert!(z.abs() < 1e-6);
    }

    #[test]
    fn test_due_east_on_equator() {
        let angles = pointing_angles(
            &GeoPosition::new(0.0, 0.0, 0.0),
            &GeoPosition::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert!((angles.azimuth - 90.0).abs() < 0.01);
        assert!(angles.elevation < 90.0);
        assert_eq!(angles.elevation, 0.0);
    }

    #[test]
    fn test_due_north_and_overhead() {
        let observer = GeoPosition::new(56.95, 24.1, 10.0);
        let north = pointing_angles(&observer, &GeoPosition::new(57.5, 24.1, 30_000.0)).unwrap();
        assert!(north.azimuth < 1.0 || north.azimuth > 359.0);
        assert!(north.elevation > 0.0);

        let overhead = pointing_angles(&observer, &GeoPosition::new(56.95, 24.1, 20_000.0)).unwrap();
        // elevation is measured against the geocentric radius, not the ellipsoid normal
        assert!(overhead.elevation > 89.0);
    }

    #[test]
    fn test_identical_positions_are_degenerate() {
        let p = GeoPosition::new(56.95, 24.1, 10.0);
        assert_eq!(pointing_angles(&p, &p), None);
    }

    proptest! {
        #[test]
        fn angles_stay_in_range(
            lat in -80.0f64..80.0,
            lon in -179.0f64..179.0,
            dlat in -2.0f64..2.0,
            dlon in -2.0f64..2.0,
            alt in 0.0f64..40_000.0,
        ) {
            let observer = GeoPosition::new(lat, lon, 5.0);
            let target = GeoPosition::new(lat + dlat, lon + dlon, alt);
            if let Some(angles) = pointing_angles(&observer, &target) {
                prop_assert!((0.0..360.0).contains(&angles.azimuth));
                prop_assert!((0.0..=90.0).contains(&angles.elevation));
            }
        }
    }
}
