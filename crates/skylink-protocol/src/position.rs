/// Geodetic position in degrees and metres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoPosition {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }

    /// True when no component is zero
    ///
    /// A zero latitude, longitude or altitude is the "no fix yet" marker
    /// reported by the flight computers before GPS lock.
    pub fn has_fix(&self) -> bool {
        self.latitude != 0.0 && self.longitude != 0.0 && self.altitude != 0.0
    }

    /// True when latitude and longitude are both set
    pub fn has_horizontal_fix(&self) -> bool {
        self.latitude != 0.0 && self.longitude != 0.0
    }
}

impl std::fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}, {:.1} m", self.latitude, self.longitude, self.altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_detection() {
        assert!(!GeoPosition::default().has_fix());
        assert!(!GeoPosition::new(56.9, 24.1, 0.0).has_fix());
        assert!(GeoPosition::new(56.9, 24.1, 0.0).has_horizontal_fix());
        assert!(GeoPosition::new(56.9, 24.1, 12.0).has_fix());
    }
}
