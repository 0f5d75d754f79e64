//! Static APID and command-id tables
//!
//! Application ids partition the 0-2047 space into fixed bands:
//!
//! | Band      | Meaning                                   |
//! |-----------|-------------------------------------------|
//! | 10-30     | Telecommand classes (payload, balloon, rotator) |
//! | 50        | Rotator position telemetry                |
//! | 60-80     | Derived calculations                      |
//! | 100-104   | Payload flight computer telemetry         |
//! | 200-205   | Balloon flight computer telemetry         |
//!
//! Telecommands share one APID per class and are told apart by the 16-bit
//! packet id at the start of their user data ([`CommandId`]).

id_table! {
    /// Telemetry application ids
    pub enum TelemetryApid ("telemetry apid") {
        /// Rotator GPS position (latitude, longitude, altitude)
        RotatorPosition = 50 => "rotator_position",
        /// Derived telemetry of the payload flight computer
        PayloadCalculations = 60 => "pfc_calculations",
        /// Derived telemetry of the balloon flight computer
        BalloonCalculations = 70 => "bfc_calculations",
        /// Derived rotator telemetry
        RotatorCalculations = 80 => "rotator_calculations",
        PayloadEssential = 100 => "pfc_essential",
        PayloadFull = 101 => "pfc_full",
        PayloadInfoError = 102 => "pfc_info_error",
        PayloadFormat = 103 => "pfc_format",
        PayloadEjection = 104 => "pfc_ejection",
        BalloonEssential = 200 => "bfc_essential",
        BalloonFull = 201 => "bfc_full",
        BalloonInfoError = 202 => "bfc_info_error",
        BalloonFormat = 203 => "bfc_format",
        /// Reaction-wheel controller mode
        BalloonRwcMode = 204 => "bfc_rwc_mode",
        BalloonEjection = 205 => "bfc_ejection",
    }
}

id_table! {
    /// Telecommand classes, one APID per commanded subsystem
    pub enum TelecommandClass ("telecommand apid") {
        Payload = 10 => "pfc",
        Balloon = 20 => "bfc",
        Rotator = 30 => "rotator",
    }
}

id_table! {
    /// Telecommand packet ids
    pub enum CommandId ("command id") {
        PayloadCompleteDataRequest = 1000 => "pfc_complete_data_request",
        PayloadInfoErrorRequest = 1001 => "pfc_info_error_request",
        PayloadFormatStorageRequest = 1002 => "pfc_format_storage_request",
        PayloadEjectionRequest = 1003 => "pfc_ejection_request",
        PayloadServoResetRequest = 1005 => "pfc_servo_reset_request",
        BalloonCompleteDataRequest = 2000 => "bfc_complete_data_request",
        BalloonInfoErrorRequest = 2001 => "bfc_info_error_request",
        BalloonFormatStorageRequest = 2002 => "bfc_format_storage_request",
        BalloonRwcSetModeRequest = 2003 => "bfc_rwc_set_mode_request",
        BalloonEjectionRequest = 2004 => "bfc_ejection_request",
        /// Select which vehicle the rotator tracks (1 byte: 0 payload, 1 balloon)
        RotatorSetTarget = 3000 => "rotator_set_target_request",
        /// Return rotator control to automatic tracking
        RotatorAutoTracking = 3001 => "rotator_auto_tracking_request",
        /// Return rotator position to automatic (GPS) mode
        RotatorAutoPosition = 3002 => "rotator_auto_rotator_position_request",
        /// Override rotator position (3 floats)
        RotatorManualPosition = 3003 => "rotator_manual_rotator_position_request",
        /// Override pointing angles (2 floats)
        RotatorManualAngles = 3004 => "rotator_manual_angles_request",
        /// Override target position (3 floats)
        RotatorManualTargetPosition = 3005 => "rotator_manual_target_coordinates_request",
        /// Angle command sent from the ground station to the rotator hardware
        RotatorAngles = 3100 => "rotator_angles_request",
    }
}

impl TelemetryApid {
    /// Vehicle whose flight computer produces this packet, if any
    pub fn vehicle(self) -> Option<Vehicle> {
        match self.value() {
            100..=199 | 60 => Some(Vehicle::Payload),
            200..=299 | 70 => Some(Vehicle::Balloon),
            _ => None,
        }
    }

    /// Returns true for the per-cycle essential status packets
    pub fn is_essential(self) -> bool {
        matches!(self, Self::PayloadEssential | Self::BalloonEssential)
    }
}

impl CommandId {
    /// Returns true for commands consumed by the ground-station rotator
    pub fn is_rotator_control(self) -> bool {
        matches!(
            self,
            Self::RotatorSetTarget
                | Self::RotatorAutoTracking
                | Self::RotatorAutoPosition
                | Self::RotatorManualPosition
                | Self::RotatorManualAngles
                | Self::RotatorManualTargetPosition
        )
    }
}

/// A tracked flight vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Vehicle {
    /// Payload flight computer (`pfc`)
    #[default]
    Payload,
    /// Balloon flight computer (`bfc`)
    Balloon,
}

impl Vehicle {
    /// Both vehicles, payload first
    pub const ALL: [Vehicle; 2] = [Vehicle::Payload, Vehicle::Balloon];

    /// Short code used in tables and logs
    pub fn code(self) -> &'static str {
        match self {
            Self::Payload => "pfc",
            Self::Balloon => "bfc",
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Payload => "Payload",
            Self::Balloon => "Balloon",
        }
    }

    /// APID of this vehicle's essential telemetry
    pub fn essential_apid(self) -> TelemetryApid {
        match self {
            Self::Payload => TelemetryApid::PayloadEssential,
            Self::Balloon => TelemetryApid::BalloonEssential,
        }
    }

    /// APID the ground station uses for this vehicle's derived telemetry
    pub fn calculations_apid(self) -> TelemetryApid {
        match self {
            Self::Payload => TelemetryApid::PayloadCalculations,
            Self::Balloon => TelemetryApid::BalloonCalculations,
        }
    }

    /// Telecommand class addressing this vehicle
    pub fn telecommand_class(self) -> TelecommandClass {
        match self {
            Self::Payload => TelecommandClass::Payload,
            Self::Balloon => TelecommandClass::Balloon,
        }
    }

    /// Decode the target selector byte of a set-target command
    pub fn from_target_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Payload),
            1 => Some(Self::Balloon),
            _ => None,
        }
    }

    /// Index used by the set-target command
    pub fn target_index(self) -> u8 {
        match self {
            Self::Payload => 0,
            Self::Balloon => 1,
        }
    }
}

impl std::fmt::Display for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
