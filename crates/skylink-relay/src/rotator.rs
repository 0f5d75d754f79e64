//! Antenna rotator tracking state machine
//!
//! # Modes
//!
//! Control mode and position mode are independent and each either `Auto` or
//! `Manual`:
//!
//! - **Control**: in `Auto` the target position follows the tracked vehicle's
//!   telemetry; `Manual` is entered by setting a target position or angles.
//! - **Position**: in `Auto` the rotator position follows the rotator GPS
//!   telemetry; `Manual` is entered by setting the position.
//!
//! Manual setters switch their mode to `Manual`. Only an explicit auto
//! command switches back.
//!
//! The state is owned by the rotator task ([`crate::rotator_task`]).

use serde::Serialize;
use skylink_protocol::{GeoPosition, RotatorCommand, Vehicle};
use tracing::{debug, info};

use crate::geometry::{pointing_angles, PointingAngles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Auto,
    Manual,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Auto => f.write_str("auto"),
            Mode::Manual => f.write_str("manual"),
        }
    }
}

/// An angle command ready for the rotator hardware
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleCommand {
    pub sequence: u16,
    pub angles: PointingAngles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotatorState {
    pub control_mode: Mode,
    pub position_mode: Mode,
    pub target: Vehicle,
    pub position: GeoPosition,
    pub target_position: GeoPosition,
    pub angles: PointingAngles,
    /// Latest command built from `angles`
    pub command: Option<PointingAngles>,
    pub last_sent_command: Option<PointingAngles>,
    /// Sequence number of the next transmitted command
    pub command_sequence: u16,
    #[serde(skip)]
    new_angles_required: bool,
}

impl Default for RotatorState {
    fn default() -> Self {
        Self {
            control_mode: Mode::Auto,
            position_mode: Mode::Auto,
            target: Vehicle::Payload,
            position: GeoPosition::default(),
            target_position: GeoPosition::default(),
            angles: PointingAngles::default(),
            command: None,
            last_sent_command: None,
            command_sequence: 1,
            new_angles_required: false,
        }
    }
}

impl RotatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_angles_required(&self) -> bool {
        self.new_angles_required
    }

    /// Apply a telecommand from mission control
    pub fn apply(&mut self, command: RotatorCommand) {
        match command {
            RotatorCommand::SetTarget { target: Some(target) } => self.set_target(target),
            RotatorCommand::SetTarget { target: None } => {
                debug!("Ignoring set-target command with unknown vehicle");
            }
            RotatorCommand::AutoTracking => self.set_control_mode(Mode::Auto),
            RotatorCommand::AutoRotatorPosition => self.set_position_mode(Mode::Auto),
            RotatorCommand::ManualRotatorPosition { position } => {
                self.set_manual_rotator_position(position)
            }
            RotatorCommand::ManualAngles { azimuth, elevation } => {
                self.set_manual_angles(azimuth, elevation)
            }
            RotatorCommand::ManualTargetPosition { position } => {
                self.set_manual_target_position(position)
            }
        }
    }

    pub fn set_target(&mut self, target: Vehicle) {
        if self.target != target {
            info!("Rotator target {} -> {}", self.target, target);
        }
        self.target = target;
    }

    pub fn set_control_mode(&mut self, mode: Mode) {
        if self.control_mode != mode {
            info!("Rotator control mode {} -> {}", self.control_mode, mode);
        }
        self.control_mode = mode;
    }

    pub fn set_position_mode(&mut self, mode: Mode) {
        if self.position_mode != mode {
            info!("Rotator position mode {} -> {}", self.position_mode, mode);
        }
        self.position_mode = mode;
    }

    /// Follow the rotator GPS; ignored in manual position mode
    pub fn set_auto_rotator_position(&mut self, position: GeoPosition) {
        if self.position_mode == Mode::Auto && position != self.position {
            self.position = position;
            self.new_angles_required = true;
        }
    }

    /// Follow the tracked vehicle; ignored in manual control mode
    pub fn set_auto_target_position(&mut self, position: GeoPosition) {
        if self.control_mode == Mode::Auto && position != self.target_position {
            self.target_position = position;
            self.new_angles_required = true;
        }
    }

    pub fn set_manual_rotator_position(&mut self, position: GeoPosition) {
        self.set_position_mode(Mode::Manual);
        info!("Rotator position set to {}", position);
        self.position = position;
        self.new_angles_required = true;
    }

    pub fn set_manual_target_position(&mut self, position: GeoPosition) {
        self.set_control_mode(Mode::Manual);
        info!("Rotator target position set to {}", position);
        self.target_position = position;
        self.new_angles_required = true;
    }

    /// Point the rotator directly
    ///
    /// The command is sent even if it equals the last one.
    pub fn set_manual_angles(&mut self, azimuth: f64, elevation: f64) {
        self.set_control_mode(Mode::Manual);
        let angles = PointingAngles { azimuth, elevation };
        info!("Rotator angles set to {:.2}, {:.2}", azimuth, elevation);
        self.angles = angles;
        self.command = Some(angles);
        self.last_sent_command = None;
        self.new_angles_required = false;
    }

    /// One control step: recompute angles if an input changed
    ///
    /// Nothing is computed until both positions have a fix.
    pub fn control(&mut self) {
        if !self.new_angles_required {
            return;
        }
        self.new_angles_required = false;

        if !self.position.has_fix() || !self.target_position.has_fix() {
            return;
        }
        match pointing_angles(&self.position, &self.target_position) {
            Some(angles) => {
                self.angles = angles;
                self.command = Some(angles);
            }
            None => debug!("Degenerate rotator geometry, keeping previous angles"),
        }
    }

    /// Take the current command if it differs from the last one sent
    ///
    /// Marks it sent and advances the sequence number.
    pub fn take_pending_command(&mut self) -> Option<AngleCommand> {
        let angles = self.command?;
        if self.last_sent_command == Some(angles) {
            return None;
        }
        let command = AngleCommand {
            sequence: self.command_sequence,
            angles,
        };
        self.last_sent_command = Some(angles);
        self.command_sequence = self.command_sequence.wrapping_add(1);
        Some(command)
    }
}
