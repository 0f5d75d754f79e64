//! Rotator telecommands
//!
//! Mission control steers the ground-station antenna rotator with
//! telecommands that the relay consumes instead of forwarding. The rotator
//! hardware itself is driven with [`encode_rotator_angles`].

use crate::apid::{CommandId, TelecommandClass, Vehicle};
use crate::ccsds;
use crate::error::{CommandError, EncodeError};
use crate::field::{FieldType, FieldValue};
use crate::position::GeoPosition;

/// A decoded rotator control command
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RotatorCommand {
    /// Select the tracked vehicle; `None` for an unknown selector byte
    SetTarget { target: Option<Vehicle> },
    AutoTracking,
    AutoRotatorPosition,
    ManualRotatorPosition { position: GeoPosition },
    ManualAngles { azimuth: f64, elevation: f64 },
    ManualTargetPosition { position: GeoPosition },
}

impl RotatorCommand {
    /// Decode a rotator command from its packet id and argument bytes
    ///
    /// Returns `Ok(None)` when the id is not a rotator control command.
    pub fn decode(packet_id: u16, args: &[u8]) -> Result<Option<Self>, CommandError> {
        let Ok(id) = CommandId::try_from(packet_id) else {
            return Ok(None);
        };
        let command = match id {
            CommandId::RotatorSetTarget => {
                let byte = *args.first().ok_or(CommandError::MissingArguments {
                    command: id.name(),
                    needed: 1,
                    actual: 0,
                })?;
                Self::SetTarget {
                    target: Vehicle::from_target_index(byte),
                }
            }
            CommandId::RotatorAutoTracking => Self::AutoTracking,
            CommandId::RotatorAutoPosition => Self::AutoRotatorPosition,
            CommandId::RotatorManualPosition => {
                let [lat, lon, alt] = read_floats::<3>(id, args)?;
                Self::ManualRotatorPosition {
                    position: GeoPosition::new(lat, lon, alt),
                }
            }
            CommandId::RotatorManualAngles => {
                let [azimuth, elevation] = read_floats::<2>(id, args)?;
                Self::ManualAngles { azimuth, elevation }
            }
            CommandId::RotatorManualTargetPosition => {
                let [lat, lon, alt] = read_floats::<3>(id, args)?;
                Self::ManualTargetPosition {
                    position: GeoPosition::new(lat, lon, alt),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Command id this command is sent with
    pub fn command_id(&self) -> CommandId {
        match self {
            Self::SetTarget { .. } => CommandId::RotatorSetTarget,
            Self::AutoTracking => CommandId::RotatorAutoTracking,
            Self::AutoRotatorPosition => CommandId::RotatorAutoPosition,
            Self::ManualRotatorPosition { .. } => CommandId::RotatorManualPosition,
            Self::ManualAngles { .. } => CommandId::RotatorManualAngles,
            Self::ManualTargetPosition { .. } => CommandId::RotatorManualTargetPosition,
        }
    }

    /// Encode as a rotator-class telecommand
    ///
    /// The set-target selector is a single byte, so it cannot go through the
    /// 4-byte field list and is appended raw.
    pub fn encode(&self, sequence_count: u16) -> Result<Vec<u8>, EncodeError> {
        let apid = TelecommandClass::Rotator.value();
        let id = self.command_id().value();
        match self {
            Self::SetTarget { target } => {
                let mut bytes = ccsds::encode_telecommand(apid, sequence_count, id, &[])?;
                bytes.push(target.map_or(u8::MAX, Vehicle::target_index));
                // data length grows with the appended byte
                let len = u16::from_be_bytes([bytes[4], bytes[5]]) + 1;
                bytes[4..6].copy_from_slice(&len.to_be_bytes());
                Ok(bytes)
            }
            _ => ccsds::encode_telecommand(apid, sequence_count, id, &self.to_fields()),
        }
    }

    fn to_fields(self) -> Vec<FieldValue> {
        let f = |v: f64| FieldValue::Float(v as f32);
        match self {
            Self::ManualRotatorPosition { position } | Self::ManualTargetPosition { position } => {
                vec![f(position.latitude), f(position.longitude), f(position.altitude)]
            }
            Self::ManualAngles { azimuth, elevation } => vec![f(azimuth), f(elevation)],
            _ => Vec::new(),
        }
    }
}

fn read_floats<const N: usize>(id: CommandId, args: &[u8]) -> Result<[f64; N], CommandError> {
    let needed = N * FieldType::SIZE;
    if args.len() < needed {
        return Err(CommandError::MissingArguments {
            command: id.name(),
            needed,
            actual: args.len(),
        });
    }
    let mut out = [0.0; N];
    for (slot, chunk) in out.iter_mut().zip(args.chunks_exact(FieldType::SIZE)) {
        *slot = f64::from(f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

/// Build the angle command sent to the rotator hardware
pub fn encode_rotator_angles(
    sequence_count: u16,
    azimuth: f64,
    elevation: f64,
) -> Result<Vec<u8>, EncodeError> {
    ccsds::encode_telecommand(
        TelecommandClass::Rotator.value(),
        sequence_count,
        CommandId::RotatorAngles.value(),
        &[FieldValue::Float(azimuth as f32), FieldValue::Float(elevation as f32)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(command: RotatorCommand) -> Option<RotatorCommand> {
        let bytes = command.encode(1).unwrap();
        let packet = ccsds::decode(&bytes).unwrap();
        assert_eq!(packet.apid, TelecommandClass::Rotator.value());
        let id = packet.packet_id().unwrap();
        RotatorCommand::decode(id, packet.command_data()).unwrap()
    }

    #[test]
    fn test_encode_decode_commands() {
        let commands = [
            RotatorCommand::SetTarget { target: Some(Vehicle::Balloon) },
            RotatorCommand::AutoTracking,
            RotatorCommand::AutoRotatorPosition,
            RotatorCommand::ManualRotatorPosition {
                position: GeoPosition::new(56.5, 24.25, 10.0),
            },
            RotatorCommand::ManualAngles { azimuth: 180.0, elevation: 45.5 },
            RotatorCommand::ManualTargetPosition {
                position: GeoPosition::new(57.0, 25.0, 20_000.0),
            },
        ];
        for command in commands {
            assert_eq!(roundtrip(command), Some(command));
        }
    }

    #[test]
    fn test_set_target_data_length() {
        let bytes = RotatorCommand::SetTarget { target: Some(Vehicle::Payload) }
            .encode(3)
            .unwrap();
        let packet = ccsds::decode(&bytes).unwrap();
        assert_eq!(packet.data, vec![0x0B, 0xB8, 0x00]);
        assert_eq!(usize::from(packet.data_length), packet.data.len() - 1);
    }

    #[test]
    fn test_unknown_target_byte_is_consumed() {
        assert_eq!(
            RotatorCommand::decode(3000, &[9]),
            Ok(Some(RotatorCommand::SetTarget { target: None }))
        );
    }

    #[test]
    fn test_non_rotator_ids() {
        assert_eq!(RotatorCommand::decode(1003, &[]), Ok(None));
        assert_eq!(RotatorCommand::decode(3100, &[0; 8]), Ok(None));
        assert_eq!(RotatorCommand::decode(4242, &[]), Ok(None));
    }

    #[test]
    fn test_missing_arguments() {
        assert_eq!(
            RotatorCommand::decode(3004, &[0; 4]),
            Err(CommandError::MissingArguments {
                command: "rotator_manual_angles_request",
                needed: 8,
                actual: 4
            })
        );
        assert!(RotatorCommand::decode(3000, &[]).is_err());
    }

    #[test]
    fn test_rotator_angles_packet() {
        let bytes = encode_rotator_angles(7, 123.45, 10.5).unwrap();
        let packet = ccsds::decode(&bytes).unwrap();
        assert_eq!(packet.apid, 30);
        assert_eq!(packet.sequence_count, 7);
        assert_eq!(packet.packet_id(), Some(3100));
        let args = packet.command_data();
        assert_eq!(&args[0..4], &123.45f32.to_be_bytes());
        assert_eq!(&args[4..8], &10.5f32.to_be_bytes());
    }
}
