//! Packet processor
//!
//! # Classification
//!
//! Each inbound packet is decoded and handled by the first matching rule:
//!
//! 1. **Telecommand class APID**: a rotator control command is consumed and
//!    handed to the rotator; anything else is forwarded unchanged, gated,
//!    to the transceiver that serves the command class.
//! 2. **Essential telemetry**: the vehicle's record and derived metrics are
//!    updated, a calculation packet is emitted, and the raw packet is
//!    mirrored to the control center.
//! 3. **Rotator position telemetry**: the rotator position is updated and
//!    the raw packet mirrored.
//! 4. Anything else is mirrored to the control center.
//!
//! The processor is the only writer of [`TelemetryState`]; the processor
//! task publishes a snapshot after every change.

use skylink_protocol::ccsds::{self, Packet};
use skylink_protocol::schema::{ESSENTIAL_SCHEMA, ROTATOR_POSITION_SCHEMA};
use skylink_protocol::{
    GeoPosition, RotatorCommand, TelecommandClass, TelemetryApid, Timestamp, Vehicle,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::packet::{Destination, InboundPacket, TaggedPacket};
use crate::rotator_task::RotatorHandle;
use crate::scheduler::StopSignal;
use crate::telemetry::TelemetryState;

/// Transceiver serving each telecommand class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRoutes {
    pub payload: Destination,
    pub balloon: Destination,
    pub rotator: Destination,
}

impl CommandRoutes {
    pub fn from_config(config: &RelayConfig) -> Self {
        let balloon = if config.transceiver.has_secondary() {
            Destination::Secondary
        } else {
            Destination::Primary
        };
        Self {
            payload: Destination::Primary,
            balloon,
            rotator: config.rotator_destination,
        }
    }

    pub fn destination(&self, class: TelecommandClass) -> Destination {
        match class {
            TelecommandClass::Payload => self.payload,
            TelecommandClass::Balloon => self.balloon,
            TelecommandClass::Rotator => self.rotator,
        }
    }
}

/// Everything produced by one inbound packet
#[derive(Debug, Default, PartialEq)]
pub struct ProcessorOutput {
    pub packets: Vec<TaggedPacket>,
    pub rotator_command: Option<RotatorCommand>,
}

pub struct PacketProcessor {
    state: TelemetryState,
    routes: CommandRoutes,
}

impl PacketProcessor {
    pub fn new(routes: CommandRoutes) -> Self {
        Self {
            state: TelemetryState::default(),
            routes,
        }
    }

    pub fn state(&self) -> &TelemetryState {
        &self.state
    }

    /// Decode and classify one raw packet
    pub fn process(&mut self, raw: &[u8]) -> Result<ProcessorOutput, RelayError> {
        let packet = ccsds::decode(raw)?;

        if let Ok(class) = TelecommandClass::try_from(packet.apid) {
            return Ok(self.process_telecommand(class, &packet, raw));
        }

        let mut output = ProcessorOutput::default();
        match TelemetryApid::try_from(packet.apid) {
            Ok(apid) if apid.is_essential() => {
                if let Some(vehicle) = apid.vehicle() {
                    self.update_vehicle(vehicle, &packet, &mut output);
                }
            }
            Ok(TelemetryApid::RotatorPosition) => self.update_rotator_position(&packet),
            Ok(_) => {}
            Err(_) => debug!("Unknown apid {}, mirroring", packet.apid),
        }
        output.packets.push(TaggedPacket::to_yamcs(raw.to_vec()));
        Ok(output)
    }

    fn process_telecommand(
        &self,
        class: TelecommandClass,
        packet: &Packet,
        raw: &[u8],
    ) -> ProcessorOutput {
        if let Some(packet_id) = packet.packet_id() {
            match RotatorCommand::decode(packet_id, packet.command_data()) {
                Ok(Some(command)) => {
                    info!("Rotator command from {}: {:?}", class, command);
                    return ProcessorOutput {
                        packets: Vec::new(),
                        rotator_command: Some(command),
                    };
                }
                Ok(None) => {}
                Err(e) => warn!("Malformed rotator command, forwarding as is: {}", e),
            }
        }

        let destination = self.routes.destination(class);
        debug!(
            "Forwarding {} telecommand {:?} to {}",
            class,
            packet.packet_id(),
            destination
        );
        ProcessorOutput {
            packets: vec![TaggedPacket::gated(raw.to_vec(), destination)],
            rotator_command: None,
        }
    }

    fn update_vehicle(&mut self, vehicle: Vehicle, packet: &Packet, output: &mut ProcessorOutput) {
        let fields = match ESSENTIAL_SCHEMA.decode(&packet.data) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Bad {} essential telemetry: {}", vehicle, e);
                return;
            }
        };
        let timestamp = packet.timestamp.unwrap_or_else(Timestamp::now);
        let rotator = self.state.rotator_position;

        let telemetry = self.state.vehicle_mut(vehicle);
        telemetry.ingest(&fields, timestamp, &rotator);
        match telemetry.calculation_packet() {
            Ok(bytes) => output.packets.push(TaggedPacket::to_yamcs(bytes)),
            Err(e) => warn!("Failed to encode {} calculations: {}", vehicle, e),
        }
    }

    fn update_rotator_position(&mut self, packet: &Packet) {
        match ROTATOR_POSITION_SCHEMA.decode(&packet.data) {
            Ok(fields) => {
                let [lat, lon, alt] = [0, 1, 2].map(|i| fields[i].as_f64());
                self.state.rotator_position = GeoPosition::new(lat, lon, alt);
            }
            Err(e) => warn!("Bad rotator position telemetry: {}", e),
        }
    }
}

/// Processor loop: inbound queue -> processed queue
pub async fn run_processor(
    mut processor: PacketProcessor,
    mut inbound: mpsc::Receiver<InboundPacket>,
    processed: mpsc::Sender<TaggedPacket>,
    rotator: RotatorHandle,
    telemetry: watch::Sender<TelemetryState>,
    mut stop: StopSignal,
) {
    info!("Packet processor started");

    loop {
        let packet = tokio::select! {
            _ = stop.stopped() => break,
            packet = inbound.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };

        let output = match processor.process(&packet.bytes) {
            Ok(output) => output,
            Err(e) => {
                warn!("Dropping packet from {:?}: {}", packet.source, e);
                continue;
            }
        };

        if let Some(command) = output.rotator_command {
            if let Err(e) = rotator.apply(command).await {
                warn!("Rotator unavailable: {}", e);
            }
        }
        for tagged in output.packets {
            if processed.send(tagged).await.is_err() {
                warn!("Processed queue closed, stopping processor");
                return;
            }
        }

        telemetry.send_if_modified(|published| {
            if published != processor.state() {
                *published = processor.state().clone();
                true
            } else {
                false
            }
        });
    }

    info!("Packet processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransceiverConfig;
    use skylink_protocol::FieldValue;

    fn processor() -> PacketProcessor {
        PacketProcessor::new(CommandRoutes::from_config(&RelayConfig::default()))
    }

    fn essential(apid: TelemetryApid, seconds: u32, alt: f32) -> Vec<u8> {
        let fields = [
            FieldValue::Float(56.9),
            FieldValue::Float(24.0),
            FieldValue::Float(alt),
            FieldValue::Float(alt),
            FieldValue::Int(8),
            FieldValue::Int(0),
            FieldValue::Float(-90.0),
            FieldValue::Float(6.0),
        ];
        ccsds::encode_telemetry_at(apid.value(), 0, &fields, Timestamp::new(seconds, 0)).unwrap()
    }

    #[test]
    fn test_essential_emits_calculation_then_mirror() {
        let mut p = processor();
        let raw = essential(TelemetryApid::PayloadEssential, 100, 1000.0);
        p.process(&raw).unwrap();
        let raw = essential(TelemetryApid::PayloadEssential, 105, 1010.0);
        let output = p.process(&raw).unwrap();

        assert_eq!(output.packets.len(), 2);
        let calc = ccsds::decode(&output.packets[0].bytes).unwrap();
        assert_eq!(calc.apid, TelemetryApid::PayloadCalculations.value());
        assert_eq!(calc.sequence_count, 1);
        assert_eq!(&calc.data[0..4], &2.0f32.to_be_bytes());
        assert_eq!(output.packets[1], TaggedPacket::to_yamcs(raw));
        assert!(output.packets.iter().all(|p| p.destination == Destination::Yamcs));

        assert_eq!(p.state().payload.calculations.gps_vertical_speed, 2.0);
        assert_eq!(p.state().balloon.samples, 0);
    }

    #[test]
    fn test_short_essential_is_still_mirrored() {
        let mut p = processor();
        let raw = ccsds::encode_telemetry_at(
            TelemetryApid::BalloonEssential.value(),
            0,
            &[FieldValue::Float(1.0)],
            Timestamp::new(1, 0),
        )
        .unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets, vec![TaggedPacket::to_yamcs(raw)]);
        assert_eq!(p.state().balloon.samples, 0);
    }

    #[test]
    fn test_rotator_command_is_consumed() {
        let mut p = processor();
        let raw = RotatorCommand::ManualAngles { azimuth: 10.0, elevation: 20.0 }
            .encode(1)
            .unwrap();
        let output = p.process(&raw).unwrap();
        assert!(output.packets.is_empty());
        assert_eq!(
            output.rotator_command,
            Some(RotatorCommand::ManualAngles { azimuth: 10.0, elevation: 20.0 })
        );
    }

    #[test]
    fn test_vehicle_telecommands_are_routed_gated() {
        let mut p = processor();
        let raw = ccsds::encode_telecommand(10, 1, 1003, &[]).unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets, vec![TaggedPacket::gated(raw, Destination::Primary)]);

        let raw = ccsds::encode_telecommand(20, 1, 2004, &[]).unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets[0].destination, Destination::Secondary);
        assert!(output.packets[0].gated);
    }

    #[test]
    fn test_balloon_commands_use_primary_without_secondary() {
        let config = RelayConfig {
            transceiver: TransceiverConfig::Serial {
                port: "/dev/ttyUSB0".into(),
                baud_rate: 115_200,
            },
            ..Default::default()
        };
        let mut p = PacketProcessor::new(CommandRoutes::from_config(&config));
        let raw = ccsds::encode_telecommand(20, 1, 2000, &[]).unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets[0].destination, Destination::Primary);
    }

    #[test]
    fn test_malformed_rotator_command_is_forwarded() {
        let mut p = processor();
        // manual angles without arguments
        let raw = ccsds::encode_telecommand(30, 1, 3004, &[]).unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.rotator_command, None);
        assert_eq!(output.packets, vec![TaggedPacket::gated(raw, Destination::Primary)]);
    }

    #[test]
    fn test_rotator_position_updates_state() {
        let mut p = processor();
        let raw = ccsds::encode_telemetry_at(
            TelemetryApid::RotatorPosition.value(),
            0,
            &[FieldValue::Float(56.5), FieldValue::Float(24.25), FieldValue::Float(12.0)],
            Timestamp::new(1, 0),
        )
        .unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets, vec![TaggedPacket::to_yamcs(raw)]);
        assert_eq!(p.state().rotator_position, GeoPosition::new(56.5, 24.25, 12.0));
    }

    #[test]
    fn test_unknown_apid_is_mirrored() {
        let mut p = processor();
        let raw = ccsds::encode_telemetry_at(1234, 0, &[FieldValue::Int(1)], Timestamp::new(1, 0))
            .unwrap();
        let output = p.process(&raw).unwrap();
        assert_eq!(output.packets, vec![TaggedPacket::to_yamcs(raw)]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let mut p = processor();
        assert!(matches!(p.process(&[1, 2, 3]), Err(RelayError::Decode(_))));
    }
}
