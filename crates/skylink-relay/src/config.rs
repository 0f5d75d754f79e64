//! Relay configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::packet::Destination;

/// Mission-control endpoint addresses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlCenterConfig {
    /// Where telemetry is sent
    pub telemetry_addr: String,
    /// Local address telecommands are received on
    pub telecommand_bind: String,
}

impl Default for ControlCenterConfig {
    fn default() -> Self {
        Self {
            telemetry_addr: "127.0.0.1:10015".to_string(),
            telecommand_bind: "127.0.0.1:10025".to_string(),
        }
    }
}

/// One UDP transceiver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UdpTransceiverConfig {
    /// Local address telemetry and heartbeats are received on
    pub telemetry_bind: String,
    /// Where telecommands and heartbeat polls are sent
    pub telecommand_addr: String,
}

impl UdpTransceiverConfig {
    pub fn primary() -> Self {
        Self {
            telemetry_bind: "0.0.0.0:10035".to_string(),
            telecommand_addr: "192.168.8.254:10045".to_string(),
        }
    }

    pub fn secondary() -> Self {
        Self {
            telemetry_bind: "0.0.0.0:10055".to_string(),
            telecommand_addr: "192.168.8.253:10065".to_string(),
        }
    }
}

/// How the relay reaches the vehicles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransceiverConfig {
    /// One or two networked radio transceivers
    Udp {
        primary: UdpTransceiverConfig,
        #[serde(default)]
        secondary: Option<UdpTransceiverConfig>,
    },
    /// Field-recovery base station on a serial port, used as the primary link
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        TransceiverConfig::Udp {
            primary: UdpTransceiverConfig::primary(),
            secondary: Some(UdpTransceiverConfig::secondary()),
        }
    }
}

impl TransceiverConfig {
    pub fn has_secondary(&self) -> bool {
        matches!(self, TransceiverConfig::Udp { secondary: Some(_), .. })
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub control_center: ControlCenterConfig,
    #[serde(default)]
    pub transceiver: TransceiverConfig,
    /// Transmission cycle of the flight computers in seconds
    #[serde(default = "default_cycle_time")]
    pub cycle_time_secs: u64,
    /// Transceiver silence after which the link is considered down
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Transceiver that forwards angle commands to the rotator hardware
    #[serde(default = "default_rotator_destination")]
    pub rotator_destination: Destination,
    /// How long shutdown waits for tasks to stop
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
    /// Capacity of the inbound and processed queues
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_cycle_time() -> u64 {
    15
}

fn default_receive_timeout() -> u64 {
    3000
}

fn default_heartbeat_interval() -> u64 {
    1000
}

fn default_rotator_destination() -> Destination {
    Destination::Primary
}

fn default_shutdown_grace() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            control_center: ControlCenterConfig::default(),
            transceiver: TransceiverConfig::default(),
            cycle_time_secs: default_cycle_time(),
            receive_timeout_ms: default_receive_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            rotator_destination: default_rotator_destination(),
            shutdown_grace_ms: default_shutdown_grace(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl RelayConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.cycle_time_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "cycle_time_secs must be at least 1".into(),
            ));
        }
        if self.receive_timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "receive_timeout_ms must be non-zero".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "heartbeat_interval_ms must be non-zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "queue_capacity must be non-zero".into(),
            ));
        }
        match self.rotator_destination {
            Destination::Yamcs => Err(RelayError::InvalidConfig(
                "rotator_destination must be a transceiver".into(),
            )),
            Destination::Secondary if !self.transceiver.has_secondary() => {
                Err(RelayError::InvalidConfig(
                    "rotator_destination is secondary but no secondary transceiver is configured"
                        .into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_time_secs, 15);
        assert_eq!(config.receive_timeout(), Duration::from_secs(3));
        assert!(config.transceiver.has_secondary());
    }

    #[test]
    fn test_validate_rejects_zero_cycle() {
        let config = RelayConfig {
            cycle_time_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = RelayConfig {
            receive_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rotator_destination() {
        let config = RelayConfig {
            rotator_destination: Destination::Yamcs,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            transceiver: TransceiverConfig::Serial {
                port: "/dev/ttyUSB0".into(),
                baud_rate: 115_200,
            },
            rotator_destination: Destination::Secondary,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "transceiver": { "type": "serial", "port": "COM3" }, "cycle_time_secs": 10 }"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cycle_time_secs, 10);
        assert_eq!(
            config.transceiver,
            TransceiverConfig::Serial {
                port: "COM3".into(),
                baud_rate: 115_200
            }
        );
        assert_eq!(config.control_center, ControlCenterConfig::default());
        assert_eq!(config.rotator_destination, Destination::Primary);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = RelayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
