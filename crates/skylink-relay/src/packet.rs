//! Destination-tagged packets flowing through the pipeline queues

use serde::{Deserialize, Serialize};

/// Where a processed packet is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Mission-control telemetry endpoint
    Yamcs,
    /// Primary radio transceiver
    Primary,
    /// Secondary radio transceiver
    Secondary,
}

impl Destination {
    pub fn name(self) -> &'static str {
        match self {
            Destination::Yamcs => "yamcs",
            Destination::Primary => "primary",
            Destination::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wire bytes plus delivery instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPacket {
    pub bytes: Vec<u8>,
    /// Hold until the next transmission cycle boundary
    pub gated: bool,
    pub destination: Destination,
}

impl TaggedPacket {
    pub fn to_yamcs(bytes: Vec<u8>) -> Self {
        Self { bytes, gated: false, destination: Destination::Yamcs }
    }

    pub fn gated(bytes: Vec<u8>, destination: Destination) -> Self {
        Self { bytes, gated: true, destination }
    }

    pub fn ungated(bytes: Vec<u8>, destination: Destination) -> Self {
        Self { bytes, gated: false, destination }
    }
}

/// Which receive loop produced an inbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    ControlCenter,
    Transceiver(Destination),
}

/// Raw bytes waiting for the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub bytes: Vec<u8>,
    pub source: Source,
}
