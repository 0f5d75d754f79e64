//! Skylink Relay Engine
//!
//! This crate implements the ground-station relay between mission control
//! and the balloon flight's radio transceivers.
//!
//! # Architecture
//!
//! ```text
//!  transceivers ──┐                                         ┌──> transceivers
//!                 ├─> inbound ─> processor ─> processed ─> router
//!  mission ctrl ──┘                  │                      └──> mission ctrl
//!                                    └─> rotator task ─> angle commands
//! ```
//!
//! - [`connection::ConnectionManager`] owns the links (UDP or serial) and the
//!   per-destination outbound queues, tracks link health from heartbeats and
//!   holds gated telecommands until the next transmission cycle
//! - [`processor::PacketProcessor`] classifies packets, derives speeds and
//!   distances from essential telemetry and extracts rotator commands
//! - [`router`] dispatches processed packets and drives the rotator
//! - [`rotator::RotatorState`] points the antenna at the tracked vehicle
//!
//! Every shared state has exactly one writing task and is published to
//! readers through `watch` channels.
//!
//! # Example
//!
//! ```rust,no_run
//! use skylink_relay::{start_relay, RelayConfig, UdpLink, UdpTransceiverConfig};
//!
//! # async fn run() -> Result<(), skylink_relay::RelayError> {
//! let config = RelayConfig::default();
//! let yamcs = UdpLink::bind(
//!     "yamcs",
//!     &config.control_center.telecommand_bind,
//!     &config.control_center.telemetry_addr,
//! )
//! .await?;
//! let radio = UdpTransceiverConfig::primary();
//! let primary = UdpLink::bind("Primary", &radio.telemetry_bind, &radio.telecommand_addr).await?;
//!
//! let relay = start_relay(&config, yamcs, primary, None)?;
//! tokio::signal::ctrl_c().await?;
//! relay.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod calculations;
pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod link;
pub mod packet;
pub mod pipeline;
pub mod processor;
pub mod rotator;
pub mod rotator_task;
pub mod router;
pub mod scheduler;
pub mod telemetry;
pub mod tracks;

pub use config::{ControlCenterConfig, RelayConfig, TransceiverConfig, UdpTransceiverConfig};
pub use connection::{ConnectionManager, ReceiveOutcome, SendOutcome};
pub use error::RelayError;
pub use geometry::PointingAngles;
pub use link::{available_serial_ports, Link, LinkHealth, SerialLink, UdpLink};
pub use packet::{Destination, InboundPacket, Source, TaggedPacket};
pub use pipeline::{start_relay, Relay};
pub use processor::{CommandRoutes, PacketProcessor};
pub use rotator::{AngleCommand, Mode, RotatorState};
pub use rotator_task::{RotatorHandle, TrackingFeed};
pub use scheduler::{ShutdownReport, StopSignal, TaskScheduler};
pub use telemetry::{CalculationRecord, TelemetryState, VehicleTelemetry};
pub use tracks::PositionTracks;
