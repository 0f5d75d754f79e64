//! Skylink Ground Station
//!
//! Relays telemetry and telecommands between mission control and the
//! balloon flight's transceivers, derives flight metrics and steers the
//! antenna rotator.

mod settings;
mod station;
mod status;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use skylink_protocol::{ccsds, field::parse_fields, Vehicle};
use skylink_sim::{FlightConfig, SimCommand, SimTransceiver, SimulatedFlight};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "skylink", version, about = "Balloon ground-station relay")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay (default)
    Run,
    /// Build a packet and print it as hex
    Encode {
        /// Application id
        apid: u16,
        /// Comma-separated field values; integers without a decimal point
        #[arg(default_value = "")]
        fields: String,
        /// Telecommand packet id; builds a telemetry packet when absent
        #[arg(long)]
        packet_id: Option<u16>,
        #[arg(long, default_value_t = 0)]
        sequence: u16,
    },
    /// Run a simulated transceiver against a running relay
    Simulate {
        #[arg(long, value_enum, default_value_t = VehicleArg::Payload)]
        vehicle: VehicleArg,
        /// Relay telemetry address of the simulated transceiver
        #[arg(long, default_value = "127.0.0.1:10035")]
        relay: SocketAddr,
        /// Local address telecommands and heartbeat polls arrive on
        #[arg(long, default_value = "127.0.0.1:10045")]
        bind: String,
        /// Seconds between telemetry packets
        #[arg(long, default_value_t = 5)]
        period_secs: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VehicleArg {
    Payload,
    Balloon,
}

impl From<VehicleArg> for Vehicle {
    fn from(arg: VehicleArg) -> Self {
        match arg {
            VehicleArg::Payload => Vehicle::Payload,
            VehicleArg::Balloon => Vehicle::Balloon,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "skylink=info,skylink_protocol=info,skylink_relay=info,skylink_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let path = match cli.config {
                Some(path) => path,
                None => Settings::default_path().context("no config directory on this system")?,
            };
            let settings = Settings::load_or_create(&path)?;
            tracing::info!("Starting Skylink ground station ({})", path.display());
            if let Err(e) = station::run(settings).await {
                tracing::error!("{:#}", e);
                return Err(e);
            }
            Ok(())
        }
        Command::Encode {
            apid,
            fields,
            packet_id,
            sequence,
        } => {
            let fields = parse_fields(&fields)?;
            let bytes = match packet_id {
                Some(id) => ccsds::encode_telecommand(apid, sequence, id, &fields)?,
                None => ccsds::encode_telemetry(apid, sequence, &fields)?,
            };
            println!("{}", hex(&bytes));
            Ok(())
        }
        Command::Simulate {
            vehicle,
            relay,
            bind,
            period_secs,
        } => simulate(vehicle.into(), relay, &bind, period_secs).await,
    }
}

async fn simulate(vehicle: Vehicle, relay: SocketAddr, bind: &str, period_secs: u64) -> Result<()> {
    if period_secs == 0 {
        bail!("telemetry period must be at least one second");
    }
    let flight = SimulatedFlight::new(FlightConfig {
        vehicle,
        ..Default::default()
    });
    let sim = SimTransceiver::bind(bind, relay, flight)
        .await
        .with_context(|| format!("failed to bind {bind}"))?
        .with_telemetry_period(Duration::from_secs(period_secs));

    let (cmd_tx, cmd_rx) = mpsc::channel(4);
    let (received_tx, mut received_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(sim.run(cmd_rx, received_tx));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = received_rx.recv() => match received {
                Some(bytes) => match ccsds::decode(&bytes) {
                    Ok(packet) => tracing::info!(
                        "Telecommand apid {} id {:?}: {}",
                        packet.apid,
                        packet.packet_id(),
                        hex(&bytes)
                    ),
                    Err(e) => tracing::warn!("Undecodable datagram ({}): {}", e, hex(&bytes)),
                },
                None => break,
            },
        }
    }

    let _ = cmd_tx.send(SimCommand::Shutdown).await;
    task.await.context("simulator task panicked")??;
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cli_parses_encode() {
        let cli = Cli::parse_from(["skylink", "encode", "10", "1,2.5", "--packet-id", "1003"]);
        match cli.command {
            Some(Command::Encode { apid, fields, packet_id, sequence }) => {
                assert_eq!(apid, 10);
                assert_eq!(fields, "1,2.5");
                assert_eq!(packet_id, Some(1003));
                assert_eq!(sequence, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::parse_from(["skylink", "--config", "/tmp/s.json"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x18, 0x0A, 0xFF]), "18 0A FF");
        assert_eq!(hex(&[]), "");
    }

    proptest! {
        #[test]
        fn hex_has_three_chars_per_byte(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
            prop_assert_eq!(hex(&bytes).len(), bytes.len() * 3 - 1);
        }
    }
}
