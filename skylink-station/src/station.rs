//! Station startup and shutdown

use std::time::Duration;

use anyhow::{Context, Result};
use skylink_relay::{
    available_serial_ports, start_relay, Link, Relay, SerialLink, TransceiverConfig, UdpLink,
};
use tracing::{error, info};

use crate::settings::Settings;
use crate::status::run_status;

/// Open every link, run the relay until Ctrl-C, then shut down
pub async fn run(settings: Settings) -> Result<()> {
    let config = &settings.relay;
    config.validate().context("invalid relay configuration")?;

    let yamcs = UdpLink::bind(
        "yamcs",
        &config.control_center.telecommand_bind,
        &config.control_center.telemetry_addr,
    )
    .await
    .context("failed to open the control center link")?;

    match &config.transceiver {
        TransceiverConfig::Udp { primary, secondary } => {
            let primary_link = UdpLink::bind("Primary", &primary.telemetry_bind, &primary.telecommand_addr)
                .await
                .context("failed to open the primary transceiver link")?;
            let secondary_link = match secondary {
                Some(s) => Some(
                    UdpLink::bind("Secondary", &s.telemetry_bind, &s.telecommand_addr)
                        .await
                        .context("failed to open the secondary transceiver link")?,
                ),
                None => None,
            };
            let relay = start_relay(config, yamcs, primary_link, secondary_link)?;
            supervise(relay, &settings).await
        }
        TransceiverConfig::Serial { port, baud_rate } => {
            let link = match SerialLink::open(port, *baud_rate) {
                Ok(link) => link,
                Err(e) => {
                    error!("Failed to open serial port {}: {}", port, e);
                    let ports = available_serial_ports();
                    if ports.is_empty() {
                        error!("No serial ports found");
                    } else {
                        error!("Available serial ports: {}", ports.join(", "));
                    }
                    return Err(e).context(format!("cannot open {port}"));
                }
            };
            let relay = start_relay(config, yamcs, link, None)?;
            supervise(relay, &settings).await
        }
    }
}

async fn supervise<T: Link>(relay: Relay<T, UdpLink>, settings: &Settings) -> Result<()> {
    let status = match settings.status.interval_secs {
        0 => None,
        secs => Some(tokio::spawn(run_status(
            relay.manager.clone(),
            relay.telemetry.clone(),
            relay.rotator.clone(),
            Duration::from_secs(secs),
            relay.stop_signal(),
        ))),
    };

    info!("Station running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    let report = relay.shutdown().await;
    if let Some(status) = status {
        let _ = status.await;
    }
    if !report.stragglers.is_empty() {
        info!("Tasks still running at exit: {}", report.stragglers.join(", "));
    }
    Ok(())
}
