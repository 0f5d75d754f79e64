//! Router loops
//!
//! Four independent duties, each its own task:
//!
//! - **dispatch**: processed queue -> the connection manager's per-destination
//!   outbound queues
//! - **tracks**: append new vehicle and rotator fixes to [`PositionTracks`]
//! - **rotator feed**: hand the latest positions to the rotator task
//! - **rotator commands**: encode changed angle commands for the rotator
//!   hardware

use std::sync::Arc;
use std::time::Duration;

use skylink_protocol::command::encode_rotator_angles;
use skylink_protocol::Vehicle;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::link::Link;
use crate::packet::{Destination, TaggedPacket};
use crate::rotator::AngleCommand;
use crate::rotator_task::{RotatorHandle, TrackingFeed, CONTROL_PERIOD};
use crate::scheduler::StopSignal;
use crate::telemetry::TelemetryState;
use crate::tracks::PositionTracks;

/// How often position tracks are refreshed
pub const TRACKS_PERIOD: Duration = Duration::from_secs(1);

/// Move processed packets onto their outbound queues
pub async fn run_dispatch<T: Link, C: Link>(
    manager: Arc<ConnectionManager<T, C>>,
    mut processed: mpsc::Receiver<TaggedPacket>,
    mut stop: StopSignal,
) {
    loop {
        let packet = tokio::select! {
            _ = stop.stopped() => break,
            packet = processed.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };
        let destination = packet.destination;
        if let Err(e) = manager.enqueue(packet) {
            warn!("Dropping packet for {}: {}", destination, e);
        }
    }
    debug!("Dispatch loop stopped");
}

/// Positions the tracks and the rotator feed are built from
fn tracking_feed(telemetry: &TelemetryState) -> TrackingFeed {
    TrackingFeed {
        rotator_position: telemetry.rotator_position,
        payload: telemetry.payload.position(),
        balloon: telemetry.balloon.position(),
    }
}

/// Keep the map tracks up to date
pub async fn run_tracks(
    telemetry: watch::Receiver<TelemetryState>,
    rotator: RotatorHandle,
    tracks: watch::Sender<PositionTracks>,
    mut stop: StopSignal,
) {
    let mut tick = interval(TRACKS_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = tick.tick() => {}
        }

        let feed = tracking_feed(&telemetry.borrow());
        let rotator_position = rotator.snapshot().position;
        tracks.send_if_modified(|tracks| {
            let mut changed = false;
            for vehicle in Vehicle::ALL {
                changed |= tracks.record_vehicle(vehicle, &feed.vehicle(vehicle));
            }
            changed |= tracks.record_rotator(&rotator_position);
            changed
        });
    }
    debug!("Tracks loop stopped");
}

/// Feed the rotator task the latest telemetry positions every control tick
pub async fn run_rotator_feed(
    telemetry: watch::Receiver<TelemetryState>,
    rotator: RotatorHandle,
    mut stop: StopSignal,
) {
    let mut tick = interval(CONTROL_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = tick.tick() => {}
        }
        let feed = tracking_feed(&telemetry.borrow());
        if let Err(e) = rotator.track(feed).await {
            warn!("Rotator feed stopped: {}", e);
            break;
        }
    }
    debug!("Rotator feed loop stopped");
}

/// Wire packet for an angle command
pub fn angle_packet(command: &AngleCommand, destination: Destination) -> Option<TaggedPacket> {
    match encode_rotator_angles(
        command.sequence,
        command.angles.azimuth,
        command.angles.elevation,
    ) {
        Ok(bytes) => Some(TaggedPacket::ungated(bytes, destination)),
        Err(e) => {
            warn!("Failed to encode rotator command {}: {}", command.sequence, e);
            None
        }
    }
}

/// Send changed rotator commands to the rotator's transceiver
pub async fn run_rotator_commands<T: Link, C: Link>(
    manager: Arc<ConnectionManager<T, C>>,
    rotator: RotatorHandle,
    destination: Destination,
    mut stop: StopSignal,
) {
    let mut tick = interval(CONTROL_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = tick.tick() => {}
        }

        let command = match rotator.take_pending_command().await {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("Rotator command loop stopped: {}", e);
                break;
            }
        };
        info!(
            "Rotator command {}: az {:.2} el {:.2}",
            command.sequence, command.angles.azimuth, command.angles.elevation
        );
        if let Some(packet) = angle_packet(&command, destination) {
            if let Err(e) = manager.enqueue(packet) {
                warn!("Dropping rotator command: {}", e);
            }
        }
    }
    debug!("Rotator command loop stopped");
}
