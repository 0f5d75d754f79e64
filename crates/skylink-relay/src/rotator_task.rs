//! Rotator task
//!
//! # Architecture
//!
//! The task is the only writer of [`RotatorState`]. Other tasks talk to it
//! through a [`RotatorHandle`]:
//!
//! - the processor forwards decoded rotator telecommands
//! - the router feeds the latest rotator and vehicle positions
//! - the router takes pending angle commands for transmission
//!
//! After every change the task publishes a snapshot on a `watch` channel.
//! A 100 ms control tick recomputes the angles when an input changed.

use std::time::Duration;

use serde::Serialize;
use skylink_protocol::{GeoPosition, RotatorCommand, Vehicle};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::error::RelayError;
use crate::rotator::{AngleCommand, RotatorState};
use crate::scheduler::StopSignal;

/// Rotator control loop period
pub const CONTROL_PERIOD: Duration = Duration::from_millis(100);

/// Latest positions relevant to tracking
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrackingFeed {
    pub rotator_position: GeoPosition,
    pub payload: GeoPosition,
    pub balloon: GeoPosition,
}

impl TrackingFeed {
    pub fn vehicle(&self, vehicle: Vehicle) -> GeoPosition {
        match vehicle {
            Vehicle::Payload => self.payload,
            Vehicle::Balloon => self.balloon,
        }
    }
}

/// Requests handled by the rotator task
#[derive(Debug)]
pub enum RotatorRequest {
    /// Telecommand from mission control
    Command(RotatorCommand),
    /// Latest positions for automatic modes
    Track(TrackingFeed),
    /// Take the pending angle command, if it changed since the last one
    TakePendingCommand {
        response: oneshot::Sender<Option<AngleCommand>>,
    },
}

/// Cloneable access to the rotator task
#[derive(Debug, Clone)]
pub struct RotatorHandle {
    tx: mpsc::Sender<RotatorRequest>,
    state: watch::Receiver<RotatorState>,
}

/// The task half created by [`RotatorHandle::channel`]
pub struct RotatorTask {
    rx: mpsc::Receiver<RotatorRequest>,
    state_tx: watch::Sender<RotatorState>,
}

impl RotatorHandle {
    pub fn channel(capacity: usize) -> (RotatorHandle, RotatorTask) {
        let (tx, rx) = mpsc::channel(capacity);
        let (state_tx, state) = watch::channel(RotatorState::new());
        (RotatorHandle { tx, state }, RotatorTask { rx, state_tx })
    }

    async fn request(&self, request: RotatorRequest) -> Result<(), RelayError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| RelayError::QueueClosed("rotator"))
    }

    pub async fn apply(&self, command: RotatorCommand) -> Result<(), RelayError> {
        self.request(RotatorRequest::Command(command)).await
    }

    pub async fn track(&self, feed: TrackingFeed) -> Result<(), RelayError> {
        self.request(RotatorRequest::Track(feed)).await
    }

    pub async fn take_pending_command(&self) -> Result<Option<AngleCommand>, RelayError> {
        let (response, rx) = oneshot::channel();
        self.request(RotatorRequest::TakePendingCommand { response })
            .await?;
        rx.await.map_err(|_| RelayError::QueueClosed("rotator"))
    }

    /// Latest published state
    pub fn snapshot(&self) -> RotatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotatorState> {
        self.state.clone()
    }
}

impl RotatorTask {
    /// Run until stopped or every handle is dropped
    pub async fn run(mut self, mut stop: StopSignal) {
        let mut state = RotatorState::new();
        let mut tick = interval(CONTROL_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Rotator task started");

        loop {
            tokio::select! {
                _ = stop.stopped() => break,
                request = self.rx.recv() => {
                    let Some(request) = request else { break };
                    handle_request(&mut state, request);
                }
                _ = tick.tick() => state.control(),
            }
            self.state_tx.send_if_modified(|published| {
                if *published != state {
                    *published = state.clone();
                    true
                } else {
                    false
                }
            });
        }

        info!("Rotator task stopped");
    }
}

fn handle_request(state: &mut RotatorState, request: RotatorRequest) {
    match request {
        RotatorRequest::Command(command) => state.apply(command),
        RotatorRequest::Track(feed) => {
            state.set_auto_rotator_position(feed.rotator_position);
            state.set_auto_target_position(feed.vehicle(state.target));
        }
        RotatorRequest::TakePendingCommand { response } => {
            let _ = response.send(state.take_pending_command());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::Mode;
    use crate::scheduler::TaskScheduler;

    fn feed() -> TrackingFeed {
        TrackingFeed {
            rotator_position: GeoPosition::new(56.95, 24.1, 10.0),
            payload: GeoPosition::new(57.1, 24.4, 12_000.0),
            balloon: GeoPosition::new(56.5, 23.9, 25_000.0),
        }
    }

    #[tokio::test]
    async fn test_track_then_take_command() {
        let mut scheduler = TaskScheduler::new();
        let (handle, task) = RotatorHandle::channel(16);
        scheduler.spawn("rotator", |stop| task.run(stop));

        handle.track(feed()).await.unwrap();
        // let one control tick pass
        tokio::time::sleep(CONTROL_PERIOD * 3).await;

        let command = handle.take_pending_command().await.unwrap().unwrap();
        assert_eq!(command.sequence, 1);
        assert!(handle.take_pending_command().await.unwrap().is_none());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.command_sequence, 2);
        assert_eq!(snapshot.target_position, feed().payload);

        assert!(scheduler.shutdown(Duration::from_secs(1)).await.is_clean());
    }

    #[tokio::test]
    async fn test_target_switch_follows_other_vehicle() {
        let mut scheduler = TaskScheduler::new();
        let (handle, task) = RotatorHandle::channel(16);
        scheduler.spawn("rotator", |stop| task.run(stop));

        handle
            .apply(RotatorCommand::SetTarget { target: Some(Vehicle::Balloon) })
            .await
            .unwrap();
        handle.track(feed()).await.unwrap();
        tokio::time::sleep(CONTROL_PERIOD * 3).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.target, Vehicle::Balloon);
        assert_eq!(snapshot.target_position, feed().balloon);
        assert!(snapshot.command.is_some());

        scheduler.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_manual_angles_published() {
        let mut scheduler = TaskScheduler::new();
        let (handle, task) = RotatorHandle::channel(16);
        let mut updates = handle.subscribe();
        scheduler.spawn("rotator", |stop| task.run(stop));

        handle
            .apply(RotatorCommand::ManualAngles { azimuth: 200.0, elevation: 15.0 })
            .await
            .unwrap();
        updates.changed().await.unwrap();
        let state = updates.borrow().clone();
        assert_eq!(state.control_mode, Mode::Manual);
        assert_eq!(state.angles.azimuth, 200.0);

        scheduler.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_handle_errors_after_stop() {
        let mut scheduler = TaskScheduler::new();
        let (handle, task) = RotatorHandle::channel(1);
        scheduler.spawn("rotator", |stop| task.run(stop));
        scheduler.shutdown(Duration::from_secs(1)).await;

        assert!(matches!(
            handle.take_pending_command().await,
            Err(RelayError::QueueClosed(_))
        ));
    }
}
