//! Task wiring
//!
//! [`start_relay`] builds the queues, the connection manager and the
//! rotator task, then spawns one task per loop:
//!
//! | Task                    | Step                                        |
//! |-------------------------|---------------------------------------------|
//! | `receive-<dest>`        | transceiver -> inbound queue                |
//! | `send-<dest>`           | outbound queue -> transceiver               |
//! | `receive-yamcs`         | control center -> inbound queue             |
//! | `send-yamcs`            | outbound queue -> control center            |
//! | `heartbeat`             | heartbeat requests to every UDP transceiver |
//! | `processor`             | inbound queue -> processed queue            |
//! | `dispatch`              | processed queue -> outbound queues          |
//! | `tracks`                | telemetry -> position tracks                |
//! | `rotator`               | rotator state machine                       |
//! | `rotator-feed`          | telemetry -> rotator                        |
//! | `rotator-commands`      | rotator -> outbound queue                   |
//!
//! Every loop is a recovery point: a failed step is logged and the loop
//! carries on after a short pause. Only a closed queue ends a loop early.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::connection::{ConnectionManager, SendOutcome};
use crate::error::RelayError;
use crate::link::Link;
use crate::packet::Destination;
use crate::processor::{run_processor, CommandRoutes, PacketProcessor};
use crate::rotator_task::RotatorHandle;
use crate::router::{run_dispatch, run_rotator_commands, run_rotator_feed, run_tracks};
use crate::scheduler::{ShutdownReport, StopSignal, TaskScheduler};
use crate::telemetry::TelemetryState;
use crate::tracks::PositionTracks;

/// Pause after a failed step
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pause after a packet was requeued for a disconnected link
pub const REQUEUE_BACKOFF: Duration = Duration::from_millis(250);

/// A running relay
pub struct Relay<T, C> {
    pub manager: Arc<ConnectionManager<T, C>>,
    pub rotator: RotatorHandle,
    pub telemetry: watch::Receiver<TelemetryState>,
    pub tracks: watch::Receiver<PositionTracks>,
    scheduler: TaskScheduler,
    grace: Duration,
}

impl<T: Link, C: Link> Relay<T, C> {
    pub fn task_names(&self) -> Vec<&str> {
        self.scheduler.task_names()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.scheduler.stop_signal()
    }

    /// Stop every task, waiting up to the configured grace period
    pub async fn shutdown(self) -> ShutdownReport {
        let report = self.scheduler.shutdown(self.grace).await;
        if report.is_clean() {
            info!("Relay stopped");
        } else {
            warn!(
                "Relay stopped with {} stragglers and {} failed tasks",
                report.stragglers.len(),
                report.failed.len()
            );
        }
        report
    }
}

/// Build the pipeline on the given links and spawn every task
///
/// Must be called from within a tokio runtime.
pub fn start_relay<T: Link, C: Link>(
    config: &RelayConfig,
    control_center: C,
    primary: T,
    secondary: Option<T>,
) -> Result<Relay<T, C>, RelayError> {
    config.validate()?;
    if config.rotator_destination == Destination::Secondary && secondary.is_none() {
        return Err(RelayError::InvalidConfig(
            "rotator commands routed to a missing secondary transceiver".into(),
        ));
    }

    let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
    let (processed_tx, processed_rx) = mpsc::channel(config.queue_capacity);
    let (telemetry_tx, telemetry) = watch::channel(TelemetryState::default());
    let (tracks_tx, tracks) = watch::channel(PositionTracks::new());
    let (rotator, rotator_task) = RotatorHandle::channel(config.queue_capacity);

    let mut routes = CommandRoutes::from_config(config);
    if secondary.is_none() {
        routes.balloon = Destination::Primary;
    }

    let manager = Arc::new(ConnectionManager::new(
        config,
        control_center,
        primary,
        secondary,
        inbound_tx,
    ));

    let mut scheduler = TaskScheduler::new();

    for destination in manager.transceivers() {
        let m = manager.clone();
        scheduler.spawn(format!("receive-{destination}"), move |stop| {
            drive("receive", destination, stop, move || {
                let m = m.clone();
                async move { m.receive_from_transceiver(destination).await }
            })
        });

        let m = manager.clone();
        scheduler.spawn(format!("send-{destination}"), move |stop| {
            drive("send", destination, stop, move || {
                let m = m.clone();
                async move {
                    let outcome = m.send_to_transceiver(destination).await?;
                    if outcome == SendOutcome::Requeued {
                        sleep(REQUEUE_BACKOFF).await;
                    }
                    Ok(outcome)
                }
            })
        });
    }

    let m = manager.clone();
    scheduler.spawn("receive-yamcs", move |stop| {
        drive("receive", Destination::Yamcs, stop, move || {
            let m = m.clone();
            async move { m.receive_from_control_center().await }
        })
    });

    let m = manager.clone();
    scheduler.spawn("send-yamcs", move |stop| {
        drive("send", Destination::Yamcs, stop, move || {
            let m = m.clone();
            async move { m.send_to_control_center().await }
        })
    });

    let m = manager.clone();
    let period = config.heartbeat_interval();
    scheduler.spawn("heartbeat", move |stop| run_heartbeats(m, period, stop));

    let processor = PacketProcessor::new(routes);
    let r = rotator.clone();
    scheduler.spawn("processor", move |stop| {
        run_processor(processor, inbound_rx, processed_tx, r, telemetry_tx, stop)
    });

    let m = manager.clone();
    scheduler.spawn("dispatch", move |stop| run_dispatch(m, processed_rx, stop));

    let (t, r) = (telemetry.clone(), rotator.clone());
    scheduler.spawn("tracks", move |stop| run_tracks(t, r, tracks_tx, stop));

    scheduler.spawn("rotator", move |stop| rotator_task.run(stop));

    let (t, r) = (telemetry.clone(), rotator.clone());
    scheduler.spawn("rotator-feed", move |stop| run_rotator_feed(t, r, stop));

    let (m, r) = (manager.clone(), rotator.clone());
    let rotator_destination = config.rotator_destination;
    scheduler.spawn("rotator-commands", move |stop| {
        run_rotator_commands(m, r, rotator_destination, stop)
    });

    info!(
        "Relay started: {} tasks, {} transceiver(s), {} s cycle",
        scheduler.task_names().len(),
        manager.transceivers().len(),
        config.cycle_time_secs
    );

    Ok(Relay {
        manager,
        rotator,
        telemetry,
        tracks,
        scheduler,
        grace: config.shutdown_grace(),
    })
}

/// Repeat one connection step until stopped
async fn drive<F, Fut, O>(
    kind: &'static str,
    destination: Destination,
    mut stop: StopSignal,
    mut step: F,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<O, RelayError>> + Send,
    O: Send,
{
    while !stop.is_stopped() {
        let result = tokio::select! {
            _ = stop.stopped() => break,
            result = step() => result,
        };
        match result {
            Ok(_) => {}
            Err(RelayError::QueueClosed(queue)) => {
                warn!("{} {} loop exiting, {} queue closed", destination, kind, queue);
                break;
            }
            Err(e) => {
                warn!("{} {} failed: {}", destination, kind, e);
                tokio::select! {
                    _ = stop.stopped() => break,
                    _ = sleep(ERROR_BACKOFF) => {}
                }
            }
        }
    }
}

async fn run_heartbeats<T: Link, C: Link>(
    manager: Arc<ConnectionManager<T, C>>,
    period: Duration,
    mut stop: StopSignal,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = tick.tick() => manager.send_heartbeats().await,
        }
    }
}
