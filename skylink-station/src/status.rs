//! Periodic status summary

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use skylink_protocol::{GeoPosition, Vehicle};
use skylink_relay::{
    CalculationRecord, ConnectionManager, Destination, Link, LinkHealth, RotatorHandle,
    RotatorState, StopSignal, TelemetryState,
};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// One snapshot of the station
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub links: Vec<(Destination, LinkHealth)>,
    pub until_next_cycle: Duration,
    pub vehicles: Vec<(Vehicle, GeoPosition, CalculationRecord)>,
    pub rotator: RotatorState,
}

impl StatusReport {
    pub fn collect<T: Link, C: Link>(
        manager: &ConnectionManager<T, C>,
        telemetry: &TelemetryState,
        rotator: RotatorState,
    ) -> Self {
        let links = manager
            .transceivers()
            .into_iter()
            .filter_map(|d| manager.link_health(d).map(|h| (d, h)))
            .collect();
        let vehicles = Vehicle::ALL
            .into_iter()
            .map(|v| {
                let t = telemetry.vehicle(v);
                (v, t.position(), t.calculations)
            })
            .collect();
        Self {
            links,
            until_next_cycle: manager.until_next_cycle(),
            vehicles,
            rotator,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "next cycle in {}s |", self.until_next_cycle.as_secs())?;
        for (destination, health) in &self.links {
            if health.connected {
                write!(f, " {destination}: up ({} dBm)", health.signal_strength)?;
            } else {
                write!(f, " {destination}: down")?;
            }
        }
        for (vehicle, position, calc) in &self.vehicles {
            write!(
                f,
                "\n  {vehicle}: {position} | v {:.2} m/s, h {:.2} m/s, ground {:.2} km",
                calc.gps_vertical_speed, calc.horizontal_speed, calc.ground_distance_to_rotator
            )?;
        }
        let r = &self.rotator;
        write!(
            f,
            "\n  rotator: control {}, position {}, target {} | az {:.2} el {:.2}",
            r.control_mode, r.position_mode, r.target, r.angles.azimuth, r.angles.elevation
        )
    }
}

/// Log a status report every `period` until stopped
pub async fn run_status<T: Link, C: Link>(
    manager: Arc<ConnectionManager<T, C>>,
    telemetry: watch::Receiver<TelemetryState>,
    rotator: RotatorHandle,
    period: Duration,
    mut stop: StopSignal,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // skip the immediate first tick
    tick.tick().await;

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = tick.tick() => {}
        }
        let report = {
            let telemetry = telemetry.borrow();
            StatusReport::collect(&*manager, &telemetry, rotator.snapshot())
        };
        info!("Status: {}", report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_relay::Mode;

    #[test]
    fn test_report_text() {
        let report = StatusReport {
            links: vec![
                (
                    Destination::Primary,
                    LinkHealth {
                        connected: true,
                        signal_strength: -71,
                        last_heartbeat: None,
                    },
                ),
                (Destination::Secondary, LinkHealth::default()),
            ],
            until_next_cycle: Duration::from_millis(4_400),
            vehicles: vec![(
                Vehicle::Balloon,
                GeoPosition::new(57.0, 24.0, 1_500.0),
                CalculationRecord {
                    gps_vertical_speed: 5.12,
                    ..Default::default()
                },
            )],
            rotator: RotatorState::new(),
        };

        let text = report.to_string();
        assert!(text.starts_with("next cycle in 4s | primary: up (-71 dBm) secondary: down"));
        assert!(text.contains("v 5.12 m/s"));
        assert!(text.contains(&format!("control {}", Mode::Auto)));
    }
}
