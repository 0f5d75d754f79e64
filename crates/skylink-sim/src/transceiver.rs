//! Simulated radio transceiver
//!
//! Stands in for one transceiver on the UDP side of the relay: it answers
//! heartbeat polls, sends the flight's essential telemetry on a fixed
//! period and reports every telecommand it receives.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use skylink_protocol::heartbeat::Heartbeat;
use skylink_protocol::Timestamp;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::flight::SimulatedFlight;

/// Commands that can be sent to a running simulated transceiver
#[derive(Debug, Clone)]
pub enum SimCommand {
    /// Send one telemetry packet now
    SendTelemetry,
    /// Stop answering heartbeats, as if out of range
    SetOnline(bool),
    SetSignalStrength(i32),
    Shutdown,
}

pub struct SimTransceiver {
    socket: UdpSocket,
    relay_addr: SocketAddr,
    flight: SimulatedFlight,
    signal_strength: i32,
    online: bool,
    telemetry_period: Option<Duration>,
}

impl SimTransceiver {
    /// Bind the transceiver's command port and aim it at the relay's
    /// telemetry port
    pub async fn bind(bind_addr: &str, relay_addr: SocketAddr, flight: SimulatedFlight) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self::new(socket, relay_addr, flight))
    }

    pub fn new(socket: UdpSocket, relay_addr: SocketAddr, flight: SimulatedFlight) -> Self {
        Self {
            socket,
            relay_addr,
            flight,
            signal_strength: -80,
            online: true,
            telemetry_period: None,
        }
    }

    /// Send telemetry automatically every `period`
    pub fn with_telemetry_period(mut self, period: Duration) -> Self {
        self.telemetry_period = Some(period);
        self
    }

    /// An offline transceiver ignores heartbeat polls and sends no telemetry
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn flight(&self) -> &SimulatedFlight {
        &self.flight
    }

    pub async fn send_heartbeat(&self) -> io::Result<()> {
        let reply = Heartbeat { signal_strength: self.signal_strength }.encode();
        self.socket.send_to(reply.as_bytes(), self.relay_addr).await?;
        Ok(())
    }

    /// Advance the flight to now and send its essential telemetry
    pub async fn send_telemetry(&mut self) -> io::Result<()> {
        if let Some(period) = self.telemetry_period {
            self.flight.advance(period.as_secs_f64());
        }
        let packet = self
            .flight
            .essential_packet(Timestamp::now())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        debug!("SIM ->relay {:02X?}", packet);
        self.socket.send_to(&packet, self.relay_addr).await?;
        Ok(())
    }

    /// Run until shut down or the command channel closes
    ///
    /// Every non-heartbeat datagram is passed to `received_tx`.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<SimCommand>,
        received_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> io::Result<()> {
        let mut buf = vec![0u8; 2048];
        let mut telemetry = interval(self.telemetry_period.unwrap_or(Duration::from_secs(3600)));
        telemetry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        telemetry.tick().await;

        info!(
            "Simulated {} transceiver on {} -> {}",
            self.flight.vehicle(),
            self.socket.local_addr()?,
            self.relay_addr
        );

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (n, from) = result?;
                    let data = &buf[..n];
                    if Heartbeat::is_heartbeat(data) {
                        if self.online {
                            self.send_heartbeat().await?;
                        }
                        continue;
                    }
                    debug!("SIM <-{} {:02X?}", from, data);
                    let _ = received_tx.send(data.to_vec());
                }
                _ = telemetry.tick(), if self.telemetry_period.is_some() && self.online => {
                    if let Err(e) = self.send_telemetry().await {
                        warn!("Simulated telemetry failed: {}", e);
                    }
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(SimCommand::SendTelemetry) => self.send_telemetry().await?,
                    Some(SimCommand::SetOnline(online)) => self.online = online,
                    Some(SimCommand::SetSignalStrength(rssi)) => self.signal_strength = rssi,
                    Some(SimCommand::Shutdown) | None => break,
                },
            }
        }

        info!("Simulated transceiver stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::FlightConfig;

    #[tokio::test]
    async fn test_answers_heartbeat_and_reports_commands() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sim = SimTransceiver::bind(
            "127.0.0.1:0",
            relay.local_addr().unwrap(),
            SimulatedFlight::new(FlightConfig::default()),
        )
        .await
        .unwrap();
        let sim_addr = sim.local_addr().unwrap();

        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (received_tx, mut received_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(sim.run(cmd_rx, received_tx));

        relay.send_to(b"UDP Heartbeat Primary~", sim_addr).await.unwrap();
        let mut buf = [0u8; 64];
        let (n, _) = relay.recv_from(&mut buf).await.unwrap();
        assert_eq!(Heartbeat::parse(&buf[..n]), Some(Heartbeat { signal_strength: -80 }));

        relay.send_to(&[0x18, 0x0A, 0xC0, 0x00, 0x00, 0x01, 0x03, 0xEB], sim_addr).await.unwrap();
        let command = received_rx.recv().await.unwrap();
        assert_eq!(command.len(), 8);

        cmd_tx.send(SimCommand::SendTelemetry).await.unwrap();
        let (n, _) = relay.recv_from(&mut [0u8; 256]).await.unwrap();
        assert_eq!(n, 6 + 6 + 32);

        cmd_tx.send(SimCommand::Shutdown).await.unwrap();
        task.await.unwrap().unwrap();
    }
}
