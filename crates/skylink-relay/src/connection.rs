//! Connection manager
//!
//! # Architecture
//!
//! The manager exclusively owns the transport handles and one outbound queue
//! per destination. Each of its async methods performs one step of a loop
//! and is driven by a task spawned in [`crate::pipeline`]:
//!
//! ```text
//! receive_from_transceiver ─┐                          ┌─> send_to_transceiver
//! receive_from_control_center ─> inbound queue   queue ─┤
//!                                                       └─> send_to_control_center
//! ```
//!
//! Transceiver liveness is published through a `watch` channel per link.
//! Heartbeat-driven links start disconnected and come up on the first
//! heartbeat reply; a receive timeout takes them down again. A packet for a
//! disconnected transceiver goes back into its queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use skylink_protocol::heartbeat::{heartbeat_request, Heartbeat};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::link::{Link, LinkHealth, UdpLink, MAX_DATAGRAM};
use crate::packet::{Destination, InboundPacket, Source, TaggedPacket};

/// How long a send loop waits for a queued packet
pub const QUEUE_WAIT: Duration = Duration::from_secs(1);

/// Extra delay after a cycle boundary before gated packets go out
pub const GATE_OFFSET: Duration = Duration::from_secs(1);

/// Result of one send step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was queued
    Idle,
    Sent,
    /// Link is down; the packet went back into the queue
    Requeued,
}

/// Result of one receive step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Timeout,
    Heartbeat,
    Data,
}

/// FIFO queue that can be popped with a bounded wait and refilled
#[derive(Debug)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<TaggedPacket>,
    rx: Mutex<mpsc::UnboundedReceiver<TaggedPacket>>,
    len: AtomicUsize,
}

impl OutboundQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            len: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, packet: TaggedPacket) {
        // the queue owns its receiver, so the send cannot fail
        if self.tx.send(packet).is_ok() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wait up to `wait` for the next packet
    pub async fn pop(&self, wait: Duration) -> Option<TaggedPacket> {
        let mut rx = self.rx.lock().await;
        let packet = timeout(wait, rx.recv()).await.ok().flatten()?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(packet)
    }

    /// Number of packets waiting
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// One transceiver link with its health and outbound queue
struct TransceiverPort<T> {
    link: Arc<T>,
    health: watch::Sender<LinkHealth>,
    queue: OutboundQueue,
}

impl<T: Link> TransceiverPort<T> {
    fn new(link: T) -> Self {
        let initial = if link.heartbeat_driven() {
            LinkHealth::default()
        } else {
            LinkHealth::always_on()
        };
        let (health, _) = watch::channel(initial);
        Self {
            link: Arc::new(link),
            health,
            queue: OutboundQueue::new(),
        }
    }

    fn set_disconnected(&self, destination: Destination) {
        self.health.send_if_modified(|h| {
            if h.connected {
                info!("{} transceiver disconnected", destination);
                h.connected = false;
                true
            } else {
                false
            }
        });
    }
}

/// Owner of every transport and outbound queue
pub struct ConnectionManager<T, C = UdpLink> {
    control_center: Arc<C>,
    yamcs_queue: OutboundQueue,
    primary: TransceiverPort<T>,
    secondary: Option<TransceiverPort<T>>,
    inbound: mpsc::Sender<InboundPacket>,
    cycle_time_secs: u64,
    receive_timeout: Duration,
}

impl<T: Link, C: Link> ConnectionManager<T, C> {
    pub fn new(
        config: &RelayConfig,
        control_center: C,
        primary: T,
        secondary: Option<T>,
        inbound: mpsc::Sender<InboundPacket>,
    ) -> Self {
        Self {
            control_center: Arc::new(control_center),
            yamcs_queue: OutboundQueue::new(),
            primary: TransceiverPort::new(primary),
            secondary: secondary.map(TransceiverPort::new),
            inbound,
            cycle_time_secs: config.cycle_time_secs,
            receive_timeout: config.receive_timeout(),
        }
    }

    fn port(&self, destination: Destination) -> Result<&TransceiverPort<T>, RelayError> {
        match destination {
            Destination::Primary => Ok(&self.primary),
            Destination::Secondary => self.secondary.as_ref().ok_or(RelayError::NoRoute(destination)),
            Destination::Yamcs => Err(RelayError::NoRoute(destination)),
        }
    }

    /// Transceiver destinations that have a link
    pub fn transceivers(&self) -> Vec<Destination> {
        let mut out = vec![Destination::Primary];
        if self.secondary.is_some() {
            out.push(Destination::Secondary);
        }
        out
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn cycle_time_secs(&self) -> u64 {
        self.cycle_time_secs
    }

    pub fn control_center_link(&self) -> &C {
        &self.control_center
    }

    /// Transceiver link of a destination
    pub fn transceiver_link(&self, destination: Destination) -> Option<&T> {
        self.port(destination).ok().map(|p| p.link.as_ref())
    }

    /// Watch a transceiver's health
    pub fn subscribe_health(&self, destination: Destination) -> Option<watch::Receiver<LinkHealth>> {
        self.port(destination).ok().map(|p| p.health.subscribe())
    }

    /// Current health of a transceiver
    pub fn link_health(&self, destination: Destination) -> Option<LinkHealth> {
        self.port(destination).ok().map(|p| *p.health.borrow())
    }

    /// Put a packet on its destination's outbound queue
    pub fn enqueue(&self, packet: TaggedPacket) -> Result<(), RelayError> {
        match packet.destination {
            Destination::Yamcs => {
                self.yamcs_queue.push(packet);
                Ok(())
            }
            dest => {
                self.port(dest)?.queue.push(packet);
                Ok(())
            }
        }
    }

    /// Packets waiting for a destination
    pub fn queued(&self, destination: Destination) -> usize {
        match destination {
            Destination::Yamcs => self.yamcs_queue.len(),
            dest => self.port(dest).map(|p| p.queue.len()).unwrap_or(0),
        }
    }

    /// Transmit the next queued packet to a transceiver
    ///
    /// A packet for a disconnected link is put back at the tail of the
    /// queue. Gated packets wait for the next cycle boundary.
    pub async fn send_to_transceiver(&self, destination: Destination) -> Result<SendOutcome, RelayError> {
        let port = self.port(destination)?;
        let Some(packet) = port.queue.pop(QUEUE_WAIT).await else {
            return Ok(SendOutcome::Idle);
        };

        if !port.health.borrow().connected {
            debug!(
                "{} transceiver not connected, requeueing {} bytes",
                destination,
                packet.bytes.len()
            );
            port.queue.push(packet);
            return Ok(SendOutcome::Requeued);
        }

        if packet.gated {
            let delay = gated_send_delay(since_epoch(), self.cycle_time_secs);
            debug!("Holding gated packet for {:?}", delay);
            sleep(delay).await;
        }

        info!("OUT ->{}({}) {:02X?}", port.link.name(), destination, packet.bytes);
        port.link.send(&packet.bytes).await?;
        Ok(SendOutcome::Sent)
    }

    /// Transmit the next queued packet to the control center
    pub async fn send_to_control_center(&self) -> Result<SendOutcome, RelayError> {
        let Some(packet) = self.yamcs_queue.pop(QUEUE_WAIT).await else {
            return Ok(SendOutcome::Idle);
        };
        debug!("OUT ->{} {:02X?}", self.control_center.name(), packet.bytes);
        self.control_center.send(&packet.bytes).await?;
        Ok(SendOutcome::Sent)
    }

    /// Receive one message from a transceiver
    ///
    /// Heartbeats update link health and are consumed. Anything else goes
    /// to the inbound queue.
    pub async fn receive_from_transceiver(
        &self,
        destination: Destination,
    ) -> Result<ReceiveOutcome, RelayError> {
        let port = self.port(destination)?;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        let n = match timeout(self.receive_timeout, port.link.recv(&mut buf)).await {
            Err(_) => {
                if port.link.heartbeat_driven() {
                    port.set_disconnected(destination);
                }
                return Ok(ReceiveOutcome::Timeout);
            }
            Ok(Err(e)) => {
                port.set_disconnected(destination);
                return Err(e.into());
            }
            Ok(Ok(n)) => n,
        };
        buf.truncate(n);

        if let Some(heartbeat) = Heartbeat::parse(&buf) {
            port.health.send_modify(|h| {
                if !h.connected {
                    info!(
                        "{} transceiver connected (RSSI {})",
                        destination, heartbeat.signal_strength
                    );
                }
                h.connected = true;
                h.signal_strength = heartbeat.signal_strength;
                h.last_heartbeat = Some(Instant::now());
            });
            return Ok(ReceiveOutcome::Heartbeat);
        }
        if !port.link.heartbeat_driven() && !port.health.borrow().connected {
            info!("{} transceiver reconnected", destination);
            port.health.send_modify(|h| h.connected = true);
        }

        self.inbound
            .send(InboundPacket {
                bytes: buf,
                source: Source::Transceiver(destination),
            })
            .await
            .map_err(|_| RelayError::QueueClosed("inbound"))?;
        Ok(ReceiveOutcome::Data)
    }

    /// Receive one telecommand from the control center
    pub async fn receive_from_control_center(&self) -> Result<ReceiveOutcome, RelayError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let n = match timeout(QUEUE_WAIT, self.control_center.recv(&mut buf)).await {
            Err(_) => return Ok(ReceiveOutcome::Timeout),
            Ok(result) => result?,
        };
        buf.truncate(n);

        self.inbound
            .send(InboundPacket {
                bytes: buf,
                source: Source::ControlCenter,
            })
            .await
            .map_err(|_| RelayError::QueueClosed("inbound"))?;
        Ok(ReceiveOutcome::Data)
    }

    /// Poll every heartbeat-driven transceiver once
    pub async fn send_heartbeats(&self) {
        for destination in self.transceivers() {
            let Ok(port) = self.port(destination) else {
                continue;
            };
            if !port.link.heartbeat_driven() {
                continue;
            }
            let label = match destination {
                Destination::Secondary => "Secondary",
                _ => "Primary",
            };
            if let Err(e) = port.link.send(heartbeat_request(label).as_bytes()).await {
                warn!("Failed to send heartbeat to {}: {}", destination, e);
            }
        }
    }

    /// Time until the next transmission cycle starts
    pub fn until_next_cycle(&self) -> Duration {
        until_next_cycle(since_epoch(), self.cycle_time_secs)
    }
}

/// Wall-clock time since the Unix epoch
pub fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Delay before a gated packet may be transmitted
///
/// The packet waits until epoch seconds are a multiple of `cycle_secs`,
/// then [`GATE_OFFSET`] more. If the current second already is a boundary
/// only the offset applies.
pub fn gated_send_delay(now: Duration, cycle_secs: u64) -> Duration {
    let cycle = cycle_secs.max(1);
    let secs = now.as_secs();
    if secs % cycle == 0 {
        return GATE_OFFSET;
    }
    until_next_cycle(now, cycle) + GATE_OFFSET
}

/// Time until the next cycle boundary strictly after `now`
pub fn until_next_cycle(now: Duration, cycle_secs: u64) -> Duration {
    let cycle = cycle_secs.max(1);
    let next = Duration::from_secs((now.as_secs() / cycle + 1) * cycle);
    next.saturating_sub(now)
}
