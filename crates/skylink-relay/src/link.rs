//! Transports to the control center and the transceivers
//!
//! # Architecture
//!
//! A [`Link`] is a bidirectional datagram-ish byte pipe. The relay is generic
//! over the link type so the networked transceivers and the serial base
//! station share one connection manager:
//!
//! - [`UdpLink`]: receive socket bound locally, transmit socket sending to a
//!   fixed remote. Liveness comes from heartbeats.
//! - [`SerialLink`]: one serial port, split into read and write halves.
//!   Liveness is "port is open".

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::RelayError;

/// Largest datagram the relay reads
pub const MAX_DATAGRAM: usize = 2048;

/// Byte transport used by the connection manager
pub trait Link: Send + Sync + 'static {
    /// Transmit one message
    fn send(&self, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive one message into `buf`, returning its length
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether liveness is tracked through heartbeats
    ///
    /// Links that return false are considered connected from the start and
    /// only drop on I/O errors.
    fn heartbeat_driven(&self) -> bool {
        true
    }
}

/// UDP endpoint pair
#[derive(Debug)]
pub struct UdpLink {
    name: String,
    rx: UdpSocket,
    tx: UdpSocket,
    remote: SocketAddr,
}

impl UdpLink {
    /// Bind the receive socket and resolve the remote
    pub async fn bind(name: &str, bind_addr: &str, remote: &str) -> Result<Self, RelayError> {
        let rx = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        let remote = resolve(remote).await?;
        let any = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let tx = UdpSocket::bind(any).await.map_err(|source| RelayError::Bind {
            addr: any.to_string(),
            source,
        })?;

        info!(
            "{} link: listening on {}, sending to {}",
            name,
            rx.local_addr()?,
            remote
        );

        Ok(Self {
            name: name.to_string(),
            rx,
            tx,
            remote,
        })
    }

    /// Address the receive socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.rx.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr, RelayError> {
    lookup_host(addr)
        .await
        .map_err(|_| RelayError::Resolve(addr.to_string()))?
        .next()
        .ok_or_else(|| RelayError::Resolve(addr.to_string()))
}

impl Link for UdpLink {
    async fn send(&self, data: &[u8]) -> io::Result<()> {
        self.tx.send_to(data, self.remote).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, from) = self.rx.recv_from(buf).await?;
        debug!("IN  <-{}({}) {:02X?}", self.name, from, &buf[..n]);
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serial base station link
pub struct SerialLink {
    name: String,
    reader: Mutex<ReadHalf<SerialStream>>,
    writer: Mutex<WriteHalf<SerialStream>>,
}

impl SerialLink {
    /// Open a serial port
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, RelayError> {
        let stream = tokio_serial::new(port, baud_rate)
            .timeout(Duration::from_millis(100))
            .open_native_async()?;
        info!("Serial link open on {} at {} baud", port, baud_rate);

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            name: port.to_string(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }
}

impl Link for SerialLink {
    async fn send(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self.reader.lock().await;
        let n = reader.read(buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port closed",
            ));
        }
        debug!("IN  <-{} {:02X?}", self.name, &buf[..n]);
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn heartbeat_driven(&self) -> bool {
        false
    }
}

/// Names of the serial ports present on this machine
pub fn available_serial_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Liveness of one transceiver link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkHealth {
    pub connected: bool,
    /// Last reported RSSI in dBm
    pub signal_strength: i32,
    #[serde(skip)]
    pub last_heartbeat: Option<Instant>,
}

impl LinkHealth {
    /// Health of a link that is up without heartbeats
    pub fn always_on() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Time since the last heartbeat
    pub fn heartbeat_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_link_exchange() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap().to_string();
        let link = UdpLink::bind("Primary", "127.0.0.1:0", &peer_addr)
            .await
            .unwrap();

        link.send(&[1, 2, 3]).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);

        peer.send_to(&[9, 8], link.local_addr().unwrap())
            .await
            .unwrap();
        let n = link.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[9, 8]);
        assert_eq!(link.name(), "Primary");
        assert!(link.heartbeat_driven());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let result = UdpLink::bind("Primary", &addr, "127.0.0.1:9").await;
        assert!(matches!(result, Err(RelayError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_unresolvable_remote() {
        let result = UdpLink::bind("Primary", "127.0.0.1:0", "not an address").await;
        assert!(matches!(result, Err(RelayError::Resolve(_))));
    }

    #[tokio::test]
    async fn test_open_missing_serial_port_fails() {
        assert!(SerialLink::open("/dev/skylink-does-not-exist", 115_200).is_err());
    }

    #[test]
    fn test_link_health_defaults() {
        assert!(!LinkHealth::default().connected);
        assert!(LinkHealth::always_on().connected);
        assert_eq!(LinkHealth::default().heartbeat_age(), None);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory link for unit tests

    use std::sync::Mutex as StdMutex;

    use tokio::sync::mpsc;

    use super::*;

    pub(crate) struct MockLink {
        name: String,
        heartbeat_driven: bool,
        sent: StdMutex<Vec<Vec<u8>>>,
        incoming: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    }

    impl MockLink {
        /// Create a link and the sender that feeds its receive side
        pub(crate) fn new(name: &str) -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let link = Self {
                name: name.to_string(),
                heartbeat_driven: true,
                sent: StdMutex::new(Vec::new()),
                incoming: Mutex::new(rx),
            };
            (link, tx)
        }

        pub(crate) fn without_heartbeats(mut self) -> Self {
            self.heartbeat_driven = false;
            self
        }

        pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for MockLink {
        async fn send(&self, data: &[u8]) -> io::Result<()> {
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            let mut rx = self.incoming.lock().await;
            match rx.recv().await {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => std::future::pending().await,
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn heartbeat_driven(&self) -> bool {
            self.heartbeat_driven
        }
    }
}
