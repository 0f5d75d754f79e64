//! Error types for the relay

use thiserror::Error;

/// Errors that can occur in the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket or port I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// A packet could not be built
    #[error("encode error: {0}")]
    Encode(#[from] skylink_protocol::EncodeError),

    /// A received packet could not be parsed
    #[error("decode error: {0}")]
    Decode(#[from] skylink_protocol::DecodeError),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binding a local socket failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Address string did not resolve to any socket address
    #[error("could not resolve address {0}")]
    Resolve(String),

    /// A pipeline queue was closed by its other end
    #[error("queue closed: {0}")]
    QueueClosed(&'static str),

    /// No transport is configured for a destination
    #[error("no route to {0}")]
    NoRoute(crate::packet::Destination),
}
