//! CCSDS space packet framing
//!
//! # Wire layout
//!
//! ```text
//! +---------+------+--------+-----------+ +-------+-----------+ +-------------+
//! | version | type | sechdr |   apid    | | flags | seq count | | data length |
//! |  3 bits | 1    | 1      |  11 bits  | | 2 (11)| 14 bits   | |   16 bits   |
//! +---------+------+--------+-----------+ +-------+-----------+ +-------------+
//! telemetry only:  [ epoch seconds u32 ][ subseconds u16, 1/65536 s ]
//! user data:       telecommand: [ packet id u16 ][ fields... ]
//!                  telemetry:   [ fields... ]
//! ```
//!
//! All multi-byte values are big-endian. The data length field holds the
//! user data length minus one; the secondary header is not counted.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::{DecodeError, EncodeError};
use crate::field::{write_fields, FieldValue};

pub const PRIMARY_HEADER_LEN: usize = 6;
pub const SECONDARY_HEADER_LEN: usize = 6;
pub const PACKET_ID_LEN: usize = 2;

/// Largest APID representable in 11 bits
pub const MAX_APID: u16 = 0x07FF;
pub const SEQUENCE_COUNT_MASK: u16 = 0x3FFF;
/// Sequence flags "11": unsegmented user data
const SEQUENCE_FLAGS: u16 = 0xC000;
const MAX_USER_DATA_LEN: usize = u16::MAX as usize + 1;

/// Packet type bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    Telemetry = 0,
    Telecommand = 1,
}

/// Epoch time carried by the telemetry secondary header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    pub seconds: u32,
    /// Fraction of a second in 1/65536 units
    pub subseconds: u16,
}

impl Timestamp {
    pub fn new(seconds: u32, subseconds: u16) -> Self {
        Self { seconds, subseconds }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a system time, saturating before the epoch and after 2106
    pub fn from_system_time(time: SystemTime) -> Self {
        let since = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let seconds = u32::try_from(since.as_secs()).unwrap_or(u32::MAX);
        let subseconds = ((u64::from(since.subsec_nanos()) << 16) / 1_000_000_000) as u16;
        Self { seconds, subseconds }
    }

    /// Seconds since the epoch including the fractional part
    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.seconds) + f64::from(self.subseconds) / 65536.0
    }

    fn to_bytes(self) -> [u8; SECONDARY_HEADER_LEN] {
        let s = self.seconds.to_be_bytes();
        let ss = self.subseconds.to_be_bytes();
        [s[0], s[1], s[2], s[3], ss[0], ss[1]]
    }
}

/// What kind of packet to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Telemetry with a time secondary header
    Telemetry { timestamp: Timestamp },
    /// Telecommand whose user data starts with a 16-bit packet id
    Telecommand { packet_id: u16 },
}

/// Encode a space packet
///
/// The sequence count wraps at 14 bits. Failures are logged before being
/// returned.
pub fn encode(
    apid: u16,
    sequence_count: u16,
    kind: PacketKind,
    fields: &[FieldValue],
) -> Result<Vec<u8>, EncodeError> {
    build(apid, sequence_count, kind, fields).map_err(|e| {
        warn!("Failed to encode packet for apid {}: {}", apid, e);
        e
    })
}

fn build(
    apid: u16,
    sequence_count: u16,
    kind: PacketKind,
    fields: &[FieldValue],
) -> Result<Vec<u8>, EncodeError> {
    if apid > MAX_APID {
        return Err(EncodeError::ApidOutOfRange(apid));
    }

    let mut user_data = Vec::with_capacity(PACKET_ID_LEN + fields.len() * 4);
    if let PacketKind::Telecommand { packet_id } = kind {
        user_data.extend_from_slice(&packet_id.to_be_bytes());
    }
    write_fields(fields, &mut user_data);

    if user_data.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }
    if user_data.len() > MAX_USER_DATA_LEN {
        return Err(EncodeError::PayloadTooLong(user_data.len()));
    }

    let (packet_type, timestamp) = match kind {
        PacketKind::Telemetry { timestamp } => (PacketType::Telemetry, Some(timestamp)),
        PacketKind::Telecommand { .. } => (PacketType::Telecommand, None),
    };
    let sechdr = u16::from(timestamp.is_some());

    let identification = ((packet_type as u16) << 12) | (sechdr << 11) | apid;
    let sequence = SEQUENCE_FLAGS | (sequence_count & SEQUENCE_COUNT_MASK);
    let data_length = (user_data.len() - 1) as u16;

    let mut out = Vec::with_capacity(PRIMARY_HEADER_LEN + SECONDARY_HEADER_LEN + user_data.len());
    out.extend_from_slice(&identification.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&data_length.to_be_bytes());
    if let Some(ts) = timestamp {
        out.extend_from_slice(&ts.to_bytes());
    }
    out.extend_from_slice(&user_data);
    Ok(out)
}

/// Encode a telemetry packet stamped with the current time
pub fn encode_telemetry(
    apid: u16,
    sequence_count: u16,
    fields: &[FieldValue],
) -> Result<Vec<u8>, EncodeError> {
    encode_telemetry_at(apid, sequence_count, fields, Timestamp::now())
}

/// Encode a telemetry packet with an explicit timestamp
pub fn encode_telemetry_at(
    apid: u16,
    sequence_count: u16,
    fields: &[FieldValue],
    timestamp: Timestamp,
) -> Result<Vec<u8>, EncodeError> {
    encode(apid, sequence_count, PacketKind::Telemetry { timestamp }, fields)
}

pub fn encode_telecommand(
    apid: u16,
    sequence_count: u16,
    packet_id: u16,
    fields: &[FieldValue],
) -> Result<Vec<u8>, EncodeError> {
    encode(apid, sequence_count, PacketKind::Telecommand { packet_id }, fields)
}

/// A decoded space packet
///
/// `data` is the opaque user data; interpreting it needs the schema of
/// the APID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub apid: u16,
    pub sequence_count: u16,
    pub packet_type: PacketType,
    pub secondary_header: bool,
    /// Raw data length field (user data length minus one)
    pub data_length: u16,
    pub timestamp: Option<Timestamp>,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn is_telecommand(&self) -> bool {
        self.packet_type == PacketType::Telecommand
    }

    /// Leading 16-bit packet id of a telecommand
    pub fn packet_id(&self) -> Option<u16> {
        if !self.is_telecommand() || self.data.len() < PACKET_ID_LEN {
            return None;
        }
        Some(u16::from_be_bytes([self.data[0], self.data[1]]))
    }

    /// Telecommand arguments following the packet id
    pub fn command_data(&self) -> &[u8] {
        if self.is_telecommand() {
            self.data.get(PACKET_ID_LEN..).unwrap_or(&[])
        } else {
            &[]
        }
    }
}

/// Decode a space packet
pub fn decode(bytes: &[u8]) -> Result<Packet, DecodeError> {
    if bytes.len() < PRIMARY_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: PRIMARY_HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let identification = u16::from_be_bytes([bytes[0], bytes[1]]);
    let sequence = u16::from_be_bytes([bytes[2], bytes[3]]);
    let data_length = u16::from_be_bytes([bytes[4], bytes[5]]);

    let packet_type = if identification & 0x1000 != 0 {
        PacketType::Telecommand
    } else {
        PacketType::Telemetry
    };
    let secondary_header = identification & 0x0800 != 0;
    let apid = identification & MAX_APID;
    let sequence_count = sequence & SEQUENCE_COUNT_MASK;

    let (timestamp, data_start) = match packet_type {
        PacketType::Telemetry => {
            let end = PRIMARY_HEADER_LEN + SECONDARY_HEADER_LEN;
            if bytes.len() < end {
                return Err(DecodeError::Truncated {
                    needed: end,
                    actual: bytes.len(),
                });
            }
            let seconds = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
            let subseconds = u16::from_be_bytes([bytes[10], bytes[11]]);
            (Some(Timestamp::new(seconds, subseconds)), end)
        }
        PacketType::Telecommand => (None, PRIMARY_HEADER_LEN),
    };

    Ok(Packet {
        apid,
        sequence_count,
        packet_type,
        secondary_header,
        data_length,
        timestamp,
        data: bytes[data_start..].to_vec(),
    })
}
