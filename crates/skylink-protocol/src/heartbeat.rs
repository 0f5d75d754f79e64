//! Transceiver heartbeat messages
//!
//! The relay polls each transceiver with `UDP Heartbeat <label>~` once per
//! second. The transceiver answers with a comma-separated ASCII line such as
//! `Heartbeat,-87,~` whose second field is the received signal strength.
//! The trailing `~` is a sacrificial delimiter.

/// Substring that identifies a heartbeat datagram
pub const HEARTBEAT_MARKER: &str = "Heartbeat";

/// Poll message sent to a transceiver
pub fn heartbeat_request(label: &str) -> String {
    format!("UDP {HEARTBEAT_MARKER} {label}~")
}

/// A heartbeat received from a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Heartbeat {
    pub signal_strength: i32,
}

impl Heartbeat {
    /// Returns true if the datagram is a heartbeat, whether or not it parses
    pub fn is_heartbeat(bytes: &[u8]) -> bool {
        std::str::from_utf8(bytes).is_ok_and(|s| s.contains(HEARTBEAT_MARKER))
    }

    /// Parse a heartbeat reply
    ///
    /// Returns `None` for anything that is not a heartbeat. A heartbeat
    /// without a readable signal strength reports 0.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        if !text.contains(HEARTBEAT_MARKER) {
            return None;
        }
        let signal_strength = text
            .split(',')
            .nth(1)
            .map(|s| s.trim_matches(|c: char| c == '~' || c.is_whitespace()))
            .and_then(|s| s.parse::<f64>().ok())
            .map(|v| v.round() as i32)
            .unwrap_or(0);
        Some(Self { signal_strength })
    }

    /// Reply text as sent by a transceiver
    pub fn encode(&self) -> String {
        format!("{HEARTBEAT_MARKER},{},~", self.signal_strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_text() {
        assert_eq!(heartbeat_request("Primary"), "UDP Heartbeat Primary~");
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(
            Heartbeat::parse(b"Heartbeat,-87,~"),
            Some(Heartbeat { signal_strength: -87 })
        );
        assert_eq!(
            Heartbeat::parse(b"Heartbeat, -92.4 ~"),
            Some(Heartbeat { signal_strength: -92 })
        );
        assert_eq!(
            Heartbeat::parse(b"Heartbeat~"),
            Some(Heartbeat { signal_strength: 0 })
        );
    }

    #[test]
    fn test_binary_is_not_heartbeat() {
        assert_eq!(Heartbeat::parse(&[0x08, 0x64, 0xC0, 0x00, 0xFF]), None);
        assert!(!Heartbeat::is_heartbeat(b"hello"));
        assert!(Heartbeat::is_heartbeat(b"Heartbeat,1,~"));
    }

    #[test]
    fn test_encode_parses_back() {
        let hb = Heartbeat { signal_strength: -64 };
        assert_eq!(Heartbeat::parse(hb.encode().as_bytes()), Some(hb));
    }
}
