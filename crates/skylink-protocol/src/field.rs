//! Typed 32-bit payload fields
//!
//! Every field on the wire is exactly four bytes, most significant byte
//! first. The wire itself carries no type information, so decoding a field
//! needs a [`FieldType`] from a schema.

use std::str::FromStr;

use crate::error::FieldError;

/// Wire type of a payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldType {
    /// 32-bit signed integer
    Int,
    /// 32-bit IEEE-754 float
    Float,
}

impl FieldType {
    /// Size of every field on the wire
    pub const SIZE: usize = 4;

    /// Interpret four big-endian bytes as a value of this type
    pub fn read(self, bytes: [u8; 4]) -> FieldValue {
        match self {
            FieldType::Int => FieldValue::Int(i32::from_be_bytes(bytes)),
            FieldType::Float => FieldValue::Float(f32::from_be_bytes(bytes)),
        }
    }
}

/// A single payload value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Int(i32),
    Float(f32),
}

impl FieldValue {
    /// Big-endian wire bytes
    pub fn to_be_bytes(self) -> [u8; 4] {
        match self {
            FieldValue::Int(v) => v.to_be_bytes(),
            FieldValue::Float(v) => v.to_be_bytes(),
        }
    }

    pub fn field_type(self) -> FieldType {
        match self {
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
        }
    }

    /// Widen to `f64` for arithmetic
    pub fn as_f64(self) -> f64 {
        match self {
            FieldValue::Int(v) => f64::from(v),
            FieldValue::Float(v) => f64::from(v),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl FromStr for FieldValue {
    type Err = FieldError;

    /// A run of ASCII digits (optionally signed) is an integer, anything
    /// else that parses as a float is a float.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<i32>()
                .map(FieldValue::Int)
                .map_err(|_| FieldError::OutOfRange(s.to_string()));
        }
        s.parse::<f32>()
            .map(FieldValue::Float)
            .map_err(|_| FieldError::NotNumeric(s.to_string()))
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Parse a comma-separated field list such as `"56.95,24.1,7"`
///
/// An empty string yields an empty list.
pub fn parse_fields(csv: &str) -> Result<Vec<FieldValue>, FieldError> {
    if csv.trim().is_empty() {
        return Ok(Vec::new());
    }
    csv.split(',').map(str::parse).collect()
}

/// Serialize fields in order, four bytes each
pub fn write_fields(fields: &[FieldValue], out: &mut Vec<u8>) {
    out.reserve(fields.len() * FieldType::SIZE);
    for field in fields {
        out.extend_from_slice(&field.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!("42".parse::<FieldValue>(), Ok(FieldValue::Int(42)));
        assert_eq!("-7".parse::<FieldValue>(), Ok(FieldValue::Int(-7)));
        assert_eq!("3.5".parse::<FieldValue>(), Ok(FieldValue::Float(3.5)));
        assert_eq!(" 1e3 ".parse::<FieldValue>(), Ok(FieldValue::Float(1000.0)));
    }

    #[test]
    fn test_parse_rejects_text() {
        assert!(matches!(
            "abc".parse::<FieldValue>(),
            Err(FieldError::NotNumeric(_))
        ));
        assert!(matches!(
            "99999999999".parse::<FieldValue>(),
            Err(FieldError::OutOfRange(_))
        ));
        assert!(matches!("-".parse::<FieldValue>(), Err(FieldError::NotNumeric(_))));
    }

    #[test]
    fn test_parse_fields_list() {
        let fields = parse_fields("1,2.5,-3").unwrap();
        assert_eq!(
            fields,
            vec![FieldValue::Int(1), FieldValue::Float(2.5), FieldValue::Int(-3)]
        );
        assert!(parse_fields("").unwrap().is_empty());
        assert!(parse_fields("1,x").is_err());
    }

    #[test]
    fn test_big_endian_layout() {
        assert_eq!(FieldValue::Int(1).to_be_bytes(), [0x00, 0x00, 0x00, 0x01]);
        assert_eq!(FieldValue::Float(1.0).to_be_bytes(), [0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(FieldType::Float.read([0x3F, 0x80, 0x00, 0x00]), FieldValue::Float(1.0));
        assert_eq!(FieldType::Int.read([0xFF, 0xFF, 0xFF, 0xFF]), FieldValue::Int(-1));
    }

    #[test]
    fn test_write_fields() {
        let mut out = Vec::new();
        write_fields(&[FieldValue::Int(2), FieldValue::Int(3)], &mut out);
        assert_eq!(out, [0, 0, 0, 2, 0, 0, 0, 3]);
    }
}
