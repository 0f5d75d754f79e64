//! Fixed telemetry layouts
//!
//! A schema is an ordered list of `(name, type)` pairs. Field order and
//! types never change at runtime.

use crate::error::DecodeError;
use crate::field::{FieldType, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn float(name: &'static str) -> SchemaField {
    SchemaField { name, field_type: FieldType::Float }
}

const fn int(name: &'static str) -> SchemaField {
    SchemaField { name, field_type: FieldType::Int }
}

/// A named, ordered field layout
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

/// Essential telemetry sent by both flight computers every cycle
pub static ESSENTIAL_SCHEMA: Schema = Schema {
    name: "essential",
    fields: &[
        float("gps_latitude"),
        float("gps_longitude"),
        float("gps_altitude"),
        float("baro_altitude"),
        int("gps_satellites"),
        int("info_error_in_queue"),
        float("rssi"),
        float("snr"),
    ],
};

/// Rotator GPS position
pub static ROTATOR_POSITION_SCHEMA: Schema = Schema {
    name: "rotator_position",
    fields: &[float("latitude"), float("longitude"), float("altitude")],
};

/// Derived telemetry, all floats, in wire order
pub static CALCULATION_SCHEMA: Schema = Schema {
    name: "calculations",
    fields: &[
        float("gps_vertical_speed"),
        float("baro_vertical_speed"),
        float("horizontal_speed"),
        float("gps_total_speed"),
        float("ground_distance_to_rotator"),
        float("straight_line_distance_to_rotator"),
    ],
};

impl Schema {
    /// Bytes of user data this schema occupies
    pub fn byte_len(&self) -> usize {
        self.fields.len() * FieldType::SIZE
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Decode user data into typed values
    ///
    /// Trailing bytes beyond the schema are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<FieldValue>, DecodeError> {
        let needed = self.byte_len();
        if data.len() < needed {
            return Err(DecodeError::SchemaMismatch {
                schema: self.name,
                needed,
                actual: data.len(),
            });
        }
        Ok(self
            .fields
            .iter()
            .zip(data.chunks_exact(FieldType::SIZE))
            .map(|(field, chunk)| field.field_type.read([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::write_fields;

    #[test]
    fn test_essential_layout() {
        assert_eq!(ESSENTIAL_SCHEMA.fields.len(), 8);
        assert_eq!(ESSENTIAL_SCHEMA.byte_len(), 32);
        assert_eq!(ESSENTIAL_SCHEMA.index_of("gps_altitude"), Some(2));
        assert_eq!(ESSENTIAL_SCHEMA.fields[4].field_type, FieldType::Int);
        assert_eq!(ESSENTIAL_SCHEMA.index_of("missing"), None);
    }

    #[test]
    fn test_decode_typed_values() {
        let values = [
            FieldValue::Float(1.5),
            FieldValue::Float(2.5),
            FieldValue::Float(100.0),
        ];
        let mut data = Vec::new();
        write_fields(&values, &mut data);
        assert_eq!(ROTATOR_POSITION_SCHEMA.decode(&data).unwrap(), values);
    }

    #[test]
    fn test_decode_short_payload() {
        assert_eq!(
            ROTATOR_POSITION_SCHEMA.decode(&[0; 8]),
            Err(DecodeError::SchemaMismatch {
                schema: "rotator_position",
                needed: 12,
                actual: 8
            })
        );
    }
}
