//! [`DecodedRecord`] and [`FieldValue`] (§3 of SPEC_FULL.md).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A decoded field value. Scaling (implicit or explicit) always promotes its
/// source integer field to `F64`; unscaled integer/float codes keep their
/// native variant (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Int16Array([i16; 32]),
}

impl FieldValue {
    /// The field's value as `f64`, if it's a numeric scalar. Used to apply
    /// scaling and to extract `TimeUS`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::I8(v) => Some(v as f64),
            FieldValue::U8(v) => Some(v as f64),
            FieldValue::I16(v) => Some(v as f64),
            FieldValue::U16(v) => Some(v as f64),
            FieldValue::I32(v) => Some(v as f64),
            FieldValue::U32(v) => Some(v as f64),
            FieldValue::I64(v) => Some(v as f64),
            FieldValue::U64(v) => Some(v as f64),
            FieldValue::F32(v) => Some(v as f64),
            FieldValue::F64(v) => Some(v),
            FieldValue::Text(_) | FieldValue::Int16Array(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::U64(v) => Some(v),
            FieldValue::I64(v) => u64::try_from(v).ok(),
            FieldValue::U32(v) => Some(v as u64),
            FieldValue::I32(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Round f32/f64 values to 4 decimal digits, per `round_floats` (§4.4).
    pub fn rounded(&self) -> FieldValue {
        match self {
            FieldValue::F32(v) => FieldValue::F32((v * 10_000.0).round() / 10_000.0),
            FieldValue::F64(v) => FieldValue::F64((v * 10_000.0).round() / 10_000.0),
            other => other.clone(),
        }
    }
}

/// A single decoded message. `fields` preserves the schema's declared field
/// order. `__offset__` and `merge_key_time_us` are synthetic: the former
/// breaks merge ties (§5), the latter carries the record's effective
/// timestamp for ordering purposes without polluting `fields` with an
/// inherited value that wasn't actually present in the frame (§9, Open
/// Question resolution 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub message_type: String,
    pub fields: IndexMap<String, FieldValue>,
    #[serde(rename = "__offset__")]
    pub offset: u64,
    pub merge_key_time_us: u64,
}

impl DecodedRecord {
    /// The record's own `TimeUS` field, if present, distinct from the merge
    /// key (which may have been inherited from a prior record in the same
    /// segment).
    pub fn time_us(&self) -> Option<u64> {
        self.fields.get("TimeUS").and_then(FieldValue::as_u64)
    }
}
