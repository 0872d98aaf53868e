//! [`MessageSchema`]: the shape of one message type, as described by a FMT
//! frame (§3 of SPEC_FULL.md).

use serde::{Deserialize, Serialize};

use crate::field_format::field_width;

/// The type_id of the self-describing FMT message itself. Bootstrap-populated
/// before any scanning (§3).
pub const FMT_TYPE_ID: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSchema {
    pub type_id: u8,
    pub name: String,
    pub frame_length: u8,
    pub format_string: String,
    pub field_names: Vec<String>,
    /// One multiplier per field, or empty if no schema-level scaling has been
    /// recorded (implicit per-code scaling may still apply — see
    /// `field_format::effective_scale`).
    pub scale_factors: Vec<Option<f64>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("format_string/field_names length mismatch: {format_len} vs {names_len}")]
    FieldCountMismatch { format_len: usize, names_len: usize },

    #[error("scale_factors length {scale_len} does not match field count {field_len}")]
    ScaleCountMismatch { scale_len: usize, field_len: usize },

    #[error("frame_length {frame_length} does not match header(3) + payload width {payload_width}")]
    FrameLengthMismatch { frame_length: u8, payload_width: usize },

    #[error("unknown format code '{0}'")]
    UnknownCode(char),
}

impl MessageSchema {
    /// Construct and validate a schema per the §3 invariants. `format_string`
    /// codes that aren't in the known alphabet make this a
    /// `SchemaError::UnknownCode` — the caller (the registry) downgrades that
    /// to a `bad-format` warning and keeps the schema around, marked
    /// undecodable, per §4.1.
    pub fn new(
        type_id: u8,
        name: String,
        frame_length: u8,
        format_string: String,
        field_names: Vec<String>,
        scale_factors: Vec<Option<f64>>,
    ) -> Result<Self, SchemaError> {
        if format_string.chars().count() != field_names.len() {
            return Err(SchemaError::FieldCountMismatch {
                format_len: format_string.chars().count(),
                names_len: field_names.len(),
            });
        }
        if !scale_factors.is_empty() && scale_factors.len() != field_names.len() {
            return Err(SchemaError::ScaleCountMismatch {
                scale_len: scale_factors.len(),
                field_len: field_names.len(),
            });
        }

        let mut payload_width = 0usize;
        for code in format_string.chars() {
            payload_width += field_width(code).ok_or(SchemaError::UnknownCode(code))?;
        }
        if frame_length as usize != 3 + payload_width {
            return Err(SchemaError::FrameLengthMismatch { frame_length, payload_width });
        }

        Ok(Self {
            type_id,
            name,
            frame_length,
            format_string,
            field_names,
            scale_factors,
        })
    }

    pub fn payload_len(&self) -> usize {
        self.frame_length as usize - 3
    }

    /// Produce a copy of this schema with `scale_factors` replaced — used by
    /// FMTU/FUNIT augmentation, which replaces (never mutates in place) the
    /// registry entry (§3 lifecycle note).
    pub fn with_scale_factors(&self, scale_factors: Vec<Option<f64>>) -> Self {
        Self { scale_factors, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_frame_length() {
        let schema = MessageSchema::new(
            1,
            "GPS".into(),
            3 + 8,
            "Q".into(),
            vec!["TimeUS".into()],
            vec![],
        );
        assert!(schema.is_ok());

        let bad = MessageSchema::new(1, "GPS".into(), 3 + 4, "Q".into(), vec!["TimeUS".into()], vec![]);
        assert!(matches!(bad, Err(SchemaError::FrameLengthMismatch { .. })));
    }

    #[test]
    fn rejects_field_count_mismatch() {
        let err = MessageSchema::new(1, "GPS".into(), 11, "Qb".into(), vec!["TimeUS".into()], vec![]);
        assert!(matches!(err, Err(SchemaError::FieldCountMismatch { .. })));
    }

    #[test]
    fn rejects_scale_count_mismatch() {
        let err = MessageSchema::new(
            1,
            "GPS".into(),
            11,
            "Qb".into(),
            vec!["TimeUS".into(), "Status".into()],
            vec![Some(1.0)],
        );
        assert!(matches!(err, Err(SchemaError::ScaleCountMismatch { .. })));
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = MessageSchema::new(1, "XXX".into(), 4, "?".into(), vec!["F".into()], vec![]);
        assert_eq!(err, Err(SchemaError::UnknownCode('?')));
    }
}
