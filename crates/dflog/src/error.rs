//! The crate-wide fatal error type.
//!
//! Per-frame problems (unknown type, short read, bad format, catch-all decode
//! failure) are never represented here — they are [`crate::warning::Warning`]s
//! and never abort a run. `DecodeError` is reserved for conditions the spec
//! marks fatal: I/O, an undecodable bootstrap schema, a worker that did not
//! complete, or an explicit cancellation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode the bootstrap FMT schema: {0}")]
    BootstrapFormat(String),

    #[error("segment {segment_id} worker failed: {reason}")]
    WorkerFailed { segment_id: u32, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("spill file error for segment {segment_id}: {reason}")]
    Spill { segment_id: u32, reason: String },

    #[error("run was cancelled")]
    Cancelled,
}

/// A fatal error tagged with the byte offset and (if applicable) segment that
/// produced it, per §7's "structured error carrying kind, segment_id, and
/// byte offset".
#[derive(Debug)]
pub struct LocatedError {
    pub error: DecodeError,
    pub segment_id: Option<u32>,
    pub offset: Option<u64>,
}

impl std::fmt::Display for LocatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(seg) = self.segment_id {
            write!(f, " (segment {seg})")?;
        }
        if let Some(off) = self.offset {
            write!(f, " (offset {off})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LocatedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
