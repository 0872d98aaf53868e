//! Non-fatal per-frame problems.
//!
//! Warnings never abort a run (§7). Each worker accumulates its own
//! [`WarningBuffer`] and returns it at join time when `collect_warnings` is
//! set, or logs via `tracing` and drops it otherwise (§2.1 of SPEC_FULL.md).

/// Sentinel used for warnings raised outside any segment (bootstrap preload).
pub const NO_SEGMENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnknownType,
    ShortRead,
    BadFormat,
    DecodeError,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::UnknownType => "unknown-type",
            WarningKind::ShortRead => "short-read",
            WarningKind::BadFormat => "bad-format",
            WarningKind::DecodeError => "decode-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    /// `None` for warnings raised during the bootstrap preload, before any
    /// segment exists.
    pub segment_id: Option<u32>,
    pub offset: u64,
    pub kind: WarningKind,
    pub detail: String,
}

impl Warning {
    pub(crate) fn new(segment_id: u32, offset: u64, kind: WarningKind, detail: impl Into<String>) -> Self {
        let segment_id = if segment_id == NO_SEGMENT { None } else { Some(segment_id) };
        Self { segment_id, offset, kind, detail: detail.into() }
    }
}

/// A worker's local warning buffer. Workers never share mutable state; each
/// accumulates its own warnings and either forwards them to a shared channel
/// (thread mode) or returns them for the orchestrator to merge (process mode,
/// where they ride along in the spill file sidecar).
#[derive(Debug, Default, Clone)]
pub struct WarningBuffer {
    segment_id: u32,
    collect: bool,
    warnings: Vec<Warning>,
}

impl WarningBuffer {
    pub fn new(segment_id: u32, collect: bool) -> Self {
        Self { segment_id, collect, warnings: Vec::new() }
    }

    pub fn push(&mut self, offset: u64, kind: WarningKind, detail: impl Into<String>) {
        let detail = detail.into();
        if self.collect {
            self.warnings.push(Warning::new(self.segment_id, offset, kind, detail.clone()));
        }
        tracing::warn!(segment_id = self.segment_id, offset, kind = kind.as_str(), detail = %detail, "frame warning");
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}
