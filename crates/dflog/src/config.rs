//! [`DecoderConfig`] (§6): the core's in-memory configuration record.
//! Loading it from a TOML file is `dflog-cli`'s job, not this crate's.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    Thread,
    Process,
}

/// A cooperative cancellation flag, checked once per decoded frame (§5).
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct DecoderConfig {
    pub file_path: PathBuf,
    pub num_workers: usize,
    pub running_mode: RunningMode,
    pub round_floats: bool,
    pub message_filter: Option<HashSet<String>>,
    pub collect_warnings: bool,
    pub spill_dir: PathBuf,
    /// Required only in `RunningMode::Process`; `dflog-cli` sets this to
    /// `std::env::current_exe()`.
    pub worker_exe: Option<PathBuf>,
    pub cancel: CancelHandle,
}

impl DecoderConfig {
    /// Reject configurations that can never produce a valid run, before any
    /// I/O is attempted (§8 ambient-stack properties).
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.num_workers == 0 {
            return Err(DecodeError::InvalidConfig("num_workers must be at least 1".into()));
        }
        if self.running_mode == RunningMode::Process && self.worker_exe.is_none() {
            return Err(DecodeError::InvalidConfig("worker_exe is required in process running mode".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DecoderConfig {
        DecoderConfig {
            file_path: PathBuf::from("log.bin"),
            num_workers: 4,
            running_mode: RunningMode::Thread,
            round_floats: false,
            message_filter: None,
            collect_warnings: false,
            spill_dir: PathBuf::from("/tmp"),
            worker_exe: None,
            cancel: CancelHandle::new(),
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let mut config = base_config();
        config.num_workers = 0;
        assert!(matches!(config.validate(), Err(DecodeError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_process_mode_without_worker_exe() {
        let mut config = base_config();
        config.running_mode = RunningMode::Process;
        assert!(matches!(config.validate(), Err(DecodeError::InvalidConfig(_))));
    }

    #[test]
    fn process_mode_with_worker_exe_is_valid() {
        let mut config = base_config();
        config.running_mode = RunningMode::Process;
        config.worker_exe = Some(PathBuf::from("/usr/bin/dflog-cli"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cancel_handle_reflects_cancellation() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(handle.clone().is_cancelled());
    }
}
