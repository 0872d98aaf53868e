//! Parallel decoder for ArduPilot DataFlash (`.BIN`) flight logs.
//!
//! This crate reads a self-describing binary log into a time-ordered stream
//! of typed records. It supports:
//!
//! - Bootstrap schema discovery from the log's own `FMT`/`FMTU`/`FUNIT`
//!   frames
//! - Parallel, byte-range-partitioned decoding via rayon (thread mode) or
//!   worker subprocesses (process mode)
//! - A k-way merge back into `TimeUS` order across however many workers
//!   decoded the file
//!
//! # Example
//!
//! ```no_run
//! use dflog::{DecoderConfig, RunningMode, CancelHandle};
//! use std::path::PathBuf;
//!
//! let config = DecoderConfig {
//!     file_path: PathBuf::from("flight.bin"),
//!     num_workers: 4,
//!     running_mode: RunningMode::Thread,
//!     round_floats: false,
//!     message_filter: None,
//!     collect_warnings: true,
//!     spill_dir: std::env::temp_dir().join("dflog-spill"),
//!     worker_exe: None,
//!     cancel: CancelHandle::new(),
//! };
//!
//! let output = dflog::orchestrator::run(&config).unwrap();
//! println!("decoded {} records", output.records.len());
//! ```

pub mod config;
pub mod error;
pub mod field_format;
pub mod io_utils;
pub mod merge;
pub mod orchestrator;
pub mod range_splitter;
pub mod record;
pub mod registry;
pub mod schema;
pub mod segment_decoder;
pub mod spill;
pub mod sync_scanner;
pub mod warning;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CancelHandle, DecoderConfig, RunningMode};
pub use error::{DecodeError, LocatedError};
pub use orchestrator::{run, run_worker_segment, RunOutput, WorkerArgs};
pub use record::{DecodedRecord, FieldValue};
pub use registry::FormatRegistry;
pub use warning::{Warning, WarningKind};
