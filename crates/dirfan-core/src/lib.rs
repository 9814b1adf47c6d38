//! Core types for dirfan.
//!
//! This crate provides the data structures shared by the scanning engine
//! and the command line front end: configuration, errors, per-file records
//! and the final scan report.

mod config;
mod error;
mod record;
mod report;

pub use config::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, EnumerationOptions, MAX_QUEUE_CAPACITY, ScanConfig,
    ScanConfigBuilder,
};
pub use error::{ProcessError, ScanError, ScanWarning, WarningKind};
pub use record::FileRecord;
pub use report::{ScanOutcome, ScanReport, ScanStats};
