//! `transitrack` - Live bus location tracking service
//!
//! This library provides the core functionality for receiving GPS
//! position reports from drivers, persisting them, fanning them out to
//! live dashboard subscribers, and answering nearest-stop queries.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod logging;
pub mod report;
pub mod server;
pub mod stops;
pub mod storage;

pub use config::Config;
pub use directory::{AccountDirectory, Identity, StaticDirectory};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, Subscription};
pub use ingest::LocationIngest;
pub use logging::init_logging;
pub use report::{LocationReport, LocationUpdate, ReportInput};
pub use stops::{NearestStop, StopIndex, StopPoint};
pub use storage::{Storage, StorageStats};
