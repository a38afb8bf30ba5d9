//! # loghost-host
//!
//! The loghost native messaging host.
//!
//! This crate provides:
//! - The request/response dispatch loop over a framed byte stream
//! - The append handler and the filesystem seam it writes through
//! - Layered configuration (defaults, YAML file, environment)

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod handler;

pub use config::{AppendConfig, Config, ConfigError, LoggingConfig, ProtocolConfig, SyncPolicy};
pub use dispatch::{Completed, Dispatcher, Host, HostState, RunSummary, Termination};
pub use error::HostError;
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use handler::AppendHandler;
