//! # loghost-client
//!
//! Client library for loghost.
//!
//! This crate provides:
//! - Spawning the host binary the way a browser does, with piped stdio
//! - Sending framed requests and reading the matching responses
//! - Raw frame injection for exercising malformed input

pub mod error;
pub mod process;

pub use error::ClientError;
pub use process::{HostCommand, HostProcess};
