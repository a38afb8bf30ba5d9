//! # loghost-protocol
//!
//! Wire protocol spoken between a browser and the loghost native messaging host.
//!
//! This crate provides:
//! - Framing with a 4-byte little-endian length prefix
//! - Blocking frame reader/writer over any `Read`/`Write` pair
//! - Request/Response message types and the closed set of operations
//! - Protocol error types

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{FrameReader, FrameWriter};
pub use error::ProtocolError;
pub use frame::{Frame, LENGTH_PREFIX_SIZE};
pub use message::{AppendParams, Operation, Request, Response};

/// Maximum payload a single frame can describe.
pub const MAX_PAYLOAD_SIZE: u32 = u32::MAX;
