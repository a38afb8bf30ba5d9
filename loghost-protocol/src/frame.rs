//! Length-prefixed frame format.
//!
//! Frame layout:
//!
//! ```text
//! +-------------+--------------------------+
//! | payload_len | payload (UTF-8 JSON)      |
//! | 4 bytes, LE | payload_len bytes         |
//! +-------------+--------------------------+
//! ```
//!
//! The length is an unsigned 32-bit little-endian integer and counts payload
//! bytes only. This is the framing browsers use for native messaging hosts.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{ErrorKind, Read, Write};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on the buffer reserved before payload bytes arrive.
/// The buffer grows past this as data is actually received, so a bogus
/// length never turns into a huge allocation up front.
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// A single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (JSON data).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Creates a new frame from a JSON-serializable value.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(Bytes::from(payload)))
    }

    /// Returns the payload as UTF-8 text.
    pub fn payload_str(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Parses the payload as JSON.
    pub fn to_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_str(self.payload_str()?)?)
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len =
            u32::try_from(self.payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
                size: self.payload.len() as u64,
                max: MAX_PAYLOAD_SIZE,
            })?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.payload.len());
        buf.put_u32_le(payload_len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Writes the encoded frame and flushes the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        let encoded = self.encode()?;
        writer.write_all(&encoded)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one frame from a blocking reader.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before the first byte
    /// of the length prefix. A stream that ends anywhere else inside a frame
    /// is an error. Exactly `4 + payload_len` bytes are consumed on success.
    pub fn read_from<R: Read>(
        reader: &mut R,
        max_payload: u32,
    ) -> Result<Option<Self>, ProtocolError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let mut read = 0;
        while read < LENGTH_PREFIX_SIZE {
            match reader.read(&mut prefix[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match read {
            0 => return Ok(None),
            LENGTH_PREFIX_SIZE => {}
            _ => return Err(ProtocolError::TruncatedPrefix { read }),
        }

        let payload_len = u32::from_le_bytes(prefix);
        if payload_len > max_payload {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len as u64,
                max: max_payload,
            });
        }

        let mut payload =
            Vec::with_capacity((payload_len as usize).min(INITIAL_PAYLOAD_CAPACITY));
        reader
            .by_ref()
            .take(payload_len as u64)
            .read_to_end(&mut payload)?;

        if payload.len() != payload_len as usize {
            return Err(ProtocolError::TruncatedPayload {
                expected: payload_len,
                actual: payload.len(),
            });
        }

        Ok(Some(Self::new(Bytes::from(payload))))
    }
}
