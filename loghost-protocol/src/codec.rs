//! Blocking reader and writer for framed messages.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{Request, Response};
use crate::MAX_PAYLOAD_SIZE;
use std::io::{Read, Write};

/// Reads framed JSON messages from a byte stream.
pub struct FrameReader<R> {
    inner: R,
    max_payload: u32,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Rejects frames declaring a payload longer than `max` bytes.
    pub fn with_max_payload(mut self, max: u32) -> Self {
        self.max_payload = max;
        self
    }

    /// Reads the next frame. `Ok(None)` means the stream closed cleanly.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::read_from(&mut self.inner, self.max_payload)
    }

    /// Reads the next frame and parses its payload as JSON.
    pub fn read_json<T: serde::de::DeserializeOwned>(
        &mut self,
    ) -> Result<Option<T>, ProtocolError> {
        match self.read_frame()? {
            Some(frame) => Ok(Some(frame.to_json()?)),
            None => Ok(None),
        }
    }

    /// Reads the next request.
    pub fn read_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.read_json()
    }

    /// Reads the next response.
    pub fn read_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        self.read_json()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes framed JSON messages to a byte stream, flushing after each one.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        frame.write_to(&mut self.inner)
    }

    /// Serializes `value` as compact JSON and writes it as one frame.
    pub fn write_json<T: serde::Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        let frame = Frame::from_json(value)?;
        self.write_frame(&frame)
    }

    pub fn write_response(&mut self, response: &Response) -> Result<(), ProtocolError> {
        self.write_json(response)
    }

    pub fn write_request(&mut self, request: &Request) -> Result<(), ProtocolError> {
        self.write_json(request)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Access to the underlying stream, for writing bytes outside framing.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn encode_requests(requests: &[Request]) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new());
        for request in requests {
            writer.write_request(request).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_request_roundtrip() {
        let request = Request::append("/var/log/sel.log", ["a", "b", "c"]);
        let bytes = encode_requests(std::slice::from_ref(&request));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_request().unwrap(), Some(request));
        assert_eq!(reader.read_request().unwrap(), None);
    }

    #[test]
    fn test_response_roundtrip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_response(&Response::ok()).unwrap();
        writer
            .write_response(&Response::error("permission denied"))
            .unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
        assert_eq!(reader.read_response().unwrap(), Some(Response::ok()));
        assert_eq!(
            reader.read_response().unwrap(),
            Some(Response::error("permission denied"))
        );
        assert!(reader.read_response().unwrap().is_none());
    }

    #[test]
    fn test_malformed_json() {
        let payload = b"{\"op\":";
        let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(payload);

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_request(),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_malformed_utf8() {
        let payload = [b'"', 0xc3, 0x28, b'"'];
        let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&payload);

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_request(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_max_payload_limit() {
        let bytes = encode_requests(&[Request::append("/tmp/x", ["0123456789"])]);

        let mut reader = FrameReader::new(Cursor::new(bytes)).with_max_payload(8);
        assert!(matches!(
            reader.read_request(),
            Err(ProtocolError::FrameTooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn test_non_ascii_payload_length_counts_bytes() {
        let request = Request::append("/tmp/ünïcødé.log", ["日本語", "emoji 🎉"]);
        let bytes = encode_requests(std::slice::from_ref(&request));

        let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(declared, bytes.len() - 4);

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_request().unwrap(), Some(request));
    }

    proptest! {
        #[test]
        fn prop_append_request_roundtrip(
            path in "\\PC{0,64}",
            lines in proptest::collection::vec("\\PC{0,32}", 0..16),
        ) {
            let request = Request::append(path, lines);
            let bytes = encode_requests(std::slice::from_ref(&request));

            let mut reader = FrameReader::new(Cursor::new(bytes));
            prop_assert_eq!(reader.read_request().unwrap(), Some(request));
            prop_assert!(reader.read_request().unwrap().is_none());
        }

        #[test]
        fn prop_response_roundtrip(ok in any::<bool>(), message in "\\PC{0,64}") {
            let response = if ok { Response::ok() } else { Response::error(message) };

            let mut writer = FrameWriter::new(Vec::new());
            writer.write_response(&response).unwrap();

            let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
            prop_assert_eq!(reader.read_response().unwrap(), Some(response));
        }

        #[test]
        fn prop_frame_sequence_preserves_order(count in 0usize..8) {
            let requests: Vec<Request> = (0..count)
                .map(|i| Request::append(format!("/tmp/{i}.log"), [i.to_string()]))
                .collect();
            let bytes = encode_requests(&requests);

            let mut reader = FrameReader::new(Cursor::new(bytes));
            for expected in &requests {
                let actual = reader.read_request().unwrap();
                prop_assert_eq!(actual.as_ref(), Some(expected));
            }
            prop_assert!(reader.read_request().unwrap().is_none());
        }
    }
}
