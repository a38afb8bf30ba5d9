//! Request dispatch and the host read/answer loop.

use crate::error::HostError;
use crate::fs::FileSystem;
use crate::handler::AppendHandler;
use loghost_protocol::{
    AppendParams, FrameReader, FrameWriter, Operation, ProtocolError, Request, Response,
};
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Result of a successfully executed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completed {
    Appended { lines: usize },
}

/// Routes requests to operation handlers.
pub struct Dispatcher<F> {
    append: AppendHandler<F>,
}

impl<F: FileSystem> Dispatcher<F> {
    pub fn new(append: AppendHandler<F>) -> Self {
        Self { append }
    }

    /// Executes a request.
    pub fn execute(&self, request: &Request) -> Result<Completed, HostError> {
        let Some(op) = request.operation() else {
            return Err(HostError::UnknownOperation(request.op.clone()));
        };

        match op {
            Operation::Append => {
                let params =
                    AppendParams::from_request(request).map_err(HostError::InvalidRequest)?;
                let lines = self.append.handle(&params)?;
                Ok(Completed::Appended { lines })
            }
        }
    }
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// The input closed cleanly between frames.
    EndOfStream,
    /// The input yielded a frame that could not be read or parsed.
    DecodeFailed(ProtocolError),
}

/// Loop state.
#[derive(Debug)]
pub enum HostState {
    Running,
    Terminated(Termination),
}

impl HostState {
    pub fn is_running(&self) -> bool {
        matches!(self, HostState::Running)
    }
}

/// What happened during a run.
#[derive(Debug)]
pub struct RunSummary {
    pub termination: Termination,
    /// Requests decoded and answered.
    pub requests: u64,
    /// Requests answered with `ok: false`.
    pub failures: u64,
    /// Lines appended across all files.
    pub lines_appended: u64,
}

/// Reads requests from `R`, answers on `W`, one at a time.
///
/// Every decoded request gets exactly one response before the next frame is
/// read. A clean end of input or an undecodable frame ends the loop without
/// a response; failures inside an operation are answered and the loop goes on.
pub struct Host<R, W, F> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    dispatcher: Dispatcher<F>,
    state: HostState,
    requests: u64,
    failures: u64,
    lines_appended: u64,
}

impl<R: Read, W: Write, F: FileSystem> Host<R, W, F> {
    pub fn new(input: R, output: W, dispatcher: Dispatcher<F>) -> Self {
        Self {
            reader: FrameReader::new(input),
            writer: FrameWriter::new(output),
            dispatcher,
            state: HostState::Running,
            requests: 0,
            failures: 0,
            lines_appended: 0,
        }
    }

    /// Rejects request frames declaring more than `max` payload bytes.
    pub fn with_max_payload(mut self, max: u32) -> Self {
        self.reader = self.reader.with_max_payload(max);
        self
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    /// Reads one frame and answers it.
    ///
    /// Does nothing once terminated. An error means the response could not be
    /// delivered; the output stream is then unusable.
    pub fn serve_one(&mut self) -> Result<&HostState, HostError> {
        if !self.state.is_running() {
            return Ok(&self.state);
        }

        let request = match self.reader.read_request() {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("input closed");
                self.state = HostState::Terminated(Termination::EndOfStream);
                return Ok(&self.state);
            }
            Err(e) => {
                debug!(error = %e, "undecodable frame, stopping");
                self.state = HostState::Terminated(Termination::DecodeFailed(e));
                return Ok(&self.state);
            }
        };

        self.requests += 1;
        debug!(op = request.op.as_deref().unwrap_or("<none>"), "request");

        let response = match self.dispatcher.execute(&request) {
            Ok(Completed::Appended { lines }) => {
                self.lines_appended += lines as u64;
                Response::ok()
            }
            Err(e) => {
                self.failures += 1;
                match e {
                    HostError::UnknownOperation(ref op) => {
                        debug!(op = op.as_deref().unwrap_or("<none>"), "unknown operation")
                    }
                    ref e => warn!(error = %e, "request failed"),
                }
                e.to_response()
            }
        };

        self.writer.write_response(&response)?;
        Ok(&self.state)
    }

    /// Serves requests until the input ends or becomes undecodable.
    pub fn run(mut self) -> Result<RunSummary, HostError> {
        while self.serve_one()?.is_running() {}

        let termination = match self.state {
            HostState::Terminated(termination) => termination,
            HostState::Running => Termination::EndOfStream,
        };

        Ok(RunSummary {
            termination,
            requests: self.requests,
            failures: self.failures,
            lines_appended: self.lines_appended,
        })
    }
}
