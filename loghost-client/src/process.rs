//! A host process driven over its stdio.

use crate::error::ClientError;
use loghost_protocol::{FrameReader, FrameWriter, Request, Response};
use std::ffi::OsString;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

/// How to launch the host.
#[derive(Debug, Clone)]
pub struct HostCommand {
    /// Host executable.
    pub program: PathBuf,
    /// Arguments, e.g. the caller origin a browser would pass.
    pub args: Vec<OsString>,
    /// Extra environment variables.
    pub envs: Vec<(OsString, OsString)>,
    /// Let the host's stderr through instead of discarding it.
    pub inherit_stderr: bool,
}

impl HostCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            inherit_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn with_inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }

    /// Starts the host.
    pub fn spawn(&self) -> Result<HostProcess, ClientError> {
        HostProcess::spawn(self)
    }
}

/// A running host.
///
/// Requests are answered strictly in order, so each call writes one frame
/// and then blocks on exactly one response frame.
pub struct HostProcess {
    child: Child,
    writer: Option<FrameWriter<ChildStdin>>,
    reader: FrameReader<BufReader<ChildStdout>>,
}

impl HostProcess {
    pub fn spawn(command: &HostCommand) -> Result<Self, ClientError> {
        tracing::debug!("Starting host {}...", command.program.display());

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if command.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .spawn()
            .map_err(|source| ClientError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "host stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "host stdout not piped"))?;

        Ok(Self {
            child,
            writer: Some(FrameWriter::new(stdin)),
            reader: FrameReader::new(BufReader::new(stdout)),
        })
    }

    fn writer(&mut self) -> Result<&mut FrameWriter<ChildStdin>, ClientError> {
        self.writer.as_mut().ok_or(ClientError::InputClosed)
    }

    /// Sends a request without waiting for the answer.
    pub fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        self.writer()?.write_request(request)?;
        Ok(())
    }

    /// Reads the next response. `Ok(None)` means the host closed its output.
    pub fn read_response(&mut self) -> Result<Option<Response>, ClientError> {
        Ok(self.reader.read_response()?)
    }

    /// Sends a request and waits for its response.
    pub fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        self.send(request)?;
        self.read_response()?.ok_or(ClientError::HostClosed)
    }

    /// Appends `lines` to `path` through the host, turning an error response
    /// into [`ClientError::HostError`].
    pub fn append<I, S>(&mut self, path: impl AsRef<Path>, lines: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = Request::append(path.as_ref().to_string_lossy(), lines);
        let response = self.request(&request)?;
        if response.ok {
            Ok(())
        } else {
            Err(ClientError::HostError(response.error.unwrap_or_default()))
        }
    }

    /// Writes bytes straight to the host's stdin, bypassing framing.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let stdin = self.writer()?.get_mut();
        stdin.write_all(bytes)?;
        stdin.flush()?;
        Ok(())
    }

    /// Closes the host's stdin. The host sees end of input.
    pub fn close_input(&mut self) {
        self.writer = None;
    }

    /// Closes stdin, collects any responses still buffered and waits for exit.
    pub fn finish(mut self) -> Result<(Vec<Response>, ExitStatus), ClientError> {
        self.close_input();

        let mut remaining = Vec::new();
        while let Some(response) = self.read_response()? {
            remaining.push(response);
        }

        let status = self.child.wait()?;
        tracing::debug!("Host exited with {}", status);
        Ok((remaining, status))
    }
}

impl Drop for HostProcess {
    fn drop(&mut self) {
        self.writer = None;
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
