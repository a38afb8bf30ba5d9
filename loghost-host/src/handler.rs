//! The append operation.

use crate::config::{AppendConfig, SyncPolicy};
use crate::error::HostError;
use crate::fs::FileSystem;
use loghost_protocol::AppendParams;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Appends lines of text to files through a [`FileSystem`].
pub struct AppendHandler<F> {
    fs: F,
    config: AppendConfig,
}

impl<F: FileSystem> AppendHandler<F> {
    /// Creates a handler with the default configuration.
    pub fn new(fs: F) -> Self {
        Self::with_config(fs, AppendConfig::default())
    }

    pub fn with_config(fs: F, config: AppendConfig) -> Self {
        Self { fs, config }
    }

    /// Handles a parsed append request. Returns the number of lines written.
    pub fn handle(&self, params: &AppendParams) -> Result<usize, HostError> {
        self.append(Path::new(&params.path), &params.lines)
    }

    /// Appends `lines` to `path`, one `\n`-terminated line per entry, creating
    /// the file and its parent directories when missing. `None` entries are
    /// written as empty lines. Data is flushed before this returns.
    pub fn append(&self, path: &Path, lines: &[Option<String>]) -> Result<usize, HostError> {
        if !self.config.permits(path) {
            warn!(path = %path.display(), "append outside allowed directories refused");
            return Err(HostError::PathNotPermitted(path.to_path_buf()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| HostError::append("create directory", parent, e))?;
        }

        let file = self
            .fs
            .open_append(path)
            .map_err(|e| HostError::append("open", path, e))?;
        let mut writer = BufWriter::new(file);

        for line in lines {
            let line = line.as_deref().unwrap_or_default();
            writer
                .write_all(line.as_bytes())
                .and_then(|()| writer.write_all(b"\n"))
                .map_err(|e| HostError::append("write to", path, e))?;
        }

        writer
            .flush()
            .map_err(|e| HostError::append("flush", path, e))?;

        if self.config.sync == SyncPolicy::Fsync {
            self.fs
                .sync(writer.get_mut())
                .map_err(|e| HostError::append("sync", path, e))?;
        }

        debug!(path = %path.display(), lines = lines.len(), "appended");
        Ok(lines.len())
    }
}
