//! Filesystem access used by the append handler.
//!
//! The handler never touches `std::fs` directly; it goes through
//! [`FileSystem`] so it can run against [`MemoryFileSystem`] in tests.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The filesystem operations needed to append to a file.
pub trait FileSystem {
    /// Handle to a file opened for appending.
    type File: Write;

    /// Creates `path` and all missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Opens `path` for appending, creating it if absent. Never truncates.
    fn open_append(&self, path: &Path) -> io::Result<Self::File>;

    /// Forces written data down to the storage device.
    fn sync(&self, file: &mut Self::File) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    type File = File;

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn open_append(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn sync(&self, file: &mut File) -> io::Result<()> {
        file.sync_data()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    dirs: HashSet<PathBuf>,
    files: HashMap<PathBuf, Vec<u8>>,
    denied: Vec<PathBuf>,
    accesses: usize,
    syncs: usize,
}

impl MemoryState {
    fn check_denied(&self, path: &Path) -> io::Result<()> {
        if self.denied.iter().any(|denied| path.starts_with(denied)) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        Ok(())
    }

    fn dir_exists(&self, dir: &Path) -> bool {
        dir.as_os_str().is_empty() || dir.parent().is_none() || self.dirs.contains(dir)
    }
}

/// In-memory filesystem.
///
/// Clones share the same state. Data written to a [`MemoryFile`] only becomes
/// visible through [`MemoryFileSystem::read`] once the file is flushed, so
/// tests can tell whether a writer flushed before returning.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every path under `path` fail with `PermissionDenied`.
    pub fn deny(self, path: impl Into<PathBuf>) -> Self {
        self.state.lock().denied.push(path.into());
        self
    }

    /// Pre-populates a file.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        {
            let mut state = self.state.lock();
            for ancestor in path.ancestors().skip(1) {
                if !ancestor.as_os_str().is_empty() {
                    state.dirs.insert(ancestor.to_path_buf());
                }
            }
            state.files.insert(path, contents.into());
        }
        self
    }

    /// Returns the committed contents of a file.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state.lock().files.get(path.as_ref()).cloned()
    }

    /// Returns the committed contents of a file as text.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn dir_exists(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().dir_exists(path.as_ref())
    }

    /// Number of `create_dir_all`/`open_append` calls made so far.
    pub fn access_count(&self) -> usize {
        self.state.lock().accesses
    }

    /// Number of `sync` calls made so far.
    pub fn sync_count(&self) -> usize {
        self.state.lock().syncs
    }
}

impl FileSystem for MemoryFileSystem {
    type File = MemoryFile;

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        state.accesses += 1;
        state.check_denied(path)?;

        for ancestor in path.ancestors() {
            if state.files.contains_key(ancestor) {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    format!("not a directory: {}", ancestor.display()),
                ));
            }
        }
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                state.dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }

    fn open_append(&self, path: &Path) -> io::Result<MemoryFile> {
        let mut state = self.state.lock();
        state.accesses += 1;
        state.check_denied(path)?;

        if state.dirs.contains(path) {
            return Err(io::Error::new(
                ErrorKind::Other,
                format!("is a directory: {}", path.display()),
            ));
        }
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        if !state.dir_exists(parent) {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("no such directory: {}", parent.display()),
            ));
        }

        state.files.entry(path.to_path_buf()).or_default();
        Ok(MemoryFile {
            path: path.to_path_buf(),
            pending: Vec::new(),
            state: Arc::clone(&self.state),
        })
    }

    fn sync(&self, file: &mut MemoryFile) -> io::Result<()> {
        file.flush()?;
        self.state.lock().syncs += 1;
        Ok(())
    }
}

/// A file opened through [`MemoryFileSystem`].
#[derive(Debug)]
pub struct MemoryFile {
    path: PathBuf,
    pending: Vec<u8>,
    state: Arc<Mutex<MemoryState>>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .append(&mut self.pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_os_append_never_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let fs = OsFileSystem;

        let mut file = fs.open_append(&path).unwrap();
        file.write_all(b"one\n").unwrap();
        drop(file);

        let mut file = fs.open_append(&path).unwrap();
        file.write_all(b"two\n").unwrap();
        fs.sync(&mut file).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_os_create_dir_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        OsFileSystem.create_dir_all(&nested).unwrap();
        OsFileSystem.create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_memory_requires_parent_dir() {
        let fs = MemoryFileSystem::new();
        let err = fs.open_append(Path::new("/logs/a.log")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        fs.create_dir_all(Path::new("/logs")).unwrap();
        assert!(fs.dir_exists("/logs"));
        assert!(fs.open_append(Path::new("/logs/a.log")).is_ok());
    }

    #[test]
    fn test_memory_commits_on_flush() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(Path::new("/logs")).unwrap();

        let mut file = fs.open_append(Path::new("/logs/a.log")).unwrap();
        file.write_all(b"hello\n").unwrap();
        assert_eq!(fs.read("/logs/a.log").unwrap(), b"");

        file.flush().unwrap();
        assert_eq!(fs.read_to_string("/logs/a.log").unwrap(), "hello\n");
    }

    #[test]
    fn test_memory_denied_paths() {
        let fs = MemoryFileSystem::new().deny("/root");

        let err = fs.create_dir_all(Path::new("/root/logs")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(fs.access_count(), 1);
    }

    #[test]
    fn test_memory_file_in_place_of_dir() {
        let fs = MemoryFileSystem::new().with_file("/logs", "not a dir");
        assert!(fs.create_dir_all(Path::new("/logs/sub")).is_err());
    }

    #[test]
    fn test_memory_relative_path_without_parent() {
        let fs = MemoryFileSystem::new();
        let mut file = fs.open_append(Path::new("plain.log")).unwrap();
        file.write_all(b"x\n").unwrap();
        fs.sync(&mut file).unwrap();

        assert_eq!(fs.read_to_string("plain.log").unwrap(), "x\n");
        assert_eq!(fs.sync_count(), 1);
    }
}
