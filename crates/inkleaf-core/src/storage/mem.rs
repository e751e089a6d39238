use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Storage;

/// Operation counters kept by [`MemStorage`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StorageStats {
    pub opened_for_read: usize,
    pub opened_for_write: usize,
}

#[derive(Debug, Default)]
struct MemState {
    files: BTreeMap<PathBuf, Arc<Mutex<Vec<u8>>>>,
    dirs: BTreeSet<PathBuf>,
    stats: StorageStats,
}

/// In-memory storage medium.
///
/// Behaves like a small filesystem: files need an existing parent directory,
/// writes land directly in the shared file (a half-written file is visible
/// just as it would be on a card), and reads see a snapshot taken at open time.
#[derive(Clone, Debug, Default)]
pub struct MemStorage {
    inner: Arc<Mutex<MemState>>,
}

/// Writer handed out by [`MemStorage::create`].
#[derive(Debug)]
pub struct MemWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.data).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("/")
}

impl MemState {
    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) => is_root(parent) || self.dirs.contains(parent),
            None => true,
        }
    }
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` at `path`, creating parent directories as needed.
    pub fn write_file(&self, path: impl AsRef<Path>, bytes: &[u8]) {
        let path = path.as_ref();
        let mut state = lock(&self.inner);
        if let Some(parent) = path.parent() {
            for ancestor in parent.ancestors().filter(|dir| !is_root(dir)) {
                state.dirs.insert(ancestor.to_path_buf());
            }
        }
        state
            .files
            .insert(path.to_path_buf(), Arc::new(Mutex::new(bytes.to_vec())));
    }

    /// Snapshot of a file's contents.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = lock(&self.inner);
        state
            .files
            .get(path.as_ref())
            .map(|data| lock(data).clone())
    }

    /// Files stored directly below `dir`, sorted by path.
    pub fn files_in(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        let state = lock(&self.inner);
        state
            .files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StorageStats {
        lock(&self.inner).stats
    }

    pub fn reset_stats(&self) {
        lock(&self.inner).stats = StorageStats::default();
    }
}

impl Storage for MemStorage {
    type Reader = Cursor<Vec<u8>>;
    type Writer = MemWriter;

    fn open_read(&self, path: &Path) -> io::Result<Self::Reader> {
        let mut state = lock(&self.inner);
        state.stats.opened_for_read += 1;
        let data = state.files.get(path).ok_or_else(|| not_found(path))?;
        let snapshot = lock(data).clone();
        Ok(Cursor::new(snapshot))
    }

    fn create(&self, path: &Path) -> io::Result<Self::Writer> {
        let mut state = lock(&self.inner);
        if !state.parent_exists(path) {
            return Err(not_found(path.parent().unwrap_or(path)));
        }
        if state.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a directory", path.display()),
            ));
        }
        state.stats.opened_for_write += 1;
        let data = Arc::new(Mutex::new(Vec::new()));
        state.files.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(MemWriter { data })
    }

    fn exists(&self, path: &Path) -> bool {
        let state = lock(&self.inner);
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = lock(&self.inner);
        for ancestor in path.ancestors().filter(|dir| !is_root(dir)) {
            if state.files.contains_key(ancestor) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = lock(&self.inner);
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = lock(&self.inner);
        if !state.dirs.contains(path) {
            return Err(not_found(path));
        }
        state.files.retain(|file, _| !file.starts_with(path));
        state.dirs.retain(|dir| !dir.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = lock(&self.inner);
        if !state.parent_exists(to) {
            return Err(not_found(to.parent().unwrap_or(to)));
        }
        let data = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), data);
        Ok(())
    }
}
