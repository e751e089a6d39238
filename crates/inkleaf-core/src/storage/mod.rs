//! Storage capability shared by the archive reader, page caches, and progress.

use std::io::{self, Read, Seek, Write};
use std::path::Path;

mod mem;

pub use mem::{MemStorage, StorageStats};

/// Removable-storage capability.
///
/// Handles are cheap to clone and every clone addresses the same medium, so a
/// chapter cache can keep its own handle while the scheduler keeps another.
pub trait Storage: Clone {
    type Reader: Read + Seek;
    type Writer: Write;

    /// Opens an existing file for reading.
    fn open_read(&self, path: &Path) -> io::Result<Self::Reader>;

    /// Creates (or truncates) a file for writing. The parent must exist.
    fn create(&self, path: &Path) -> io::Result<Self::Writer>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Removes a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replaces `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Treats a missing target as success.
pub fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Reads until `out` is full or the reader is exhausted, returning the byte count.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, out: &mut [u8]) -> io::Result<usize> {
    let mut total = 0usize;
    while total < out.len() {
        match reader.read(&mut out[total..]) {
            Ok(0) => break,
            Ok(read_now) => total += read_now,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
