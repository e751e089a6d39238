//! Single-entry extraction from ZIP containers.
//!
//! The archive is re-opened for every operation and never held open between
//! calls. Entry data offsets always come from the entry's local header; its
//! extra field length may differ from the central directory's.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use miniz_oxide::inflate::TINFLStatus;
use thiserror::Error;

use crate::storage::{Storage, read_full};

mod cdir;
mod inflate;


use cdir::{CdirWalker, read_u16_le, read_u32_le};

/// Local header signature (`PK\x03\x04`).
pub const ZIP_LOCAL_HEADER_MAGIC: u32 = 0x0403_4B50;
pub const ZIP_LOCAL_HEADER_BYTES: usize = 30;
/// DEFLATE sliding-window size; also the streaming output window.
pub const DEFLATE_WINDOW_BYTES: usize = 32 * 1024;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("not a readable ZIP archive: {0}")]
    InvalidArchive(&'static str),
    #[error("entry `{0}` not found")]
    EntryNotFound(String),
    #[error("invalid local header at offset {offset}")]
    InvalidLocalHeader { offset: u32 },
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),
    #[error("inflate failed with status {0:?}")]
    Decompress(TINFLStatus),
    #[error("compressed data ended before the stream was complete")]
    UnexpectedEof,
    #[error("entry inflated to {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionMethod {
    Stored,
    Deflated,
}

/// Central-directory metadata for one entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZipEntry {
    pub name: String,
    /// Raw method id; anything but stored/deflate is rejected at read time.
    pub method: u16,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

impl ZipEntry {
    pub fn compression(&self) -> Result<CompressionMethod, ArchiveError> {
        match self.method {
            METHOD_STORED => Ok(CompressionMethod::Stored),
            METHOD_DEFLATED => Ok(CompressionMethod::Deflated),
            other => Err(ArchiveError::UnsupportedCompression(other)),
        }
    }
}

/// Stateless handle to a ZIP container on storage.
#[derive(Clone, Debug)]
pub struct ArchiveReader<S> {
    storage: S,
    path: PathBuf,
}

impl<S: Storage> ArchiveReader<S> {
    pub fn new(storage: S, path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Looks up `name` (exact, case-sensitive match).
    ///
    /// A missing entry is `Ok(None)`, not an error.
    pub fn stat_entry(&self, name: &str) -> Result<Option<ZipEntry>, ArchiveError> {
        let mut file = self.storage.open_read(&self.path)?;
        find_entry(&mut file, name)
    }

    /// Entry names in central-directory order.
    pub fn entry_names(&self) -> Result<Vec<String>, ArchiveError> {
        let mut file = self.storage.open_read(&self.path)?;
        let mut walker = CdirWalker::new(&mut file)?;
        let mut names = Vec::with_capacity(walker.remaining());
        while let Some(record) = walker.next_record(&mut file)? {
            let name = record.read_name(&mut file)?;
            names.push(String::from_utf8_lossy(&name).into_owned());
        }
        Ok(names)
    }

    /// Inflates the whole entry into memory.
    ///
    /// With `append_terminator` the buffer carries one extra trailing `0` byte
    /// that is not part of the entry.
    pub fn read_entry_to_memory(
        &self,
        name: &str,
        append_terminator: bool,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut file = self.storage.open_read(&self.path)?;
        let entry = find_entry(&mut file, name)?
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_owned()))?;
        let data_offset = entry_data_offset(&mut file, &entry)?;
        let method = entry.compression()?;
        file.seek(SeekFrom::Start(data_offset))?;

        let inflated_len = entry.uncompressed_size as usize;
        let mut data = vec![0u8; inflated_len + usize::from(append_terminator)];
        match method {
            CompressionMethod::Stored => {
                let read_now = read_full(&mut file, &mut data[..inflated_len])?;
                if read_now < inflated_len {
                    return Err(ArchiveError::ShortRead {
                        expected: inflated_len as u64,
                        actual: read_now as u64,
                    });
                }
            }
            CompressionMethod::Deflated => {
                let mut deflated = vec![0u8; entry.compressed_size as usize];
                let read_now = read_full(&mut file, &mut deflated)?;
                if read_now < deflated.len() {
                    return Err(ArchiveError::ShortRead {
                        expected: deflated.len() as u64,
                        actual: read_now as u64,
                    });
                }
                inflate::inflate_one_shot(&deflated, &mut data[..inflated_len])?;
            }
        }

        debug!("read {name} into memory ({inflated_len} bytes)");
        Ok(data)
    }

    /// Streams the entry into `sink` without materializing it.
    ///
    /// Memory use is bounded by `chunk_size` plus the 32 KiB inflate window.
    /// On error the sink may already hold partial output; callers must discard
    /// it. Returns the number of bytes written.
    pub fn stream_entry_to<W: Write + ?Sized>(
        &self,
        name: &str,
        sink: &mut W,
        chunk_size: usize,
    ) -> Result<u64, ArchiveError> {
        let mut file = self.storage.open_read(&self.path)?;
        let entry = find_entry(&mut file, name)?
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_owned()))?;
        let data_offset = entry_data_offset(&mut file, &entry)?;
        let method = entry.compression()?;
        file.seek(SeekFrom::Start(data_offset))?;

        let chunk_size = chunk_size.max(1);
        match method {
            CompressionMethod::Stored => copy_stored(&mut file, &entry, sink, chunk_size),
            CompressionMethod::Deflated => {
                inflate::inflate_streaming(&mut file, &entry, sink, chunk_size)
            }
        }
    }
}

fn find_entry<R: Read + Seek>(file: &mut R, name: &str) -> Result<Option<ZipEntry>, ArchiveError> {
    let mut walker = CdirWalker::new(file)?;
    while let Some(record) = walker.next_record(file)? {
        if record.name_len != name.len() {
            continue;
        }
        if record.read_name(file)? == name.as_bytes() {
            return Ok(Some(record.into_entry(name.to_owned())));
        }
    }
    Ok(None)
}

/// Resolves the first data byte by re-reading the entry's local header.
fn entry_data_offset<R: Read + Seek>(file: &mut R, entry: &ZipEntry) -> Result<u64, ArchiveError> {
    let mut local = [0u8; ZIP_LOCAL_HEADER_BYTES];
    file.seek(SeekFrom::Start(u64::from(entry.local_header_offset)))?;
    let local_read = read_full(file, &mut local)?;
    if local_read < ZIP_LOCAL_HEADER_BYTES {
        return Err(ArchiveError::ShortRead {
            expected: ZIP_LOCAL_HEADER_BYTES as u64,
            actual: local_read as u64,
        });
    }
    if read_u32_le(&local, 0) != ZIP_LOCAL_HEADER_MAGIC {
        return Err(ArchiveError::InvalidLocalHeader {
            offset: entry.local_header_offset,
        });
    }

    let name_len = u64::from(read_u16_le(&local, 26));
    let extra_len = u64::from(read_u16_le(&local, 28));
    Ok(u64::from(entry.local_header_offset) + ZIP_LOCAL_HEADER_BYTES as u64 + name_len + extra_len)
}

fn copy_stored<R: Read, W: Write + ?Sized>(
    file: &mut R,
    entry: &ZipEntry,
    sink: &mut W,
    chunk_size: usize,
) -> Result<u64, ArchiveError> {
    let total = u64::from(entry.uncompressed_size);
    let mut buffer = vec![0u8; chunk_size];
    let mut remaining = total;
    while remaining > 0 {
        let want = (remaining as usize).min(buffer.len());
        let read_now = file.read(&mut buffer[..want])?;
        if read_now == 0 {
            return Err(ArchiveError::ShortRead {
                expected: total,
                actual: total - remaining,
            });
        }
        sink.write_all(&buffer[..read_now])?;
        remaining -= read_now as u64;
    }
    Ok(total)
}
