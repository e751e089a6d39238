use std::io::{Read, Seek, SeekFrom};

use super::{ArchiveError, ZipEntry};
use crate::storage::read_full;

const ZIP_EOCD_SIG: [u8; 4] = [b'P', b'K', 0x05, 0x06];
const ZIP_CDIR_SIG: [u8; 4] = [b'P', b'K', 0x01, 0x02];
const ZIP_EOCD_MIN_BYTES: usize = 22;
const ZIP_CDIR_HEADER_BYTES: usize = 46;
/// EOCD record plus the largest possible archive comment.
const ZIP_EOCD_SEARCH_WINDOW: usize = ZIP_EOCD_MIN_BYTES + u16::MAX as usize;

pub(super) fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(super) fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Locates the central directory: `(offset, entry count)`.
fn cdir_info<R: Read + Seek>(file: &mut R) -> Result<(u64, usize), ArchiveError> {
    let file_size = file.seek(SeekFrom::End(0))?;
    if file_size < ZIP_EOCD_MIN_BYTES as u64 {
        return Err(ArchiveError::InvalidArchive("file too small"));
    }

    let tail_len = (file_size as usize).min(ZIP_EOCD_SEARCH_WINDOW);
    let tail_start = file_size - tail_len as u64;
    let mut tail = vec![0u8; tail_len];
    file.seek(SeekFrom::Start(tail_start))?;
    let tail_read = read_full(file, &mut tail)?;
    if tail_read < ZIP_EOCD_MIN_BYTES {
        return Err(ArchiveError::InvalidArchive("file too small"));
    }

    let Some(eocd_pos) = (0..=tail_read - ZIP_EOCD_MIN_BYTES)
        .rev()
        .find(|idx| tail[*idx..].starts_with(&ZIP_EOCD_SIG))
    else {
        return Err(ArchiveError::InvalidArchive("end of central directory not found"));
    };

    let cdir_offset = u64::from(read_u32_le(&tail, eocd_pos + 16));
    let cdir_entries = read_u16_le(&tail, eocd_pos + 10) as usize;
    if cdir_offset >= file_size {
        return Err(ArchiveError::InvalidArchive("central directory offset out of range"));
    }

    Ok((cdir_offset, cdir_entries))
}

/// One central-directory header with its name still on storage.
#[derive(Clone, Copy, Debug)]
pub(super) struct CdirRecord {
    name_offset: u64,
    pub(super) name_len: usize,
    method: u16,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

impl CdirRecord {
    pub(super) fn read_name<R: Read + Seek>(&self, file: &mut R) -> Result<Vec<u8>, ArchiveError> {
        let mut name = vec![0u8; self.name_len];
        file.seek(SeekFrom::Start(self.name_offset))?;
        let name_read = read_full(file, &mut name)?;
        if name_read < self.name_len {
            return Err(ArchiveError::InvalidArchive("truncated central directory name"));
        }
        Ok(name)
    }

    pub(super) fn into_entry(self, name: String) -> ZipEntry {
        ZipEntry {
            name,
            method: self.method,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            local_header_offset: self.local_header_offset,
        }
    }
}

/// Walks central-directory headers in stored order.
pub(super) struct CdirWalker {
    cursor: u64,
    remaining: usize,
}

impl CdirWalker {
    pub(super) fn new<R: Read + Seek>(file: &mut R) -> Result<Self, ArchiveError> {
        let (cursor, remaining) = cdir_info(file)?;
        Ok(Self { cursor, remaining })
    }

    pub(super) fn remaining(&self) -> usize {
        self.remaining
    }

    pub(super) fn next_record<R: Read + Seek>(
        &mut self,
        file: &mut R,
    ) -> Result<Option<CdirRecord>, ArchiveError> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let mut header = [0u8; ZIP_CDIR_HEADER_BYTES];
        file.seek(SeekFrom::Start(self.cursor))?;
        let header_read = read_full(file, &mut header)?;
        if header_read < ZIP_CDIR_HEADER_BYTES || !header.starts_with(&ZIP_CDIR_SIG) {
            return Err(ArchiveError::InvalidArchive("bad central directory header"));
        }

        let name_len = read_u16_le(&header, 28) as usize;
        let extra_len = read_u16_le(&header, 30) as u64;
        let comment_len = read_u16_le(&header, 32) as u64;
        let record = CdirRecord {
            name_offset: self.cursor + ZIP_CDIR_HEADER_BYTES as u64,
            name_len,
            method: read_u16_le(&header, 10),
            compressed_size: read_u32_le(&header, 20),
            uncompressed_size: read_u32_le(&header, 24),
            local_header_offset: read_u32_le(&header, 42),
        };

        self.cursor = record.name_offset + name_len as u64 + extra_len + comment_len;
        self.remaining -= 1;
        Ok(Some(record))
    }
}
