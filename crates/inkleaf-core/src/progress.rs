//! Durable "where the reader left off" record.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::storage::{Storage, read_full};

pub const PROGRESS_FILE_NAME: &str = "progress.bin";
const PROGRESS_RECORD_BYTES: usize = 4;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReadingPosition {
    pub chapter_index: u16,
    pub page_index: u16,
}

impl ReadingPosition {
    pub const fn new(chapter_index: u16, page_index: u16) -> Self {
        Self {
            chapter_index,
            page_index,
        }
    }

    pub fn to_bytes(self) -> [u8; PROGRESS_RECORD_BYTES] {
        let chapter = self.chapter_index.to_le_bytes();
        let page = self.page_index.to_le_bytes();
        [chapter[0], chapter[1], page[0], page[1]]
    }

    pub fn from_bytes(raw: [u8; PROGRESS_RECORD_BYTES]) -> Self {
        Self {
            chapter_index: u16::from_le_bytes([raw[0], raw[1]]),
            page_index: u16::from_le_bytes([raw[2], raw[3]]),
        }
    }
}

/// `progress.bin` inside a document's cache root.
#[derive(Clone, Debug)]
pub struct ProgressFile<S> {
    storage: S,
    path: PathBuf,
}

impl<S: Storage> ProgressFile<S> {
    pub fn new(storage: S, cache_dir: &Path) -> Self {
        Self {
            storage,
            path: cache_dir.join(PROGRESS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved position. A missing or truncated record is `None`.
    pub fn load(&self) -> io::Result<Option<ReadingPosition>> {
        let mut file = match self.storage.open_read(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut raw = [0u8; PROGRESS_RECORD_BYTES];
        let read_now = read_full(&mut file, &mut raw)?;
        if read_now < PROGRESS_RECORD_BYTES {
            warn!("ignoring truncated progress record ({read_now} bytes)");
            return Ok(None);
        }

        let position = ReadingPosition::from_bytes(raw);
        debug!(
            "resuming at chapter {} page {}",
            position.chapter_index, position.page_index
        );
        Ok(Some(position))
    }

    pub fn save(&self, position: ReadingPosition) -> io::Result<()> {
        let mut file = self.storage.create(&self.path)?;
        file.write_all(&position.to_bytes())?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn record_is_chapter_then_page_little_endian() {
        let position = ReadingPosition::new(0x0102, 0x0A0B);
        assert_eq!(position.to_bytes(), [0x02, 0x01, 0x0B, 0x0A]);
    }

    #[test]
    fn missing_or_truncated_record_loads_as_none() {
        let storage = MemStorage::new();
        let progress = ProgressFile::new(storage.clone(), Path::new("/book"));
        assert_eq!(progress.load().unwrap(), None);

        storage.write_file("/book/progress.bin", &[1, 0]);
        assert_eq!(progress.load().unwrap(), None);
    }

    #[test]
    fn saved_position_loads_back() {
        let storage = MemStorage::new();
        storage.create_dir_all(Path::new("/book")).unwrap();
        let progress = ProgressFile::new(storage.clone(), Path::new("/book"));

        progress.save(ReadingPosition::new(3, 17)).unwrap();

        assert_eq!(
            storage.file("/book/progress.bin"),
            Some(vec![3, 0, 17, 0])
        );
        assert_eq!(progress.load().unwrap(), Some(ReadingPosition::new(3, 17)));
    }
}
