//! Per-chapter page cache.
//!
//! A chapter lives in its own directory holding `page_{n}.bin` files and a
//! `section.bin` record (format version byte, then the page count as a
//! little-endian `u32`). The record is written last, so its presence with the
//! expected version means every page file is in place. A stale or missing
//! record always leads to a full rebuild; pages are never repaired one by one.

use core::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveReader};
use crate::display::{Display, Placeholder, draw_placeholder};
use crate::layout::{LayoutEngine, LayoutError, Page};
use crate::storage::{Storage, ignore_not_found, read_full};

#[cfg(test)]
mod tests;

pub const SECTIONS_DIR_NAME: &str = "sections";
pub const SECTION_FILE_NAME: &str = "section.bin";
const SECTION_TMP_FILE_NAME: &str = "section.bin.tmp";
const SECTION_RECORD_BYTES: usize = 5;
const FILE_NAME_BYTES: usize = 24;

type FileName = heapless::String<FILE_NAME_BYTES>;

#[derive(Debug, Error)]
pub enum SectionError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("section I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("chapter needs more than {} pages", u16::MAX)]
    TooManyPages,
}

/// What [`Section::render_page`] put on the display.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageRender {
    Rendered,
    EmptyChapter,
    OutOfBounds,
}

fn file_name(args: core::fmt::Arguments<'_>) -> io::Result<FileName> {
    let mut name = FileName::new();
    name.write_fmt(args)
        .map_err(|_| io::Error::other("cache file name too long"))?;
    Ok(name)
}

fn page_file_name(index: u16) -> io::Result<FileName> {
    file_name(format_args!("page_{index}.bin"))
}

fn scratch_file_name(spine_index: u16) -> io::Result<FileName> {
    file_name(format_args!(".tmp_{spine_index}.html"))
}

/// Page cache of one chapter (spine item) of one document.
#[derive(Debug)]
pub struct Section<S> {
    storage: S,
    spine_index: u16,
    book_cache_dir: PathBuf,
    cache_dir: PathBuf,
    format_version: u8,
    page_count: u16,
    current_page: u16,
}

impl<S: Storage> Section<S> {
    pub fn new(storage: S, book_cache_dir: &Path, spine_index: u16, format_version: u8) -> Self {
        Self {
            storage,
            spine_index,
            book_cache_dir: book_cache_dir.to_path_buf(),
            cache_dir: book_cache_dir
                .join(SECTIONS_DIR_NAME)
                .join(spine_index.to_string()),
            format_version,
            page_count: 0,
            current_page: 0,
        }
    }

    pub fn spine_index(&self) -> u16 {
        self.spine_index
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn page_count(&self) -> u16 {
        self.page_count
    }

    pub fn current_page(&self) -> u16 {
        self.current_page
    }

    pub fn set_current_page(&mut self, page: u16) {
        self.current_page = page;
    }

    fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join(SECTION_FILE_NAME)
    }

    fn page_path(&self, index: u16) -> io::Result<PathBuf> {
        Ok(self.cache_dir.join(page_file_name(index)?.as_str()))
    }

    fn scratch_path(&self) -> io::Result<PathBuf> {
        Ok(self
            .book_cache_dir
            .join(scratch_file_name(self.spine_index)?.as_str()))
    }

    /// Reads `section.bin`. Returns `true` if it is present, current and
    /// exactly one record long; any other record is deleted.
    pub fn load_metadata(&mut self) -> bool {
        let path = self.metadata_path();
        let mut file = match self.storage.open_read(&path) {
            Ok(file) => file,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("section {}: cannot open metadata: {err}", self.spine_index);
                }
                return false;
            }
        };

        let mut record = [0u8; SECTION_RECORD_BYTES];
        let read_now = match read_full(&mut file, &mut record) {
            Ok(read_now) => read_now,
            Err(err) => {
                warn!("section {}: cannot read metadata: {err}", self.spine_index);
                return false;
            }
        };
        let mut trailing = [0u8; 1];
        let oversized = read_now == SECTION_RECORD_BYTES
            && matches!(read_full(&mut file, &mut trailing), Ok(extra) if extra > 0);
        drop(file);

        let page_count = u32::from_le_bytes([record[1], record[2], record[3], record[4]]);
        let reason = if read_now == 0 {
            Some("empty record")
        } else if record[0] != self.format_version {
            Some("format version changed")
        } else if read_now < SECTION_RECORD_BYTES {
            Some("truncated record")
        } else if oversized {
            Some("trailing bytes after record")
        } else if page_count > u32::from(u16::MAX) {
            Some("page count out of range")
        } else {
            None
        };

        if let Some(reason) = reason {
            warn!(
                "section {}: discarding metadata ({reason}, version {} expected {})",
                self.spine_index, record[0], self.format_version
            );
            if let Err(err) = ignore_not_found(self.storage.remove_file(&path)) {
                warn!("section {}: cannot delete stale metadata: {err}", self.spine_index);
            }
            return false;
        }

        self.page_count = page_count as u16;
        debug!(
            "section {}: cache hit ({} pages)",
            self.spine_index, self.page_count
        );
        true
    }

    /// Loads the cached chapter, rebuilding it when the record is missing or
    /// stale. `on_rebuild` runs right before a rebuild starts.
    ///
    /// Returns `true` if a rebuild happened.
    pub fn ensure_valid<L>(
        &mut self,
        archive: &ArchiveReader<S>,
        entry_name: &str,
        engine: &mut L,
        chunk_size: usize,
        on_rebuild: impl FnOnce(),
    ) -> Result<bool, SectionError>
    where
        L: LayoutEngine + ?Sized,
    {
        if self.load_metadata() {
            return Ok(false);
        }
        on_rebuild();
        self.build(archive, entry_name, engine, chunk_size)?;
        Ok(true)
    }

    /// Rebuilds the chapter from `entry_name` and returns its page count.
    ///
    /// The entry is first streamed into a scratch file so the inflate buffers
    /// are gone before layout starts. Every page is written as soon as the
    /// engine produces it. On failure no metadata record exists afterwards.
    pub fn build<L>(
        &mut self,
        archive: &ArchiveReader<S>,
        entry_name: &str,
        engine: &mut L,
        chunk_size: usize,
    ) -> Result<u16, SectionError>
    where
        L: LayoutEngine + ?Sized,
    {
        info!("section {}: building from {entry_name}", self.spine_index);
        self.clear()?;
        self.storage.create_dir_all(&self.cache_dir)?;

        let scratch_path = self.scratch_path()?;
        let result = self.write_pages(archive, entry_name, engine, chunk_size, &scratch_path);
        if let Err(err) = ignore_not_found(self.storage.remove_file(&scratch_path)) {
            warn!(
                "section {}: cannot delete {}: {err}",
                self.spine_index,
                scratch_path.display()
            );
        }
        let page_count = result?;

        self.write_metadata(page_count)?;
        self.page_count = page_count;
        info!("section {}: cached {page_count} pages", self.spine_index);
        Ok(page_count)
    }

    fn write_pages<L>(
        &self,
        archive: &ArchiveReader<S>,
        entry_name: &str,
        engine: &mut L,
        chunk_size: usize,
        scratch_path: &Path,
    ) -> Result<u16, SectionError>
    where
        L: LayoutEngine + ?Sized,
    {
        {
            let mut scratch = self.storage.create(scratch_path)?;
            archive.stream_entry_to(entry_name, &mut scratch, chunk_size)?;
            scratch.flush()?;
        }

        let mut markup = self.storage.open_read(scratch_path)?;
        let mut page_count = 0u16;
        let mut overflowed = false;
        let outcome = {
            let mut on_page = |page: L::Page| -> io::Result<()> {
                if page_count == u16::MAX {
                    overflowed = true;
                    return Err(io::Error::other("page limit reached"));
                }
                let mut out = self.storage.create(&self.page_path(page_count)?)?;
                page.serialize(&mut out)?;
                out.flush()?;
                page_count += 1;
                Ok(())
            };
            engine.layout(&mut markup, &mut on_page)
        };

        match outcome {
            Ok(()) => Ok(page_count),
            Err(_) if overflowed => Err(SectionError::TooManyPages),
            Err(err) => Err(err.into()),
        }
    }

    fn write_metadata(&self, page_count: u16) -> io::Result<()> {
        let mut record = [0u8; SECTION_RECORD_BYTES];
        record[0] = self.format_version;
        record[1..].copy_from_slice(&u32::from(page_count).to_le_bytes());

        let tmp_path = self.cache_dir.join(SECTION_TMP_FILE_NAME);
        {
            let mut out = self.storage.create(&tmp_path)?;
            out.write_all(&record)?;
            out.flush()?;
        }
        self.storage.rename(&tmp_path, &self.metadata_path())
    }

    /// Draws page `index`, or a placeholder when there is nothing to draw.
    ///
    /// An empty chapter is answered without touching storage.
    pub fn render_page<P: Page>(
        &self,
        index: u16,
        display: &mut dyn Display,
    ) -> Result<PageRender, SectionError> {
        if self.page_count == 0 {
            draw_placeholder(display, Placeholder::EmptyChapter);
            return Ok(PageRender::EmptyChapter);
        }
        if index >= self.page_count {
            warn!(
                "section {}: page {index} out of bounds ({} pages)",
                self.spine_index, self.page_count
            );
            draw_placeholder(display, Placeholder::OutOfBounds);
            return Ok(PageRender::OutOfBounds);
        }

        let page = {
            let mut file = self.storage.open_read(&self.page_path(index)?)?;
            P::deserialize(&mut file)?
        };
        page.render(display);
        Ok(PageRender::Rendered)
    }

    /// Removes the chapter directory and everything in it.
    pub fn clear(&mut self) -> io::Result<()> {
        self.page_count = 0;
        ignore_not_found(self.storage.remove_dir_all(&self.cache_dir))?;
        debug!("section {}: cache cleared", self.spine_index);
        Ok(())
    }
}
