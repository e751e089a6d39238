//! Reader tuning knobs.

/// Runtime configuration for the chapter cache and render worker.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReaderConfig {
    skip_chapter_hold_ms: u32,
    pages_per_full_refresh: u16,
    poll_interval_ms: u32,
    stream_chunk_bytes: usize,
    section_format_version: u8,
    worker_stack_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            skip_chapter_hold_ms: 700,
            pages_per_full_refresh: 20,
            poll_interval_ms: 10,
            stream_chunk_bytes: 1024,
            section_format_version: 2,
            worker_stack_bytes: 256 * 1024,
        }
    }
}

impl ReaderConfig {
    /// Hold time after which a page button skips a whole chapter.
    pub const fn skip_chapter_hold_ms(&self) -> u32 {
        self.skip_chapter_hold_ms
    }

    /// Partial refreshes allowed between two full-screen refreshes.
    pub const fn pages_per_full_refresh(&self) -> u16 {
        self.pages_per_full_refresh
    }

    pub const fn poll_interval_ms(&self) -> u32 {
        self.poll_interval_ms
    }

    pub const fn stream_chunk_bytes(&self) -> usize {
        self.stream_chunk_bytes
    }

    /// Format tag written into every chapter's metadata record.
    pub const fn section_format_version(&self) -> u8 {
        self.section_format_version
    }

    pub const fn worker_stack_bytes(&self) -> usize {
        self.worker_stack_bytes
    }

    pub const fn with_skip_chapter_hold_ms(mut self, skip_chapter_hold_ms: u32) -> Self {
        self.skip_chapter_hold_ms = skip_chapter_hold_ms;
        self
    }

    pub const fn with_pages_per_full_refresh(mut self, pages_per_full_refresh: u16) -> Self {
        self.pages_per_full_refresh = if pages_per_full_refresh == 0 {
            1
        } else {
            pages_per_full_refresh
        };
        self
    }

    pub const fn with_poll_interval_ms(mut self, poll_interval_ms: u32) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub const fn with_stream_chunk_bytes(mut self, stream_chunk_bytes: usize) -> Self {
        self.stream_chunk_bytes = if stream_chunk_bytes == 0 {
            1
        } else {
            stream_chunk_bytes
        };
        self
    }

    pub const fn with_section_format_version(mut self, section_format_version: u8) -> Self {
        self.section_format_version = section_format_version;
        self
    }

    pub const fn with_worker_stack_bytes(mut self, worker_stack_bytes: usize) -> Self {
        self.worker_stack_bytes = worker_stack_bytes;
        self
    }
}
