//! Background render worker and the input-side navigation that feeds it.
//!
//! One lock guards the active chapter cache and the reading position. The
//! worker holds it for a whole render pass, including any cache rebuild, and
//! the input side takes it before replacing or dropping the cache. Requests
//! are a single atomic flag, so a burst of input collapses into one pass.
//! A second flag mirrors whether a cache is open, so a plain page turn
//! during a rebuild returns without waiting for the lock.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::book::Book;
use crate::config::ReaderConfig;
use crate::display::{Display, RefreshMode, draw_indexing_popup};
use crate::input::{InputEvent, InputProvider};
use crate::layout::LayoutEngine;
use crate::power::BatteryGauge;
use crate::progress::{ProgressFile, ReadingPosition};
use crate::section::{PageRender, Section, SectionError};
use crate::storage::Storage;

mod status;


use status::{StatusLine, draw_status_line};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error("render I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("document has no chapters")]
    EmptySpine,
    #[error("chapter {0} is not in the reading order")]
    ChapterOutOfRange(u16),
}

/// Page to show once the target chapter's cache is open.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PageTarget {
    Page(u16),
    /// Resolved against the page count after the cache is loaded or built.
    LastPage,
}

struct RenderState<S> {
    section: Option<Section<S>>,
    chapter_index: u16,
    next_page: PageTarget,
}

/// Result of feeding one input event to the scheduler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputOutcome {
    /// Position changed; a render was requested.
    Handled,
    /// Nothing to do, e.g. paging past the end of the book.
    Ignored,
    /// The reader should be closed.
    Exit,
}

/// Device side of rendering: everything only the worker touches.
#[derive(Debug)]
pub struct RenderWorker<L, D, B> {
    layout: L,
    display: D,
    battery: B,
    pages_until_full_refresh: u16,
    full_refresh_every: u16,
}

impl<L, D, B> RenderWorker<L, D, B>
where
    L: LayoutEngine,
    D: Display,
    B: BatteryGauge,
{
    pub fn new(layout: L, display: D, battery: B, config: &ReaderConfig) -> Self {
        Self {
            layout,
            display,
            battery,
            // The first pass after opening always gets a full refresh.
            pages_until_full_refresh: 1,
            full_refresh_every: config.pages_per_full_refresh().max(1),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn flush(&mut self) {
        if self.pages_until_full_refresh <= 1 {
            self.display.flush(RefreshMode::Full);
            self.pages_until_full_refresh = self.full_refresh_every;
        } else {
            self.display.flush(RefreshMode::Partial);
            self.pages_until_full_refresh -= 1;
        }
    }
}

struct Shared<S> {
    book: Book<S>,
    progress: ProgressFile<S>,
    config: ReaderConfig,
    state: Mutex<RenderState<S>>,
    update_required: AtomicBool,
    shutting_down: AtomicBool,
    /// Mirrors `state.section.is_some()`; only written with the lock held.
    section_open: AtomicBool,
}

fn chapter_title(entry_name: &str) -> &str {
    let file = entry_name.rsplit('/').next().unwrap_or(entry_name);
    file.rsplit_once('.').map_or(file, |(stem, _)| stem)
}

impl<S: Storage> Shared<S> {
    fn lock_state(&self) -> MutexGuard<'_, RenderState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drop_section(&self, state: &mut RenderState<S>) {
        state.section = None;
        self.section_open.store(false, Ordering::Release);
    }

    fn chapter_count(&self) -> u16 {
        self.book.spine_len().min(usize::from(u16::MAX)) as u16
    }

    fn run_pending<L, D, B>(&self, worker: &mut RenderWorker<L, D, B>) -> Result<bool, RenderError>
    where
        L: LayoutEngine,
        D: Display,
        B: BatteryGauge,
    {
        if !self.update_required.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        let mut state = self.lock_state();
        if self.shutting_down.load(Ordering::Acquire) {
            return Ok(false);
        }
        self.render_pass(&mut state, worker)?;
        Ok(true)
    }

    fn open_section<L, D, B>(
        &self,
        chapter_index: u16,
        next_page: PageTarget,
        worker: &mut RenderWorker<L, D, B>,
    ) -> Result<Section<S>, RenderError>
    where
        L: LayoutEngine,
        D: Display,
        B: BatteryGauge,
    {
        let entry_name = self
            .book
            .spine_item(usize::from(chapter_index))
            .ok_or(RenderError::ChapterOutOfRange(chapter_index))?;
        debug!("opening chapter {chapter_index} ({entry_name})");

        let mut section = Section::new(
            self.book.storage().clone(),
            self.book.cache_dir(),
            chapter_index,
            self.config.section_format_version(),
        );
        let RenderWorker {
            layout, display, ..
        } = worker;
        section.ensure_valid(
            self.book.archive(),
            entry_name,
            layout,
            self.config.stream_chunk_bytes(),
            || draw_indexing_popup(display),
        )?;

        let page = match next_page {
            PageTarget::Page(page) => page,
            PageTarget::LastPage => section.page_count().saturating_sub(1),
        };
        section.set_current_page(page);
        Ok(section)
    }

    fn render_pass<L, D, B>(
        &self,
        state: &mut RenderState<S>,
        worker: &mut RenderWorker<L, D, B>,
    ) -> Result<PageRender, RenderError>
    where
        L: LayoutEngine,
        D: Display,
        B: BatteryGauge,
    {
        let chapter_count = self.chapter_count();
        if chapter_count == 0 {
            return Err(RenderError::EmptySpine);
        }
        if state.chapter_index >= chapter_count {
            warn!(
                "chapter {} out of range ({chapter_count} chapters), restarting at 0",
                state.chapter_index
            );
            state.chapter_index = 0;
            self.drop_section(state);
        }

        let section = match state.section.take() {
            Some(section) => section,
            // A failed open leaves no section, so the next pass retries.
            None => self.open_section(state.chapter_index, state.next_page, worker)?,
        };
        let section = state.section.insert(section);
        self.section_open.store(true, Ordering::Release);

        worker.display.clear_screen();
        let page_index = section.current_page();
        let rendered = match section.render_page::<L::Page>(page_index, &mut worker.display) {
            Ok(rendered) => rendered,
            Err(err) => {
                // The record is only trusted as a whole: drop it and rebuild.
                warn!(
                    "chapter {} page {page_index} unreadable, rebuilding: {err}",
                    state.chapter_index
                );
                state.next_page = PageTarget::Page(page_index);
                if let Err(clear_err) = section.clear() {
                    warn!("cannot clear chapter {}: {clear_err}", state.chapter_index);
                }
                self.drop_section(state);
                self.update_required.store(true, Ordering::Release);
                return Err(err.into());
            }
        };

        let entry_name = self
            .book
            .spine_item(usize::from(state.chapter_index))
            .unwrap_or_default();
        let status = StatusLine {
            page_index: section.current_page(),
            page_count: section.page_count(),
            battery_percent: worker.battery.percentage(),
            title: chapter_title(entry_name),
        };
        draw_status_line(&mut worker.display, status);

        let position = ReadingPosition::new(state.chapter_index, section.current_page());
        if let Err(err) = self.progress.save(position) {
            warn!("cannot save reading position: {err}");
        }
        worker.flush();

        debug!(
            "rendered chapter {} page {} ({rendered:?})",
            position.chapter_index, position.page_index
        );
        Ok(rendered)
    }
}

/// Owns the shared render state and, once spawned, the worker thread.
pub struct RenderScheduler<S: Storage> {
    shared: Arc<Shared<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Storage> RenderScheduler<S> {
    /// Prepares the cache root and resumes from the saved reading position.
    pub fn new(book: Book<S>, config: ReaderConfig) -> Result<Self, RenderError> {
        book.setup_cache_dir()?;
        let progress = ProgressFile::new(book.storage().clone(), book.cache_dir());
        let position = match progress.load() {
            Ok(position) => position.unwrap_or_default(),
            Err(err) => {
                warn!("cannot read reading position, starting over: {err}");
                ReadingPosition::default()
            }
        };
        info!(
            "opening at chapter {} page {}",
            position.chapter_index, position.page_index
        );

        Ok(Self {
            shared: Arc::new(Shared {
                book,
                progress,
                config,
                state: Mutex::new(RenderState {
                    section: None,
                    chapter_index: position.chapter_index,
                    next_page: PageTarget::Page(position.page_index),
                }),
                update_required: AtomicBool::new(true),
                shutting_down: AtomicBool::new(false),
                section_open: AtomicBool::new(false),
            }),
            worker: None,
        })
    }

    pub fn book(&self) -> &Book<S> {
        &self.shared.book
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.shared.config
    }

    /// Current chapter and, if its cache is open, the page on screen.
    pub fn position(&self) -> (u16, Option<u16>) {
        let state = self.shared.lock_state();
        (
            state.chapter_index,
            state.section.as_ref().map(Section::current_page),
        )
    }

    /// Page count of the open chapter cache.
    pub fn page_count(&self) -> Option<u16> {
        self.shared
            .lock_state()
            .section
            .as_ref()
            .map(Section::page_count)
    }

    pub fn render_pending(&self) -> bool {
        self.shared.update_required.load(Ordering::Acquire)
    }

    /// Marks the screen stale and wakes the worker.
    pub fn request_render(&self) {
        self.shared.update_required.store(true, Ordering::Release);
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
    }

    /// Runs one render pass on the calling thread if one is pending.
    ///
    /// Returns `Ok(true)` if a pass ran. Used by the spawned worker and by
    /// single-threaded callers that drive rendering themselves.
    pub fn run_pending<L, D, B>(&self, worker: &mut RenderWorker<L, D, B>) -> Result<bool, RenderError>
    where
        L: LayoutEngine,
        D: Display,
        B: BatteryGauge,
    {
        self.shared.run_pending(worker)
    }

    pub fn handle_input(&self, event: InputEvent) -> InputOutcome {
        let skip_after = self.shared.config.skip_chapter_hold_ms();
        let outcome = match event {
            InputEvent::Back => return InputOutcome::Exit,
            InputEvent::Next { held_ms } if held_ms > skip_after => self.skip_chapter(true),
            InputEvent::Previous { held_ms } if held_ms > skip_after => self.skip_chapter(false),
            InputEvent::Next { .. } => self.next_page(),
            InputEvent::Previous { .. } => self.previous_page(),
        };
        if outcome == InputOutcome::Handled {
            self.request_render();
        }
        outcome
    }

    /// Drains `input`, stopping early on [`InputOutcome::Exit`].
    pub fn process_inputs<I: InputProvider>(&self, input: &mut I) -> Result<InputOutcome, I::Error> {
        let mut outcome = InputOutcome::Ignored;
        while let Some(event) = input.poll_event()? {
            match self.handle_input(event) {
                InputOutcome::Exit => return Ok(InputOutcome::Exit),
                InputOutcome::Handled => outcome = InputOutcome::Handled,
                InputOutcome::Ignored => {}
            }
        }
        Ok(outcome)
    }

    fn next_page(&self) -> InputOutcome {
        // With no cache open there is no page to move; only ask for a pass.
        if !self.shared.section_open.load(Ordering::Acquire) {
            return InputOutcome::Handled;
        }
        let chapter_count = self.shared.chapter_count();
        let mut state = self.shared.lock_state();
        let chapter_index = state.chapter_index;
        let Some(section) = state.section.as_mut() else {
            return InputOutcome::Handled;
        };

        if u32::from(section.current_page()) + 1 < u32::from(section.page_count()) {
            section.set_current_page(section.current_page() + 1);
        } else if chapter_index + 1 < chapter_count {
            self.shared.drop_section(&mut state);
            state.chapter_index = chapter_index + 1;
            state.next_page = PageTarget::Page(0);
        } else {
            debug!("already at the end of the book");
            return InputOutcome::Ignored;
        }
        InputOutcome::Handled
    }

    fn previous_page(&self) -> InputOutcome {
        if !self.shared.section_open.load(Ordering::Acquire) {
            return InputOutcome::Handled;
        }
        let mut state = self.shared.lock_state();
        let chapter_index = state.chapter_index;
        let Some(section) = state.section.as_mut() else {
            return InputOutcome::Handled;
        };

        let current = section.current_page();
        let page_count = section.page_count();
        if current > 0 && page_count > 0 {
            section.set_current_page(current.min(page_count) - 1);
        } else if chapter_index > 0 {
            self.shared.drop_section(&mut state);
            state.chapter_index = chapter_index - 1;
            state.next_page = PageTarget::LastPage;
        } else {
            debug!("already at the start of the book");
            return InputOutcome::Ignored;
        }
        InputOutcome::Handled
    }

    fn skip_chapter(&self, forward: bool) -> InputOutcome {
        let chapter_count = self.shared.chapter_count();
        // Blocks until any in-flight render (or build) has finished.
        let mut state = self.shared.lock_state();
        let target = if forward {
            state.chapter_index.checked_add(1).filter(|next| *next < chapter_count)
        } else {
            state.chapter_index.checked_sub(1)
        };
        let Some(target) = target else {
            return InputOutcome::Ignored;
        };

        debug!("skipping from chapter {} to {target}", state.chapter_index);
        self.shared.drop_section(&mut state);
        state.chapter_index = target;
        state.next_page = PageTarget::Page(0);
        InputOutcome::Handled
    }

    /// Stops the worker after any in-flight render and releases the cache.
    pub fn shutdown(&mut self) {
        {
            let _state = self.shared.lock_state();
            self.shared.shutting_down.store(true, Ordering::Release);
        }
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                warn!("render worker panicked");
            }
        }
        let mut state = self.shared.lock_state();
        self.shared.drop_section(&mut state);
    }
}

impl<S> RenderScheduler<S>
where
    S: Storage + Send + Sync + 'static,
{
    /// Moves `worker` onto a dedicated thread that polls for pending renders.
    pub fn spawn<L, D, B>(&mut self, mut worker: RenderWorker<L, D, B>) -> io::Result<()>
    where
        L: LayoutEngine + Send + 'static,
        D: Display + Send + 'static,
        B: BatteryGauge + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "render worker already running",
            ));
        }

        let shared = Arc::clone(&self.shared);
        let poll_interval = Duration::from_millis(u64::from(self.shared.config.poll_interval_ms()));
        let handle = thread::Builder::new()
            .name("render-worker".into())
            .stack_size(self.shared.config.worker_stack_bytes())
            .spawn(move || {
                info!("render worker started");
                while !shared.shutting_down.load(Ordering::Acquire) {
                    if let Err(err) = shared.run_pending(&mut worker) {
                        warn!("render pass failed: {err}");
                    }
                    thread::park_timeout(poll_interval);
                }
                info!("render worker stopped");
            })?;
        self.worker = Some(handle);
        Ok(())
    }
}

impl<S: Storage> Drop for RenderScheduler<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
