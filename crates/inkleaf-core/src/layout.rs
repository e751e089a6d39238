//! Pagination seam between chapter markup and cached pages.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::display::Display;

/// One laid-out page that can be persisted and drawn.
pub trait Page: Sized {
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()>;

    fn deserialize(input: &mut dyn Read) -> io::Result<Self>;

    fn render(&self, display: &mut dyn Display);
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed markup: {0}")]
    Markup(String),
}

/// Splits chapter markup into pages.
///
/// Pages are handed to `on_page` in order as soon as each one is complete, so
/// the caller can persist them without holding the whole chapter. An error
/// from `on_page` aborts layout and is returned as [`LayoutError::Io`].
pub trait LayoutEngine {
    type Page: Page;

    fn layout(
        &mut self,
        markup: &mut dyn Read,
        on_page: &mut dyn FnMut(Self::Page) -> io::Result<()>,
    ) -> Result<(), LayoutError>;
}
