//! Plain-text layout: markup is stripped to words and wrapped into a fixed
//! grid of lines.

use std::io::{self, Read, Write};

use inkleaf_core::display::{Display, TextStyle};
use inkleaf_core::layout::{LayoutEngine, LayoutError, Page};
use log::debug;

mod entities;
mod markup;
mod wrap;


use markup::MarkupScanner;
use wrap::Paginator;

const READ_CHUNK_BYTES: usize = 1024;

/// One page of wrapped lines.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TextPage {
    lines: Vec<String>,
}

impl TextPage {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

fn read_u16(input: &mut dyn Read) -> io::Result<u16> {
    let mut bytes = [0u8; 2];
    input.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn length_u16(len: usize) -> io::Result<[u8; 2]> {
    u16::try_from(len)
        .map(u16::to_le_bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "page too large"))
}

/// Stored as a little-endian line count followed by length-prefixed UTF-8
/// lines.
impl Page for TextPage {
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&length_u16(self.lines.len())?)?;
        for line in &self.lines {
            out.write_all(&length_u16(line.len())?)?;
            out.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    fn deserialize(input: &mut dyn Read) -> io::Result<Self> {
        let count = read_u16(input)?;
        let mut lines = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let mut bytes = vec![0u8; usize::from(read_u16(input)?)];
            input.read_exact(&mut bytes)?;
            let line = String::from_utf8(bytes)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            lines.push(line);
        }
        Ok(Self { lines })
    }

    fn render(&self, display: &mut dyn Display) {
        let line_height = display.line_height(TextStyle::Regular);
        let mut y = 0u16;
        for line in &self.lines {
            display.draw_text(0, y, line, TextStyle::Regular);
            y = y.saturating_add(line_height);
        }
    }
}

/// Wraps chapter text to `columns` characters and `lines_per_page` lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextLayout {
    columns: u16,
    lines_per_page: u16,
}

impl TextLayout {
    pub fn new(columns: u16, lines_per_page: u16) -> Self {
        Self {
            columns: columns.max(1),
            lines_per_page: lines_per_page.max(1),
        }
    }

    /// Fills a character-cell display, keeping `reserved_rows` free at the
    /// bottom for the status line.
    pub fn for_display(display: &dyn Display, reserved_rows: u16) -> Self {
        let rows = display.page_height() / display.line_height(TextStyle::Regular).max(1);
        let columns = display.page_width() / display.text_width("M", TextStyle::Regular).max(1);
        Self::new(columns, rows.saturating_sub(reserved_rows))
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn lines_per_page(&self) -> u16 {
        self.lines_per_page
    }
}

impl LayoutEngine for TextLayout {
    type Page = TextPage;

    fn layout(
        &mut self,
        markup: &mut dyn Read,
        on_page: &mut dyn FnMut(TextPage) -> io::Result<()>,
    ) -> Result<(), LayoutError> {
        let mut scanner = MarkupScanner::new();
        let mut pages = 0usize;
        let mut paginator = Paginator::new(
            usize::from(self.columns),
            usize::from(self.lines_per_page),
            |page: TextPage| {
                pages += 1;
                on_page(page)
            },
        );

        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            let read_now = match markup.read(&mut chunk) {
                Ok(0) => break,
                Ok(read_now) => read_now,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            scanner.feed(&chunk[..read_now], &mut paginator)?;
        }
        scanner.finish(&mut paginator)?;
        paginator.finish()?;

        debug!(
            "laid out {pages} pages at {}x{}",
            self.columns, self.lines_per_page
        );
        Ok(())
    }
}
