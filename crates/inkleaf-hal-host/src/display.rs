//! Character-grid stand-in for the e-ink panel.
//!
//! One cell is one character, every text style is one row tall, and a flush
//! repaints the terminal with ANSI cursor moves.

use std::io::{self, Write};

use inkleaf_core::display::{Display, RefreshMode, TextStyle};
use log::warn;

const BLANK: char = ' ';
const INK: char = '#';
const CLEAR_SCREEN: &str = "\x1b[2J";

#[derive(Debug)]
pub struct ConsoleDisplay<W> {
    columns: u16,
    rows: u16,
    cells: Vec<char>,
    out: W,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout(columns: u16, rows: u16) -> Self {
        Self::new(columns, rows, io::stdout())
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(columns: u16, rows: u16, out: W) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            columns,
            rows,
            cells: vec![BLANK; usize::from(columns) * usize::from(rows)],
            out,
        }
    }

    /// Text of row `y` with trailing blanks removed.
    pub fn row_text(&self, y: u16) -> String {
        let start = usize::from(y.min(self.rows - 1)) * usize::from(self.columns);
        let row: String = self.cells[start..start + usize::from(self.columns)]
            .iter()
            .collect();
        row.trim_end().to_owned()
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn set(&mut self, x: u16, y: u16, ch: char) {
        if x < self.columns && y < self.rows {
            self.cells[usize::from(y) * usize::from(self.columns) + usize::from(x)] = ch;
        }
    }

    fn write_rows(&mut self, first: u16, count: u16, prefix: &str) -> io::Result<()> {
        let mut frame = String::from(prefix);
        for y in first..first.saturating_add(count).min(self.rows) {
            frame.push_str(&format!("\x1b[{};1H\x1b[2K", u32::from(y) + 1));
            frame.push_str(&self.row_text(y));
        }
        frame.push_str(&format!("\x1b[{};1H", u32::from(self.rows) + 1));
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Display for ConsoleDisplay<W> {
    fn page_width(&self) -> u16 {
        self.columns
    }

    fn page_height(&self) -> u16 {
        self.rows
    }

    fn line_height(&self, _style: TextStyle) -> u16 {
        1
    }

    fn text_width(&self, text: &str, _style: TextStyle) -> u16 {
        u16::try_from(text.chars().count()).unwrap_or(u16::MAX)
    }

    fn clear_screen(&mut self) {
        self.cells.fill(BLANK);
    }

    fn draw_text(&mut self, x: u16, y: u16, text: &str, _style: TextStyle) {
        for (offset, ch) in text.chars().enumerate() {
            let Ok(offset) = u16::try_from(offset) else {
                break;
            };
            self.set(x.saturating_add(offset), y, ch);
        }
    }

    fn draw_rect(&mut self, x: u16, y: u16, width: u16, height: u16) {
        if width == 0 || height == 0 {
            return;
        }
        let right = x.saturating_add(width - 1);
        let bottom = y.saturating_add(height - 1);
        for cx in x..=right {
            self.set(cx, y, '-');
            self.set(cx, bottom, '-');
        }
        for cy in y..=bottom {
            self.set(x, cy, '|');
            self.set(right, cy, '|');
        }
        for (cx, cy) in [(x, y), (right, y), (x, bottom), (right, bottom)] {
            self.set(cx, cy, '+');
        }
    }

    fn fill_rect(&mut self, x: u16, y: u16, width: u16, height: u16, on: bool) {
        let cell = if on { INK } else { BLANK };
        for cy in y..y.saturating_add(height) {
            for cx in x..x.saturating_add(width) {
                self.set(cx, cy, cell);
            }
        }
    }

    fn flush(&mut self, mode: RefreshMode) {
        let prefix = match mode {
            RefreshMode::Full => CLEAR_SCREEN,
            RefreshMode::Partial => "",
        };
        if let Err(err) = self.write_rows(0, self.rows, prefix) {
            warn!("console flush failed: {err}");
        }
    }

    fn flush_area(&mut self, _x: u16, y: u16, _width: u16, height: u16) {
        if let Err(err) = self.write_rows(y, height, "") {
            warn!("console flush failed: {err}");
        }
    }
}
