//! Greedy word wrap into fixed-size pages.

use std::io;
use std::mem;

use super::TextPage;
use super::markup::TextSink;

pub(super) struct Paginator<F> {
    columns: usize,
    lines_per_page: usize,
    word: Vec<u8>,
    line: String,
    line_width: usize,
    lines: Vec<String>,
    paragraph_pending: bool,
    on_page: F,
}

impl<F> Paginator<F>
where
    F: FnMut(TextPage) -> io::Result<()>,
{
    pub(super) fn new(columns: usize, lines_per_page: usize, on_page: F) -> Self {
        Self {
            columns: columns.max(1),
            lines_per_page: lines_per_page.max(1),
            word: Vec::new(),
            line: String::new(),
            line_width: 0,
            lines: Vec::new(),
            paragraph_pending: false,
            on_page,
        }
    }

    /// Hands out the last, possibly short, page.
    pub(super) fn finish(mut self) -> io::Result<()> {
        self.finish_word()?;
        self.push_line()?;
        if !self.lines.is_empty() {
            let lines = mem::take(&mut self.lines);
            (self.on_page)(TextPage::new(lines))?;
        }
        Ok(())
    }

    fn finish_word(&mut self) -> io::Result<()> {
        if self.word.is_empty() {
            return Ok(());
        }
        let word = String::from_utf8_lossy(&self.word).into_owned();
        self.word.clear();
        let width = word.chars().count();

        if self.line_width > 0 {
            if self.line_width + 1 + width <= self.columns {
                self.line.push(' ');
                self.line.push_str(&word);
                self.line_width += 1 + width;
                return Ok(());
            }
            self.push_line()?;
        }

        // Words wider than a line are cut at the column limit.
        let mut rest = word.as_str();
        loop {
            let cut = rest
                .char_indices()
                .nth(self.columns)
                .map_or(rest.len(), |(index, _)| index);
            let (piece, tail) = rest.split_at(cut);
            self.line.push_str(piece);
            self.line_width = piece.chars().count();
            if tail.is_empty() {
                return Ok(());
            }
            self.push_line()?;
            rest = tail;
        }
    }

    fn push_line(&mut self) -> io::Result<()> {
        if self.line_width == 0 {
            return Ok(());
        }
        // No blank line at the top or bottom of a page.
        if mem::take(&mut self.paragraph_pending)
            && !self.lines.is_empty()
            && self.lines.len() + 1 < self.lines_per_page
        {
            self.lines.push(String::new());
        }
        self.lines.push(mem::take(&mut self.line));
        self.line_width = 0;
        self.flush_full_page()
    }

    fn flush_full_page(&mut self) -> io::Result<()> {
        if self.lines.len() < self.lines_per_page {
            return Ok(());
        }
        let lines = mem::take(&mut self.lines);
        (self.on_page)(TextPage::new(lines))
    }
}

impl<F> TextSink for Paginator<F>
where
    F: FnMut(TextPage) -> io::Result<()>,
{
    fn text(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.word.extend_from_slice(bytes);
        Ok(())
    }

    fn space(&mut self) -> io::Result<()> {
        self.finish_word()
    }

    fn line_break(&mut self) -> io::Result<()> {
        self.finish_word()?;
        self.push_line()
    }

    /// Ends the line and leaves one blank line before the next paragraph,
    /// unless that paragraph starts a page.
    fn paragraph_break(&mut self) -> io::Result<()> {
        self.finish_word()?;
        self.push_line()?;
        self.paragraph_pending = !self.lines.is_empty();
        Ok(())
    }
}
