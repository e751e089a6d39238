//! Line-based keyboard input.
//!
//! | line          | event                         |
//! |---------------|-------------------------------|
//! | empty, `n`    | next page                     |
//! | `p`           | previous page                 |
//! | `N`           | next chapter (long hold)      |
//! | `P`           | previous chapter (long hold)  |
//! | `q`           | back (quit)                   |

use std::io::{self, BufRead};

use inkleaf_core::input::{InputEvent, InputProvider};
use log::warn;

/// Maps one command line to an event. `hold_ms` is reported for the chapter
/// skip commands and should exceed the reader's skip threshold.
pub fn parse_command(line: &str, hold_ms: u32) -> Option<InputEvent> {
    match line.trim() {
        "" | "n" | "next" => Some(InputEvent::next()),
        "p" | "prev" => Some(InputEvent::previous()),
        "N" => Some(InputEvent::Next { held_ms: hold_ms }),
        "P" => Some(InputEvent::Previous { held_ms: hold_ms }),
        "q" | "quit" => Some(InputEvent::Back),
        _ => None,
    }
}

/// Reads one command per line; end of input counts as [`InputEvent::Back`].
#[derive(Debug)]
pub struct LineInput<R> {
    reader: R,
    skip_hold_ms: u32,
    line: String,
}

impl<R: BufRead> LineInput<R> {
    /// `skip_threshold_ms` is the reader's chapter-skip threshold.
    pub fn new(reader: R, skip_threshold_ms: u32) -> Self {
        Self {
            reader,
            skip_hold_ms: skip_threshold_ms.saturating_add(1),
            line: String::new(),
        }
    }
}

impl<R: BufRead> InputProvider for LineInput<R> {
    type Error = io::Error;

    /// Blocks until a line arrives. Unknown commands yield `None`.
    fn poll_event(&mut self) -> Result<Option<InputEvent>, Self::Error> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(Some(InputEvent::Back));
        }
        let event = parse_command(&self.line, self.skip_hold_ms);
        if event.is_none() {
            warn!("unknown command {:?} (n, p, N, P, q)", self.line.trim());
        }
        Ok(event)
    }
}
