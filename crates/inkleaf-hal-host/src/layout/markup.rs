//! Incremental XHTML to text scanner.
//!
//! Bytes are fed in arbitrary chunks; tags and character references may be
//! split anywhere. Only text inside `<body>` (or outside `<head>` when the
//! document has no body) is reported, and script and style content is dropped.

use std::io;

use super::entities::decode_entity;

const TAG_BYTES: usize = 64;
const ENTITY_BYTES: usize = 12;

const FLAG_IN_HEAD: u8 = 1 << 0;
const FLAG_IN_BODY: u8 = 1 << 1;
const FLAG_BODY_SEEN: u8 = 1 << 2;
const FLAG_IN_SCRIPT: u8 = 1 << 3;
const FLAG_IN_STYLE: u8 = 1 << 4;

const BLOCK_TAGS: &[&[u8]] = &[
    b"p", b"div", b"section", b"article", b"aside", b"header", b"footer", b"nav",
    b"li", b"ul", b"ol", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"blockquote",
    b"pre", b"table", b"tr", b"hr", b"figure", b"dt", b"dd",
];

/// Receiver of scanned text.
pub(super) trait TextSink {
    /// Part of a word. Never contains ASCII whitespace.
    fn text(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn space(&mut self) -> io::Result<()>;
    fn line_break(&mut self) -> io::Result<()>;
    fn paragraph_break(&mut self) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
struct DocumentState {
    flags: u8,
}

impl DocumentState {
    fn has(self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    fn set(&mut self, flag: u8, enabled: bool) {
        if enabled {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    fn emits_text(self) -> bool {
        if self.has(FLAG_IN_SCRIPT) || self.has(FLAG_IN_STYLE) {
            false
        } else if self.has(FLAG_BODY_SEEN) {
            self.has(FLAG_IN_BODY)
        } else {
            !self.has(FLAG_IN_HEAD)
        }
    }

    fn apply(&mut self, tag: &Tag<'_>) {
        let opens = !tag.closing && !tag.self_closing;
        match_name(tag.name, |name| match name {
            b"head" => self.set(FLAG_IN_HEAD, opens),
            b"body" if tag.closing => self.set(FLAG_IN_BODY, false),
            b"body" => {
                self.set(FLAG_BODY_SEEN, true);
                self.set(FLAG_IN_HEAD, false);
                self.set(FLAG_IN_BODY, !tag.self_closing);
            }
            b"script" => self.set(FLAG_IN_SCRIPT, opens),
            b"style" => self.set(FLAG_IN_STYLE, opens),
            _ => {}
        });
    }
}

/// Runs `f` with the tag name lowercased, or does nothing for long names.
fn match_name<R>(name: &[u8], f: impl FnOnce(&[u8]) -> R) -> Option<R> {
    let mut lower = [0u8; 16];
    let lower = lower.get_mut(..name.len())?;
    lower.copy_from_slice(name);
    lower.make_ascii_lowercase();
    Some(f(lower))
}

#[derive(Debug)]
struct Tag<'a> {
    /// Local name, namespace prefix removed.
    name: &'a [u8],
    closing: bool,
    self_closing: bool,
}

/// `raw` is the text between `<` and `>`. Comments, doctypes, and processing
/// instructions yield `None`.
fn parse_tag(raw: &[u8], last_byte: u8) -> Option<Tag<'_>> {
    let raw = raw.trim_ascii();
    let (closing, rest) = match raw.split_first() {
        Some((b'/', rest)) => (true, rest.trim_ascii_start()),
        Some((b'!' | b'?', _)) | None => return None,
        Some(_) => (false, raw),
    };
    let name_end = rest
        .iter()
        .position(|b| b.is_ascii_whitespace() || *b == b'/')
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    let name = match name.iter().rposition(|b| *b == b':') {
        Some(colon) => &name[colon + 1..],
        None => name,
    };
    if name.is_empty() {
        return None;
    }
    Some(Tag {
        name,
        closing,
        self_closing: last_byte == b'/',
    })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    Text,
    Tag,
    Entity,
}

#[derive(Debug)]
pub(super) struct MarkupScanner {
    mode: Mode,
    document: DocumentState,
    /// Head of the current tag; long attribute lists are cut off.
    tag: heapless::Vec<u8, TAG_BYTES>,
    /// Last non-whitespace byte of the current tag, to spot `/>`.
    tag_last: u8,
    entity: heapless::Vec<u8, ENTITY_BYTES>,
}

impl Default for MarkupScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupScanner {
    pub(super) fn new() -> Self {
        Self {
            mode: Mode::Text,
            document: DocumentState::default(),
            tag: heapless::Vec::new(),
            tag_last: 0,
            entity: heapless::Vec::new(),
        }
    }

    pub(super) fn feed(&mut self, chunk: &[u8], sink: &mut dyn TextSink) -> io::Result<()> {
        for &byte in chunk {
            match self.mode {
                Mode::Text => self.text_byte(byte, sink)?,
                Mode::Tag => {
                    if byte == b'>' {
                        self.mode = Mode::Text;
                        self.finish_tag(sink)?;
                    } else {
                        // Overflow only drops attributes.
                        let _ = self.tag.push(byte);
                        if !byte.is_ascii_whitespace() {
                            self.tag_last = byte;
                        }
                    }
                }
                Mode::Entity => {
                    if byte == b';' {
                        self.mode = Mode::Text;
                        self.finish_entity(sink)?;
                    } else if !(byte.is_ascii_alphanumeric() || byte == b'#')
                        || self.entity.push(byte).is_err()
                    {
                        self.mode = Mode::Text;
                        self.flush_literal_entity(sink)?;
                        self.text_byte(byte, sink)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Emits whatever a truncated document left pending.
    pub(super) fn finish(&mut self, sink: &mut dyn TextSink) -> io::Result<()> {
        if self.mode == Mode::Entity {
            self.flush_literal_entity(sink)?;
        }
        self.mode = Mode::Text;
        self.tag.clear();
        Ok(())
    }

    fn text_byte(&mut self, byte: u8, sink: &mut dyn TextSink) -> io::Result<()> {
        match byte {
            b'<' => {
                self.mode = Mode::Tag;
                self.tag.clear();
                self.tag_last = 0;
                Ok(())
            }
            b'&' => {
                self.mode = Mode::Entity;
                self.entity.clear();
                Ok(())
            }
            _ if !self.document.emits_text() => Ok(()),
            b' ' | b'\t' | b'\r' | b'\n' => sink.space(),
            _ if byte.is_ascii_control() => Ok(()),
            _ => sink.text(&[byte]),
        }
    }

    fn finish_tag(&mut self, sink: &mut dyn TextSink) -> io::Result<()> {
        let Some(tag) = parse_tag(&self.tag, self.tag_last) else {
            return Ok(());
        };
        let was_emitting = self.document.emits_text();
        self.document.apply(&tag);
        if !(was_emitting && self.document.emits_text()) {
            return Ok(());
        }

        match match_name(tag.name, |name| {
            if name == b"br" {
                Some(false)
            } else {
                BLOCK_TAGS.iter().any(|block| *block == name).then_some(true)
            }
        })
        .flatten()
        {
            Some(true) => sink.paragraph_break(),
            Some(false) => sink.line_break(),
            None => Ok(()),
        }
    }

    fn finish_entity(&mut self, sink: &mut dyn TextSink) -> io::Result<()> {
        if !self.document.emits_text() {
            return Ok(());
        }
        match decode_entity(&self.entity) {
            Some('\u{ad}') => Ok(()),
            Some(ch) => {
                let mut utf8 = [0u8; 4];
                sink.text(ch.encode_utf8(&mut utf8).as_bytes())
            }
            None => {
                self.flush_literal_entity(sink)?;
                sink.text(b";")
            }
        }
    }

    /// A bare `&` that did not start a reference is ordinary text.
    fn flush_literal_entity(&mut self, sink: &mut dyn TextSink) -> io::Result<()> {
        if !self.document.emits_text() {
            return Ok(());
        }
        sink.text(b"&")?;
        if !self.entity.is_empty() {
            sink.text(&self.entity)?;
        }
        Ok(())
    }
}
