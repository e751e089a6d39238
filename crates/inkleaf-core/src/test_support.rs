//! Fixtures shared by the unit tests: an in-memory ZIP writer, a
//! deterministic layout engine, a byte page, and a recording display.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use miniz_oxide::deflate::compress_to_vec;

use crate::display::{Display, RefreshMode, TextStyle};
use crate::layout::{LayoutEngine, LayoutError, Page};
use crate::power::BatteryGauge;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATED: u16 = 8;

struct FixtureEntry {
    name: String,
    data: Vec<u8>,
    method: u16,
    local_extra: Vec<u8>,
}

/// Builds ZIP archives in memory.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<FixtureEntry>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, METHOD_STORED)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, METHOD_DEFLATED)
    }

    /// Adds an entry with an arbitrary method id; the payload is stored as is.
    pub fn entry(mut self, name: &str, data: &[u8], method: u16) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_owned(),
            data: data.to_vec(),
            method,
            local_extra: Vec::new(),
        });
        self
    }

    /// Gives the last entry an extra field in its local header only.
    pub fn local_extra(mut self, extra: &[u8]) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.local_extra = extra.to_vec();
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let payload = match entry.method {
                METHOD_DEFLATED => compress_to_vec(&entry.data, 6),
                _ => entry.data.clone(),
            };
            let local_offset = out.len() as u32;

            out.extend_from_slice(&0x0403_4B50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&[0u8; 4]); // time + date
            out.extend_from_slice(&0u32.to_le_bytes()); // crc, never checked
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(entry.local_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.local_extra);
            out.extend_from_slice(&payload);

            central.extend_from_slice(&0x0201_4B50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&entry.method.to_le_bytes());
            central.extend_from_slice(&[0u8; 4]);
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // extra
            central.extend_from_slice(&0u16.to_le_bytes()); // comment
            central.extend_from_slice(&0u16.to_le_bytes()); // disk
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            central.extend_from_slice(&local_offset.to_le_bytes());
            central.extend_from_slice(entry.name.as_bytes());
        }

        let cdir_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x0605_4B50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&cdir_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }
}

/// Deterministic text that compresses, but not to nothing.
pub fn sample_text(len: usize, seed: u32) -> Vec<u8> {
    let words = ["ink", "leaf", "margin", "quire", "folio", "serif", "gutter"];
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.extend_from_slice(words[state as usize % words.len()].as_bytes());
        out.push(if state % 11 == 0 { b'\n' } else { b' ' });
    }
    out.truncate(len);
    out
}

/// Page holding a raw slice of chapter bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BytesPage(pub Vec<u8>);

impl Page for BytesPage {
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&(self.0.len() as u32).to_le_bytes())?;
        out.write_all(&self.0)
    }

    fn deserialize(input: &mut dyn Read) -> io::Result<Self> {
        let mut len = [0u8; 4];
        input.read_exact(&mut len)?;
        let mut data = vec![0u8; u32::from_le_bytes(len) as usize];
        input.read_exact(&mut data)?;
        Ok(Self(data))
    }

    fn render(&self, display: &mut dyn Display) {
        display.draw_text(0, 0, &String::from_utf8_lossy(&self.0), TextStyle::Regular);
    }
}

/// Test side of a [`ChunkLayout`] gate.
pub struct GateHandle {
    pub started: Receiver<()>,
    pub release: Sender<()>,
}

struct LayoutGate {
    started: Sender<()>,
    release: Receiver<()>,
}

/// Cuts markup into fixed-size byte pages.
pub struct ChunkLayout {
    bytes_per_page: usize,
    runs: Arc<AtomicUsize>,
    gate: Option<LayoutGate>,
}

impl ChunkLayout {
    pub fn new(bytes_per_page: usize) -> Self {
        Self {
            bytes_per_page: bytes_per_page.max(1),
            runs: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Counter of `layout` invocations.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }

    /// Makes every layout run announce itself and then wait to be released.
    pub fn gated(mut self) -> (Self, GateHandle) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.gate = Some(LayoutGate {
            started: started_tx,
            release: release_rx,
        });
        (
            self,
            GateHandle {
                started: started_rx,
                release: release_tx,
            },
        )
    }
}

impl LayoutEngine for ChunkLayout {
    type Page = BytesPage;

    fn layout(
        &mut self,
        markup: &mut dyn Read,
        on_page: &mut dyn FnMut(BytesPage) -> io::Result<()>,
    ) -> Result<(), LayoutError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.started.send(());
            let _ = gate.release.recv();
        }

        let mut text = Vec::new();
        markup.read_to_end(&mut text)?;
        for chunk in text.chunks(self.bytes_per_page) {
            on_page(BytesPage(chunk.to_vec()))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisplayOp {
    Clear,
    Text { x: u16, y: u16, text: String },
    Rect,
    FillRect { width: u16, on: bool },
    Flush(RefreshMode),
    FlushArea,
}

/// Display that records every call. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingDisplay {
    ops: Arc<Mutex<Vec<DisplayOp>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<DisplayOp> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    pub fn ops(&self) -> Vec<DisplayOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                DisplayOp::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> Vec<RefreshMode> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                DisplayOp::Flush(mode) => Some(mode),
                _ => None,
            })
            .collect()
    }

    fn push(&self, op: DisplayOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl Display for RecordingDisplay {
    fn page_width(&self) -> u16 {
        480
    }

    fn page_height(&self) -> u16 {
        800
    }

    fn line_height(&self, _style: TextStyle) -> u16 {
        20
    }

    fn text_width(&self, text: &str, _style: TextStyle) -> u16 {
        (text.chars().count() as u16).saturating_mul(10)
    }

    fn clear_screen(&mut self) {
        self.push(DisplayOp::Clear);
    }

    fn draw_text(&mut self, x: u16, y: u16, text: &str, _style: TextStyle) {
        self.push(DisplayOp::Text {
            x,
            y,
            text: text.to_owned(),
        });
    }

    fn draw_rect(&mut self, _x: u16, _y: u16, _width: u16, _height: u16) {
        self.push(DisplayOp::Rect);
    }

    fn fill_rect(&mut self, _x: u16, _y: u16, width: u16, _height: u16, on: bool) {
        self.push(DisplayOp::FillRect { width, on });
    }

    fn flush(&mut self, mode: RefreshMode) {
        self.push(DisplayOp::Flush(mode));
    }

    fn flush_area(&mut self, _x: u16, _y: u16, _width: u16, _height: u16) {
        self.push(DisplayOp::FlushArea);
    }
}

/// Battery whose level the test can change while the worker runs.
#[derive(Clone, Debug, Default)]
pub struct SharedBattery(pub Arc<AtomicUsize>);

impl BatteryGauge for SharedBattery {
    fn percentage(&mut self) -> u8 {
        self.0.load(Ordering::SeqCst).min(100) as u8
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
