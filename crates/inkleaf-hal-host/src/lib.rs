//! Host (desktop) adapters for the reader core.
//!
//! Files come from `std::fs`, chapters are laid out as wrapped plain text, and
//! the "panel" is a character grid written to a terminal.

pub mod display;
pub mod input;
pub mod layout;
pub mod power;
pub mod storage;

pub use display::ConsoleDisplay;
pub use input::{LineInput, parse_command};
pub use layout::{TextLayout, TextPage};
pub use power::HostBattery;
pub use storage::FsStorage;
