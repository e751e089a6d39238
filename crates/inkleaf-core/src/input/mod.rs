//! Input abstraction layer.

mod scripted;

pub use scripted::ScriptedInput;

/// Logical actions consumed by the reader screen.
///
/// Page buttons report how long they were held before release; a long hold
/// skips a whole chapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputEvent {
    Previous { held_ms: u32 },
    Next { held_ms: u32 },
    Back,
}

impl InputEvent {
    pub const fn previous() -> Self {
        Self::Previous { held_ms: 0 }
    }

    pub const fn next() -> Self {
        Self::Next { held_ms: 0 }
    }
}

/// Polled input provider.
pub trait InputProvider {
    type Error;

    fn poll_event(&mut self) -> Result<Option<InputEvent>, Self::Error>;
}
