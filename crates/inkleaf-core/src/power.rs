//! Battery level source for the status bar.

pub trait BatteryGauge {
    /// Remaining charge, `0..=100`.
    fn percentage(&mut self) -> u8;
}

/// Gauge that always reports the same level.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FixedBattery(pub u8);

impl Default for FixedBattery {
    fn default() -> Self {
        Self(100)
    }
}

impl BatteryGauge for FixedBattery {
    fn percentage(&mut self) -> u8 {
        self.0.min(100)
    }
}
