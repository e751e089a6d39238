//! Battery level from the Linux power-supply class.

use std::fs;
use std::path::PathBuf;

use inkleaf_core::power::BatteryGauge;
use log::debug;

const DEFAULT_CAPACITY_PATH: &str = "/sys/class/power_supply/BAT0/capacity";
const MAINS_PERCENT: u8 = 100;

/// Reads the capacity file on every query; machines without a battery
/// report a full charge.
#[derive(Clone, Debug)]
pub struct HostBattery {
    capacity_path: PathBuf,
    reported_missing: bool,
}

impl Default for HostBattery {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_PATH)
    }
}

impl HostBattery {
    pub fn new(capacity_path: impl Into<PathBuf>) -> Self {
        Self {
            capacity_path: capacity_path.into(),
            reported_missing: false,
        }
    }
}

impl BatteryGauge for HostBattery {
    fn percentage(&mut self) -> u8 {
        let reading = fs::read_to_string(&self.capacity_path)
            .map_err(|err| err.to_string())
            .and_then(|text| text.trim().parse::<u8>().map_err(|err| err.to_string()));
        match reading {
            Ok(percent) => percent.min(100),
            Err(err) => {
                if !self.reported_missing {
                    self.reported_missing = true;
                    debug!(
                        "no battery reading from {}: {err}",
                        self.capacity_path.display()
                    );
                }
                MAINS_PERCENT
            }
        }
    }
}
