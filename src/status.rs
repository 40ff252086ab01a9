//! Console status lines for a monitor's periodic report.

use core::fmt;

use crate::decoder::Snapshot;
use crate::mppt::MpptRecord;
use crate::shunt::ShuntRecord;

pub const STATUS_INTERVAL_MS: u32 = 10_000;

impl fmt::Display for Snapshot<ShuntRecord> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("Battery: No data from SmartShunt");
        }
        let r = &self.record;
        write!(
            f,
            "Battery: {:.2}V | {:.2}A | {:.1}% SOC | TTG: {} min",
            r.battery_voltage(),
            r.battery_current(),
            r.state_of_charge(),
            r.time_remaining_min()
        )
    }
}

impl fmt::Display for Snapshot<MpptRecord> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("Solar:   No data from MPPT");
        }
        let r = &self.record;
        writeln!(
            f,
            "Solar:   PV {:.1}V | {:.0}W | Charge {:.2}A | {}",
            r.panel_voltage(),
            r.panel_power(),
            r.charge_current(),
            r.charge_state()
        )?;
        write!(
            f,
            "         Yield: {:.2} kWh today | {:.2} kWh yesterday",
            r.yield_today(),
            r.yield_yesterday()
        )
    }
}

/// Fires at most once per interval on a wrapping millisecond clock
#[derive(Debug, Clone, Copy)]
pub struct StatusTicker {
    interval_ms: u32,
    last_ms: u32,
}

impl Default for StatusTicker {
    fn default() -> Self {
        StatusTicker::new(STATUS_INTERVAL_MS)
    }
}

impl StatusTicker {
    pub fn new(interval_ms: u32) -> StatusTicker {
        StatusTicker {
            interval_ms,
            last_ms: 0,
        }
    }

    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) >= self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}
