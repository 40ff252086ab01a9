#![no_std]

#[cfg(test)]
extern crate std;

mod decoder;
mod field;
mod line;
mod mppt;
mod schema;
mod serial;
mod shunt;
mod status;
#[cfg(test)]
mod testing;

/// Monotonic millisecond counter. Expected to wrap like an MCU `millis()`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32,
{
    fn now_ms(&self) -> u32 {
        self()
    }
}

pub use decoder::{
    DecodeStats, DecoderConfig, FrameDecoder, LineError, LineOutcome, MIN_FIELDS_FOR_VALID, STALE_AFTER_MS, Snapshot,
    Validity,
};
pub use field::{Field, TEXT_CAPACITY, Text, parse_int, split_field, text_str};
pub use line::{LINE_CAPACITY, Line, LineAssembler, LineBuf};
pub use mppt::{ChargeController, ChargeState, ErrorText, MpptRecord, error_label};
pub use schema::{FieldKind, FieldSpec, Schema, Unit};
pub use serial::{IoErrorShim, IoRx, MpptPort, ShuntPort, VeDirect};
pub use shunt::{AlarmReason, BatteryMonitor, ShuntRecord};
pub use status::{STATUS_INTERVAL_MS, StatusTicker};
