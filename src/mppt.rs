//! Charge controller (SmartSolar MPPT) schema and record.

use core::fmt;

use crate::field::{FLAG_ON, Text, copy_text, text_str};
use crate::schema::{FieldKind, FieldSpec, Schema, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Off,
    Fault,
    Bulk,
    Absorption,
    Float,
    Storage,
    Equalize,
    Unknown,
}

impl ChargeState {
    /// Map a `CS` code. Unlisted codes are `Unknown`, never an error.
    pub fn from_code(code: i32) -> ChargeState {
        match code {
            0 => ChargeState::Off,
            2 => ChargeState::Fault,
            3 => ChargeState::Bulk,
            4 => ChargeState::Absorption,
            5 => ChargeState::Float,
            6 => ChargeState::Storage,
            7 => ChargeState::Equalize,
            _ => ChargeState::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChargeState::Off => "OFF",
            ChargeState::Fault => "FAULT",
            ChargeState::Bulk => "BULK",
            ChargeState::Absorption => "ABSORPTION",
            ChargeState::Float => "FLOAT",
            ChargeState::Storage => "STORAGE",
            ChargeState::Equalize => "EQUALIZE",
            ChargeState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for an `ERR` code, if it is one we know
pub fn error_label(code: i32) -> Option<&'static str> {
    let label = match code {
        0 => "No error",
        2 => "Battery voltage too high",
        17 => "Charger temperature too high",
        18 => "Charger over current",
        19 => "Charger current reversed",
        20 => "Bulk time limit exceeded",
        33 => "Input voltage too high (solar)",
        34 => "Input current too high (solar)",
        _ => return None,
    };
    Some(label)
}

/// Renders an error code as text without allocating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorText(pub i32);

impl fmt::Display for ErrorText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match error_label(self.0) {
            Some(label) => f.write_str(label),
            None => write!(f, "Unknown error ({})", self.0),
        }
    }
}

/// Raw values as last received from the controller
#[derive(Debug, Clone, PartialEq)]
pub struct MpptRecord {
    pub product_id: Text,
    pub serial_number: Text,
    pub battery_voltage_mv: i32,
    pub charge_current_ma: i32,
    pub panel_voltage_mv: i32,
    pub panel_power_w: i32,
    /// Raw `CS`, -1 until the first report
    pub charge_state_code: i32,
    pub error_code: i32,
    pub load_state: Text,
    pub load_current_ma: i32,
    pub yield_total: i32,
    pub yield_today: i32,
    pub max_power_today_w: i32,
    pub yield_yesterday: i32,
    pub max_power_yesterday_w: i32,
}

impl Default for MpptRecord {
    fn default() -> Self {
        let mut load_state = Text::new();
        copy_text(&mut load_state, b"OFF");
        MpptRecord {
            product_id: Text::new(),
            serial_number: Text::new(),
            battery_voltage_mv: 0,
            charge_current_ma: 0,
            panel_voltage_mv: 0,
            panel_power_w: 0,
            charge_state_code: -1,
            error_code: 0,
            load_state,
            load_current_ma: 0,
            yield_total: 0,
            yield_today: 0,
            max_power_today_w: 0,
            yield_yesterday: 0,
            max_power_yesterday_w: 0,
        }
    }
}

impl MpptRecord {
    fn scaled(&self, key: &[u8]) -> f32 {
        ChargeController::value(self, key).unwrap_or(0.0)
    }

    pub fn product_id(&self) -> &str {
        text_str(&self.product_id)
    }

    pub fn serial_number(&self) -> &str {
        text_str(&self.serial_number)
    }

    pub fn battery_voltage(&self) -> f32 {
        self.scaled(b"V")
    }

    pub fn charge_current(&self) -> f32 {
        self.scaled(b"I")
    }

    pub fn panel_voltage(&self) -> f32 {
        self.scaled(b"VPV")
    }

    pub fn panel_power(&self) -> f32 {
        self.scaled(b"PPV")
    }

    pub fn charge_state_code(&self) -> i32 {
        self.charge_state_code
    }

    pub fn charge_state(&self) -> ChargeState {
        ChargeState::from_code(self.charge_state_code)
    }

    pub fn charge_state_label(&self) -> &'static str {
        self.charge_state().label()
    }

    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn error_text(&self) -> ErrorText {
        ErrorText(self.error_code)
    }

    /// `LOAD` as sent, "OFF" until the first report. Bytes past the first
    /// invalid UTF-8 sequence are left out; [`load_state_bytes`] has them all.
    ///
    /// [`load_state_bytes`]: MpptRecord::load_state_bytes
    pub fn load_state(&self) -> &str {
        text_str(&self.load_state)
    }

    pub fn load_state_bytes(&self) -> &[u8] {
        &self.load_state
    }

    pub fn load_on(&self) -> bool {
        self.load_state.as_slice() == FLAG_ON
    }

    pub fn load_current(&self) -> f32 {
        self.scaled(b"IL")
    }

    pub fn yield_today(&self) -> f32 {
        self.scaled(b"H20")
    }

    pub fn yield_yesterday(&self) -> f32 {
        self.scaled(b"H22")
    }

    pub fn yield_total(&self) -> f32 {
        self.scaled(b"H19")
    }

    /// Watts
    pub fn max_power_today(&self) -> i32 {
        self.scaled(b"H21") as i32
    }

    pub fn max_power_yesterday(&self) -> i32 {
        self.scaled(b"H23") as i32
    }
}

/// SmartSolar MPPT charge controller
#[derive(Debug, Clone, Copy)]
pub struct ChargeController;

impl Schema for ChargeController {
    type Record = MpptRecord;

    const NAME: &'static str = "MPPT";

    const FIELDS: &'static [FieldSpec<MpptRecord>] = &[
        FieldSpec {
            key: "PID",
            kind: FieldKind::Text(|r: &mut MpptRecord, v: &[u8]| copy_text(&mut r.product_id, v)),
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "SER#",
            kind: FieldKind::Text(|r: &mut MpptRecord, v: &[u8]| copy_text(&mut r.serial_number, v)),
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "V",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.battery_voltage_mv,
                set: |r: &mut MpptRecord, v: i32| r.battery_voltage_mv = v,
            },
            unit: Unit::Millivolt,
            counts: true,
        },
        FieldSpec {
            key: "I",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.charge_current_ma,
                set: |r: &mut MpptRecord, v: i32| r.charge_current_ma = v,
            },
            unit: Unit::Milliamp,
            counts: true,
        },
        FieldSpec {
            key: "VPV",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.panel_voltage_mv,
                set: |r: &mut MpptRecord, v: i32| r.panel_voltage_mv = v,
            },
            unit: Unit::Millivolt,
            counts: true,
        },
        FieldSpec {
            key: "PPV",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.panel_power_w,
                set: |r: &mut MpptRecord, v: i32| r.panel_power_w = v,
            },
            unit: Unit::Watt,
            counts: false,
        },
        FieldSpec {
            key: "CS",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.charge_state_code,
                set: |r: &mut MpptRecord, v: i32| r.charge_state_code = v,
            },
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "ERR",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.error_code,
                set: |r: &mut MpptRecord, v: i32| r.error_code = v,
            },
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "LOAD",
            kind: FieldKind::Text(|r: &mut MpptRecord, v: &[u8]| copy_text(&mut r.load_state, v)),
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "IL",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.load_current_ma,
                set: |r: &mut MpptRecord, v: i32| r.load_current_ma = v,
            },
            unit: Unit::Milliamp,
            counts: false,
        },
        FieldSpec {
            key: "H19",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.yield_total,
                set: |r: &mut MpptRecord, v: i32| r.yield_total = v,
            },
            unit: Unit::CentiKilowattHour,
            counts: false,
        },
        FieldSpec {
            key: "H20",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.yield_today,
                set: |r: &mut MpptRecord, v: i32| r.yield_today = v,
            },
            unit: Unit::CentiKilowattHour,
            counts: false,
        },
        FieldSpec {
            key: "H21",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.max_power_today_w,
                set: |r: &mut MpptRecord, v: i32| r.max_power_today_w = v,
            },
            unit: Unit::Watt,
            counts: false,
        },
        FieldSpec {
            key: "H22",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.yield_yesterday,
                set: |r: &mut MpptRecord, v: i32| r.yield_yesterday = v,
            },
            unit: Unit::CentiKilowattHour,
            counts: false,
        },
        FieldSpec {
            key: "H23",
            kind: FieldKind::Int {
                get: |r: &MpptRecord| r.max_power_yesterday_w,
                set: |r: &mut MpptRecord, v: i32| r.max_power_yesterday_w = v,
            },
            unit: Unit::Watt,
            counts: false,
        },
        FieldSpec {
            key: "Checksum",
            kind: FieldKind::Terminator,
            unit: Unit::None,
            counts: false,
        },
    ];
}
