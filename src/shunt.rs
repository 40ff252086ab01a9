//! Battery monitor (SmartShunt) schema and record.

use bilge::prelude::*;

use crate::schema::{FieldKind, FieldSpec, Schema, Unit};

/// `AR` alarm reason bitmask
#[bitsize(16)]
#[derive(DebugBits, Clone, Copy, PartialEq, FromBits)]
pub struct AlarmReason {
    pub low_voltage: bool,
    pub high_voltage: bool,
    pub low_soc: bool,
    pub low_starter_voltage: bool,
    pub high_starter_voltage: bool,
    pub low_temperature: bool,
    pub high_temperature: bool,
    pub mid_voltage: bool,
    pub overload: bool,
    pub dc_ripple: bool,
    pub low_v_ac_out: bool,
    pub high_v_ac_out: bool,
    pub short_circuit: bool,
    pub bms_lockout: bool,
    _reserved: u2,
}

impl AlarmReason {
    pub fn from_raw(raw: i32) -> AlarmReason {
        AlarmReason::from(raw as u16)
    }

    pub fn bits(&self) -> u16 {
        self.value
    }

    pub fn any(&self) -> bool {
        self.value != 0
    }
}

impl Default for AlarmReason {
    fn default() -> Self {
        AlarmReason::from(0u16)
    }
}

/// Raw values as last received from the battery monitor
#[derive(Debug, Clone, PartialEq)]
pub struct ShuntRecord {
    pub voltage_mv: i32,
    /// Negative while discharging
    pub current_ma: i32,
    pub soc_permille: i32,
    /// -1 while the battery is not discharging
    pub time_to_go_min: i32,
    pub consumed_mah: i32,
    pub alarm: bool,
    pub relay: bool,
    pub alarm_reason: AlarmReason,
    pub deepest_discharge_mah: i32,
    pub last_discharge_mah: i32,
    pub charge_cycles: i32,
    pub min_voltage_mv: i32,
    pub max_voltage_mv: i32,
}

impl Default for ShuntRecord {
    fn default() -> Self {
        ShuntRecord {
            voltage_mv: 0,
            current_ma: 0,
            soc_permille: 0,
            time_to_go_min: -1,
            consumed_mah: 0,
            alarm: false,
            relay: false,
            alarm_reason: AlarmReason::default(),
            deepest_discharge_mah: 0,
            last_discharge_mah: 0,
            charge_cycles: 0,
            min_voltage_mv: 0,
            max_voltage_mv: 0,
        }
    }
}

impl ShuntRecord {
    fn scaled(&self, key: &[u8]) -> f32 {
        BatteryMonitor::value(self, key).unwrap_or(0.0)
    }

    pub fn battery_voltage(&self) -> f32 {
        self.scaled(b"V")
    }

    /// Signed, negative = discharge
    pub fn battery_current(&self) -> f32 {
        self.scaled(b"I")
    }

    /// Percent, 0-100
    pub fn state_of_charge(&self) -> f32 {
        self.scaled(b"SOC")
    }

    pub fn time_remaining_min(&self) -> i32 {
        self.time_to_go_min
    }

    /// Minutes left, `None` when the monitor reports infinite (-1)
    pub fn time_remaining(&self) -> Option<u32> {
        u32::try_from(self.time_to_go_min).ok()
    }

    /// Magnitude only, the device reports consumption as negative
    pub fn consumed_ah(&self) -> f32 {
        self.scaled(b"CE").abs()
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn relay(&self) -> bool {
        self.relay
    }

    pub fn alarm_reason(&self) -> AlarmReason {
        self.alarm_reason
    }

    pub fn min_voltage(&self) -> f32 {
        self.scaled(b"H7")
    }

    pub fn max_voltage(&self) -> f32 {
        self.scaled(b"H8")
    }

    pub fn charge_cycles(&self) -> i32 {
        self.charge_cycles
    }

    pub fn deepest_discharge(&self) -> f32 {
        self.scaled(b"H1").abs()
    }

    pub fn last_discharge(&self) -> f32 {
        self.scaled(b"H2").abs()
    }
}

/// SmartShunt battery monitor
#[derive(Debug, Clone, Copy)]
pub struct BatteryMonitor;

impl Schema for BatteryMonitor {
    type Record = ShuntRecord;

    const NAME: &'static str = "SmartShunt";

    const FIELDS: &'static [FieldSpec<ShuntRecord>] = &[
        FieldSpec {
            key: "V",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.voltage_mv,
                set: |r: &mut ShuntRecord, v: i32| r.voltage_mv = v,
            },
            unit: Unit::Millivolt,
            counts: true,
        },
        FieldSpec {
            key: "I",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.current_ma,
                set: |r: &mut ShuntRecord, v: i32| r.current_ma = v,
            },
            unit: Unit::Milliamp,
            counts: true,
        },
        FieldSpec {
            key: "SOC",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.soc_permille,
                set: |r: &mut ShuntRecord, v: i32| r.soc_permille = v,
            },
            unit: Unit::PerMille,
            counts: true,
        },
        FieldSpec {
            key: "TTG",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.time_to_go_min,
                set: |r: &mut ShuntRecord, v: i32| r.time_to_go_min = v,
            },
            unit: Unit::Minute,
            counts: false,
        },
        FieldSpec {
            key: "CE",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.consumed_mah,
                set: |r: &mut ShuntRecord, v: i32| r.consumed_mah = v,
            },
            unit: Unit::MilliampHour,
            counts: false,
        },
        FieldSpec {
            key: "Alarm",
            kind: FieldKind::Flag(|r: &mut ShuntRecord, v: bool| r.alarm = v),
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "Relay",
            kind: FieldKind::Flag(|r: &mut ShuntRecord, v: bool| r.relay = v),
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "AR",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.alarm_reason.bits() as i32,
                set: |r: &mut ShuntRecord, v: i32| r.alarm_reason = AlarmReason::from_raw(v),
            },
            unit: Unit::None,
            counts: false,
        },
        FieldSpec {
            key: "H1",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.deepest_discharge_mah,
                set: |r: &mut ShuntRecord, v: i32| r.deepest_discharge_mah = v,
            },
            unit: Unit::MilliampHour,
            counts: false,
        },
        FieldSpec {
            key: "H2",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.last_discharge_mah,
                set: |r: &mut ShuntRecord, v: i32| r.last_discharge_mah = v,
            },
            unit: Unit::MilliampHour,
            counts: false,
        },
        FieldSpec {
            key: "H4",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.charge_cycles,
                set: |r: &mut ShuntRecord, v: i32| r.charge_cycles = v,
            },
            unit: Unit::Count,
            counts: false,
        },
        FieldSpec {
            key: "H7",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.min_voltage_mv,
                set: |r: &mut ShuntRecord, v: i32| r.min_voltage_mv = v,
            },
            unit: Unit::Millivolt,
            counts: false,
        },
        FieldSpec {
            key: "H8",
            kind: FieldKind::Int {
                get: |r: &ShuntRecord| r.max_voltage_mv,
                set: |r: &mut ShuntRecord, v: i32| r.max_voltage_mv = v,
            },
            unit: Unit::Millivolt,
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
