//! Declarative field tables.
//!
//! A device variant is a [`Schema`]: a record type plus one [`FieldSpec`] row
//! per key it understands. The decoder never branches on key names itself,
//! it looks the key up here and applies the row.

/// Fixed-point unit a raw integer is transmitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millivolt,
    Milliamp,
    MilliampHour,
    /// 0.01 kWh
    CentiKilowattHour,
    Watt,
    /// 0.1 %
    PerMille,
    Minute,
    Count,
    /// Text, flags, codes and bitmasks
    None,
}

impl Unit {
    /// Convert a raw reading into its base unit (V, A, Ah, kWh, W, %).
    pub fn apply(self, raw: i32) -> f32 {
        match self {
            Unit::Millivolt | Unit::Milliamp | Unit::MilliampHour => raw as f32 / 1000.0,
            Unit::CentiKilowattHour => raw as f32 * 0.01,
            Unit::PerMille => raw as f32 / 10.0,
            Unit::Watt | Unit::Minute | Unit::Count | Unit::None => raw as f32,
        }
    }
}

/// How a value is decoded and where it lands in the record
pub enum FieldKind<R> {
    /// Raw fixed-point integer, scaled by the row's `unit` on read
    Int { get: fn(&R) -> i32, set: fn(&mut R, i32) },
    Text(fn(&mut R, &[u8])),
    Flag(fn(&mut R, bool)),
    /// Ends a block. The value is not used.
    Terminator,
}

impl<R> Clone for FieldKind<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldKind<R> {}

impl<R> core::fmt::Debug for FieldKind<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            FieldKind::Int { .. } => "Int",
            FieldKind::Text(_) => "Text",
            FieldKind::Flag(_) => "Flag",
            FieldKind::Terminator => "Terminator",
        })
    }
}

#[derive(Debug)]
pub struct FieldSpec<R> {
    pub key: &'static str,
    pub kind: FieldKind<R>,
    pub unit: Unit,
    /// Decoding this key counts toward the block's validity threshold
    pub counts: bool,
}

impl<R> Clone for FieldSpec<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldSpec<R> {}

pub trait Schema {
    type Record: Default + Clone + core::fmt::Debug + 'static;

    /// Short device name used in log lines
    const NAME: &'static str;

    const FIELDS: &'static [FieldSpec<Self::Record>];

    fn field(key: &[u8]) -> Option<&'static FieldSpec<Self::Record>> {
        Self::FIELDS.iter().find(|f| f.key.as_bytes() == key)
    }

    /// Integer field `key` of `record` in its base unit. `None` for keys
    /// that are unknown or not integers.
    fn value(record: &Self::Record, key: &[u8]) -> Option<f32> {
        let spec = Self::field(key)?;
        match spec.kind {
            FieldKind::Int { get, .. } => Some(spec.unit.apply(get(record))),
            _ => None,
        }
    }
}
