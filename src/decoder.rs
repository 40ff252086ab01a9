use crate::field::{parse_flag, parse_int, split_field};
use crate::line::LineAssembler;
use crate::schema::{FieldKind, Schema};

/// Counted fields a block needs before its terminator marks the record valid
pub const MIN_FIELDS_FOR_VALID: u8 = 3;
/// Age after which a once-valid record reads as invalid
pub const STALE_AFTER_MS: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub min_fields_for_valid: u8,
    pub stale_after_ms: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            min_fields_for_valid: MIN_FIELDS_FOR_VALID,
            stale_after_ms: STALE_AFTER_MS,
        }
    }
}

/// Block bookkeeping.
///
/// `valid` only ever goes from false to true. A block that falls short of the
/// threshold leaves it alone and the record ages out through the staleness
/// window instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validity {
    fields_since_terminator: u8,
    valid: bool,
    last_update_ms: u32,
}

impl Validity {
    fn count_field(&mut self) {
        self.fields_since_terminator = self.fields_since_terminator.saturating_add(1);
    }

    /// Close the current block. Returns whether it met the threshold.
    fn close_block(&mut self, min_fields: u8, now_ms: u32) -> bool {
        let accepted = self.fields_since_terminator >= min_fields;
        if accepted {
            self.valid = true;
            self.last_update_ms = now_ms;
        }
        self.fields_since_terminator = 0;
        accepted
    }

    pub fn fields_since_terminator(&self) -> u8 {
        self.fields_since_terminator
    }

    /// Set once any block has been accepted
    pub fn ever_valid(&self) -> bool {
        self.valid
    }

    pub fn last_update_ms(&self) -> u32 {
        self.last_update_ms
    }

    pub fn age_ms(&self, now_ms: u32) -> Option<u32> {
        self.valid.then(|| now_ms.wrapping_sub(self.last_update_ms))
    }

    pub fn is_fresh(&self, now_ms: u32, stale_after_ms: u32) -> bool {
        self.valid && now_ms.wrapping_sub(self.last_update_ms) < stale_after_ms
    }
}

/// Running counters. Diagnostic only, nothing here feeds back into decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub bytes: u32,
    pub lines: u32,
    pub truncated_lines: u32,
    pub malformed_lines: u32,
    pub unknown_keys: u32,
    pub blocks_accepted: u32,
    pub blocks_rejected: u32,
    pub transport_errors: u32,
}

fn bump(counter: &mut u32) {
    *counter = counter.wrapping_add(1);
}

/// Why a completed line changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    MissingTab,
    UnknownKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Field { counted: bool },
    BlockAccepted,
    BlockRejected { fields: u8 },
}

/// Owned copy of the record and its freshness at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    pub record: R,
    pub valid: bool,
    pub last_update_ms: u32,
    pub age_ms: Option<u32>,
}

/// Schema-driven VE.Direct text decoder. Bytes in, record out; no I/O.
#[derive(Debug)]
pub struct FrameDecoder<S: Schema> {
    config: DecoderConfig,
    line: LineAssembler,
    record: S::Record,
    validity: Validity,
    stats: DecodeStats,
}

impl<S: Schema> Default for FrameDecoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> FrameDecoder<S> {
    pub fn new() -> FrameDecoder<S> {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> FrameDecoder<S> {
        FrameDecoder {
            config,
            line: LineAssembler::new(),
            record: S::Record::default(),
            validity: Validity::default(),
            stats: DecodeStats::default(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8], now_ms: u32) {
        for b in bytes {
            self.feed_byte(*b, now_ms);
        }
    }

    /// Push one byte. When it completes a line, the line is decoded and the
    /// outcome returned.
    pub fn feed_byte(&mut self, byte: u8, now_ms: u32) -> Option<Result<LineOutcome, LineError>> {
        bump(&mut self.stats.bytes);
        let line = self.line.push(byte)?;
        bump(&mut self.stats.lines);
        if line.truncated {
            bump(&mut self.stats.truncated_lines);
            log::warn!("{}: line exceeded buffer, decoding truncated prefix", S::NAME);
        }
        log::trace!(
            "{}: line {:?}",
            S::NAME,
            core::str::from_utf8(&line.bytes).unwrap_or("<non-utf8>")
        );

        let outcome = self.decode_line(&line.bytes, now_ms);
        match outcome {
            Ok(LineOutcome::BlockAccepted) => {
                bump(&mut self.stats.blocks_accepted);
                log::debug!("{}: block accepted at {} ms", S::NAME, now_ms);
            }
            Ok(LineOutcome::BlockRejected { fields }) => {
                bump(&mut self.stats.blocks_rejected);
                log::debug!(
                    "{}: block closed with {} of {} required fields",
                    S::NAME,
                    fields,
                    self.config.min_fields_for_valid
                );
            }
            Ok(LineOutcome::Field { .. }) => {}
            Err(LineError::MissingTab) => {
                bump(&mut self.stats.malformed_lines);
                log::debug!("{}: discarding line without tab", S::NAME);
            }
            Err(LineError::UnknownKey) => {
                bump(&mut self.stats.unknown_keys);
            }
        }
        Some(outcome)
    }

    /// Apply one complete line to the record.
    pub fn decode_line(&mut self, line: &[u8], now_ms: u32) -> Result<LineOutcome, LineError> {
        let field = split_field(line).ok_or(LineError::MissingTab)?;
        let spec = S::field(field.key).ok_or(LineError::UnknownKey)?;

        match spec.kind {
            FieldKind::Terminator => {
                let fields = self.validity.fields_since_terminator;
                return Ok(
                    if self.validity.close_block(self.config.min_fields_for_valid, now_ms) {
                        LineOutcome::BlockAccepted
                    } else {
                        LineOutcome::BlockRejected { fields }
                    },
                );
            }
            FieldKind::Int { set, .. } => set(&mut self.record, parse_int(field.value)),
            FieldKind::Text(set) => set(&mut self.record, field.value),
            FieldKind::Flag(set) => set(&mut self.record, parse_flag(field.value)),
        }
        if spec.counts {
            self.validity.count_field();
        }
        Ok(LineOutcome::Field {
            counted: spec.counts,
        })
    }

    pub fn record(&self) -> &S::Record {
        &self.record
    }

    /// Integer field `key` of the current record, scaled by its table unit
    pub fn value(&self, key: &[u8]) -> Option<f32> {
        S::value(&self.record, key)
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn fields_since_terminator(&self) -> u8 {
        self.validity.fields_since_terminator
    }

    /// A block has been accepted and the latest one is younger than the
    /// staleness window
    pub fn is_data_valid(&self, now_ms: u32) -> bool {
        self.validity.is_fresh(now_ms, self.config.stale_after_ms)
    }

    /// Time of the last accepted block, 0 before the first
    pub fn last_update_ms(&self) -> u32 {
        self.validity.last_update_ms
    }

    pub fn age_ms(&self, now_ms: u32) -> Option<u32> {
        self.validity.age_ms(now_ms)
    }

    pub fn snapshot(&self, now_ms: u32) -> Snapshot<S::Record> {
        Snapshot {
            record: self.record.clone(),
            valid: self.is_data_valid(now_ms),
            last_update_ms: self.validity.last_update_ms,
            age_ms: self.age_ms(now_ms),
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub(crate) fn note_transport_error(&mut self) {
        bump(&mut self.stats.transport_errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LINE_CAPACITY;
    use crate::{BatteryMonitor, ChargeController, MpptRecord, ShuntRecord};

    type Shunt = FrameDecoder<BatteryMonitor>;
    type Mppt = FrameDecoder<ChargeController>;

    #[test]
    fn valid_block_then_staleness() {
        let mut d = Mppt::new();
        d.feed(b"V\t13000\r\nI\t1200\r\nVPV\t36000\r\nChecksum\t\x00\r\n", 10_000);
        assert!(d.is_data_valid(10_000));
        assert!(d.is_data_valid(14_999));
        assert!(!d.is_data_valid(15_000));
        assert!(!d.is_data_valid(60_000));
        assert_eq!(d.last_update_ms(), 10_000);
        assert_eq!(d.age_ms(12_500), Some(2_500));
    }

    #[test]
    fn one_field_short_never_validates() {
        let mut d = Shunt::new();
        d.feed(b"V\t12800\nI\t-500\nChecksum\t\n", 100);
        assert!(!d.is_data_valid(100));
        assert!(!d.validity().ever_valid());
        assert_eq!(d.fields_since_terminator(), 0);
        assert_eq!(d.age_ms(100), None);
    }

    #[test]
    fn counter_is_per_block() {
        let mut d = Shunt::new();
        d.feed(b"V\t1\nI\t1\n", 0);
        assert_eq!(d.fields_since_terminator(), 2);
        d.feed(b"Checksum\t\n", 0);
        assert_eq!(d.fields_since_terminator(), 0);
        d.feed(b"SOC\t1\n", 0);
        assert_eq!(d.fields_since_terminator(), 1);
        d.feed(b"Checksum\t\n", 0);
        assert!(!d.is_data_valid(0));
    }

    #[test]
    fn short_block_keeps_previous_validity() {
        // A block below the threshold does not demote the record; it only
        // stops refreshing it, so the staleness window still runs from the
        // last good block.
        let mut d = Shunt::new();
        d.feed(b"V\t12800\nI\t-500\nSOC\t900\nChecksum\t\n", 1_000);
        d.feed(b"V\t12700\nChecksum\t\n", 3_000);
        assert!(d.validity().ever_valid());
        assert!(d.is_data_valid(3_000));
        assert_eq!(d.last_update_ms(), 1_000);
        assert!(!d.is_data_valid(6_000));
        assert_eq!(d.record().voltage_mv, 12700);
    }

    #[test]
    fn stale_values_are_kept() {
        let mut d = Shunt::new();
        d.feed(b"V\t12800\nI\t-500\nSOC\t900\nChecksum\t\n", 0);
        assert!(!d.is_data_valid(9_000));
        assert_eq!(d.record().battery_voltage(), 12.8);
        assert_eq!(d.record().state_of_charge(), 90.0);
    }

    #[test]
    fn line_without_tab_changes_nothing() {
        let mut d = Shunt::new();
        d.feed(b"V\t1\n", 0);
        let before = d.record().clone();
        let outcome = d.decode_line(b"V 12800", 0);
        assert_eq!(outcome, Err(LineError::MissingTab));
        d.feed(b"SOC 500\n:A0002000148\n", 0);
        assert_eq!(d.record(), &before);
        assert_eq!(d.fields_since_terminator(), 1);
        assert_eq!(d.stats().malformed_lines, 2);
    }

    #[test]
    fn overlong_line_is_truncated_and_decoded() {
        let mut d = Shunt::new();
        let mut data = std::vec::Vec::from(&b"V\t12"[..]);
        data.extend(core::iter::repeat(b'3').take(LINE_CAPACITY * 2));
        data.extend_from_slice(b"\r\nI\t-500\r\n");
        d.feed(&data, 0);
        assert_eq!(d.stats().truncated_lines, 1);
        assert_eq!(d.record().voltage_mv, i32::MAX);
        assert_eq!(d.record().current_ma, -500);
        assert_eq!(d.fields_since_terminator(), 2);
    }

    #[test]
    fn round_trip_voltage_and_current() {
        let mut d = Shunt::new();
        d.feed(b"V\t12800\nI\t-500\nChecksum\t\n", 0);
        assert!((d.record().battery_voltage() - 12.8).abs() < 1e-6);
        assert!((d.record().battery_current() + 0.5).abs() < 1e-6);

        let mut m = Mppt::new();
        m.feed(b"V\t12800\nI\t-500\nChecksum\t\n", 0);
        assert!((m.record().battery_voltage() - 12.8).abs() < 1e-6);
        assert!((m.record().charge_current() + 0.5).abs() < 1e-6);
    }

    #[test]
    fn terminator_only_fires_on_line_feed() {
        let mut d = Shunt::new();
        d.feed(b"V\t1\nI\t1\nSOC\t1\nChecksum\t\x55", 0);
        assert!(!d.is_data_valid(0));
        assert_eq!(d.feed_byte(b'\r', 0), None);
        assert_eq!(d.feed_byte(b'\n', 0), Some(Ok(LineOutcome::BlockAccepted)));
        assert!(d.is_data_valid(0));
    }

    #[test]
    fn checksum_value_is_not_verified() {
        let mut d = Shunt::new();
        d.feed(b"V\t1\nI\t1\nSOC\t1\nChecksum\tgarbage\n", 0);
        assert!(d.is_data_valid(0));
    }

    #[test]
    fn checksum_byte_that_is_a_line_feed() {
        let mut d = Shunt::new();
        d.feed(b"\r\nV\t12800\r\nI\t-500\r\nSOC\t853\r\nChecksum\t\n\r\n", 100);
        assert!(d.is_data_valid(100));
        assert_eq!(d.stats().blocks_accepted, 1);

        d.feed(b"V\t12700\r\nI\t-400\r\nSOC\t852\r\nChecksum\t\n\r\n", 1_100);
        assert_eq!(d.stats().blocks_accepted, 2);
        assert_eq!(d.stats().malformed_lines, 0);
        assert_eq!(d.last_update_ms(), 1_100);
        assert_eq!(d.record().voltage_mv, 12700);
        assert_eq!(d.fields_since_terminator(), 0);
    }

    #[test]
    fn checksum_byte_that_is_a_carriage_return() {
        let mut d = Mppt::new();
        d.feed(b"\r\nV\t13250\r\nI\t3100\r\nVPV\t38120\r\nChecksum\t\r\r\n", 100);
        assert!(d.is_data_valid(100));
        assert_eq!(d.stats().blocks_accepted, 1);
        assert_eq!(d.stats().malformed_lines, 0);
        assert_eq!(d.fields_since_terminator(), 0);

        d.feed(b"V\t13000\r\n", 200);
        assert_eq!(d.record().battery_voltage_mv, 13000);
        assert_eq!(d.fields_since_terminator(), 1);
    }

    #[test]
    fn value_reads_through_the_table() {
        let mut d = Mppt::new();
        d.feed(b"V\t13250\nH20\t123\nH21\t310\nPID\t0xA060\n", 0);
        assert_eq!(d.value(b"V"), Some(13.25));
        assert!((d.value(b"H20").unwrap() - 1.23).abs() < 1e-6);
        assert_eq!(d.value(b"H21"), Some(310.0));
        assert_eq!(d.value(b"PID"), None);
        assert_eq!(d.value(b"FW"), None);
    }

    #[test]
    fn outcome_reports() {
        let mut d = Mppt::new();
        assert_eq!(d.decode_line(b"V\t1", 0), Ok(LineOutcome::Field { counted: true }));
        assert_eq!(d.decode_line(b"PPV\t1", 0), Ok(LineOutcome::Field { counted: false }));
        assert_eq!(d.decode_line(b"FW\t161", 0), Err(LineError::UnknownKey));
        assert_eq!(
            d.decode_line(b"Checksum\t", 0),
            Ok(LineOutcome::BlockRejected { fields: 1 })
        );
    }

    #[test]
    fn configurable_threshold_and_window() {
        let config = DecoderConfig {
            min_fields_for_valid: 1,
            stale_after_ms: 1_000,
        };
        let mut d = FrameDecoder::<BatteryMonitor>::with_config(config);
        d.feed(b"V\t1\nChecksum\t\n", 0);
        assert!(d.is_data_valid(999));
        assert!(!d.is_data_valid(1_000));
    }

    #[test]
    fn staleness_survives_clock_wrap() {
        let mut d = Shunt::new();
        let start = u32::MAX - 1_000;
        d.feed(b"V\t1\nI\t1\nSOC\t1\nChecksum\t\n", start);
        assert!(d.is_data_valid(2_000));
        assert!(!d.is_data_valid(4_000));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut d = Mppt::new();
        d.feed(b"V\t13000\nI\t1\nVPV\t1\nChecksum\t\n", 500);
        let snap = d.snapshot(1_500);
        d.feed(b"V\t0\n", 1_600);
        assert!(snap.valid);
        assert_eq!(snap.age_ms, Some(1_000));
        assert_eq!(snap.last_update_ms, 500);
        assert_eq!(snap.record.battery_voltage_mv, 13000);
        assert_eq!(d.record().battery_voltage_mv, 0);
    }

    #[test]
    fn fresh_decoder_defaults() {
        let d = Shunt::new();
        assert_eq!(d.record(), &ShuntRecord::default());
        assert_eq!(d.last_update_ms(), 0);
        assert!(!d.is_data_valid(0));
        assert_eq!(Mppt::default().record(), &MpptRecord::default());
        assert_eq!(d.config(), &DecoderConfig::default());
    }
}
