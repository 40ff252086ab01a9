use heapless::Vec;

use crate::line::LINE_CAPACITY;

/// Separates a key from its value on a VE.Direct text line
pub(crate) const FIELD_SEPARATOR: u8 = b'\t';

/// Literal a flag field must carry to read as set. Case-sensitive.
pub(crate) const FLAG_ON: &[u8] = b"ON";

/// Capacity of identification and other text fields. A value never outgrows
/// the line it arrived on.
pub const TEXT_CAPACITY: usize = LINE_CAPACITY;

/// Text value bytes exactly as received
pub type Text = Vec<u8, TEXT_CAPACITY>;

/// One `KEY<TAB>VALUE` pair borrowed from a completed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Split a line on its first tab. Lines without one are not fields.
pub fn split_field(line: &[u8]) -> Option<Field<'_>> {
    let tab = line.iter().position(|b| *b == FIELD_SEPARATOR)?;
    Some(Field {
        key: &line[..tab],
        value: &line[tab + 1..],
    })
}

/// Best-effort signed integer parse.
///
/// Leading whitespace and one sign are accepted, then digits are consumed
/// until the first non-digit. Text with no leading digits yields 0 and values
/// outside the `i32` range saturate.
pub fn parse_int(value: &[u8]) -> i32 {
    let mut rest = value;
    while let [b, tail @ ..] = rest {
        if !b.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }

    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };

    let mut acc: i32 = 0;
    for b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = (b - b'0') as i32;
        acc = if negative {
            acc.saturating_mul(10).saturating_sub(digit)
        } else {
            acc.saturating_mul(10).saturating_add(digit)
        };
    }
    acc
}

pub(crate) fn parse_flag(value: &[u8]) -> bool {
    value == FLAG_ON
}

/// Replace `dst` with `value`, byte for byte.
pub(crate) fn copy_text<const N: usize>(dst: &mut Vec<u8, N>, value: &[u8]) {
    dst.clear();
    let kept = &value[..value.len().min(N)];
    if dst.extend_from_slice(kept).is_err() {
        log::warn!("text value of {} bytes dropped", value.len());
    }
}

/// Longest UTF-8 prefix of a stored text value
pub fn text_str(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
    }
}
