use heapless::Vec;

/// Longest line kept. Anything past this is dropped until the next line feed.
pub const LINE_CAPACITY: usize = 64;

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';

pub type LineBuf = Vec<u8, LINE_CAPACITY>;

/// A completed, non-empty line without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub bytes: LineBuf,
    /// Bytes were dropped because the line outgrew `LINE_CAPACITY`
    pub truncated: bool,
}

/// Accumulates bytes into lines. Carriage returns are dropped and empty
/// lines never surface.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: LineBuf,
    truncated: bool,
}

impl LineAssembler {
    pub fn new() -> LineAssembler {
        LineAssembler {
            buf: Vec::new(),
            truncated: false,
        }
    }

    /// Push one byte. Returns the finished line when `byte` terminates a
    /// non-empty one, leaving the assembler empty for the next.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            LF => {
                if self.buf.is_empty() {
                    return None;
                }
                let line = Line {
                    bytes: core::mem::take(&mut self.buf),
                    truncated: self.truncated,
                };
                self.truncated = false;
                Some(line)
            }
            CR => None,
            b => {
                if self.buf.push(b).is_err() {
                    self.truncated = true;
                }
                None
            }
        }
    }

    /// Bytes of the line currently being assembled
    #[cfg(test)]
    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf
    }
}
