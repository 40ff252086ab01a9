//! Serial sources for tests.

use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_hal_nb::serial::{ErrorKind, ErrorType, Read};

/// Receiver backed by a queue the test fills as it goes
#[derive(Debug, Default)]
pub struct ReadBuffer(pub VecDeque<u8>);

impl ReadBuffer {
    pub fn new() -> ReadBuffer {
        ReadBuffer(VecDeque::new())
    }

    pub fn from_slice(data: &[u8]) -> ReadBuffer {
        ReadBuffer(data.iter().copied().collect())
    }

    pub fn push(&mut self, data: &[u8]) {
        self.0.extend(data);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl ErrorType for ReadBuffer {
    type Error = Infallible;
}

impl Read for ReadBuffer {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.0.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Fails once with an overrun after `fail_at` bytes, then keeps going
#[derive(Debug)]
pub struct FlakyRx {
    data: VecDeque<u8>,
    fail_at: Option<usize>,
    served: usize,
}

impl FlakyRx {
    pub fn new(data: &[u8], fail_at: usize) -> FlakyRx {
        FlakyRx {
            data: data.iter().copied().collect(),
            fail_at: Some(fail_at),
            served: 0,
        }
    }
}

impl ErrorType for FlakyRx {
    type Error = ErrorKind;
}

impl Read for FlakyRx {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if self.fail_at == Some(self.served) {
            self.fail_at = None;
            return Err(nb::Error::Other(ErrorKind::Overrun));
        }
        let b = self.data.pop_front().ok_or(nb::Error::WouldBlock)?;
        self.served += 1;
        Ok(b)
    }
}

/// `embedded_io` reader over a fixed slice
#[derive(Debug)]
pub struct SliceReader {
    data: VecDeque<u8>,
}

impl SliceReader {
    pub fn new(data: &[u8]) -> SliceReader {
        SliceReader {
            data: data.iter().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl embedded_io::ErrorType for SliceReader {
    type Error = Infallible;
}

impl embedded_io::Read for SliceReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.data.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for SliceReader {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.data.is_empty())
    }
}
