use embedded_hal_nb::serial::{Error, ErrorKind, ErrorType, Read};

use crate::Clock;
use crate::decoder::{DecodeStats, DecoderConfig, FrameDecoder, Snapshot};
use crate::mppt::ChargeController;
use crate::schema::Schema;
use crate::shunt::BatteryMonitor;

/// A VE.Direct text port: a serial receiver, a clock and the decoder fed
/// from them.
///
/// `Rx` may be the UART itself or `&mut` to it when the caller keeps
/// ownership.
#[derive(Debug)]
pub struct VeDirect<S: Schema, Rx: Read<u8>, C: Clock> {
    rx: Rx,
    clock: C,
    decoder: FrameDecoder<S>,
}

pub type MpptPort<Rx, C> = VeDirect<ChargeController, Rx, C>;
pub type ShuntPort<Rx, C> = VeDirect<BatteryMonitor, Rx, C>;

impl<S: Schema, Rx: Read<u8>, C: Clock> VeDirect<S, Rx, C> {
    pub fn new(rx: Rx, clock: C) -> VeDirect<S, Rx, C> {
        Self::with_config(rx, clock, DecoderConfig::default())
    }

    pub fn with_config(rx: Rx, clock: C, config: DecoderConfig) -> VeDirect<S, Rx, C> {
        log::info!("{}: initialized, waiting for data", S::NAME);
        VeDirect {
            rx,
            clock,
            decoder: FrameDecoder::with_config(config),
        }
    }

    /// Decode everything the receiver already holds. Call once per loop.
    ///
    /// Returns as soon as the receiver would block. A receive error ends this
    /// pass; it is logged and counted, and the next call carries on.
    pub fn update(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut consumed = 0;
        loop {
            match self.rx.read() {
                Ok(byte) => {
                    self.decoder.feed_byte(byte, now);
                    consumed += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => {
                    log::warn!("{}: serial receive error {:?}", S::NAME, e.kind());
                    self.decoder.note_transport_error();
                    break;
                }
            }
        }
        consumed
    }

    pub fn record(&self) -> &S::Record {
        self.decoder.record()
    }

    pub fn is_data_valid(&self) -> bool {
        self.decoder.is_data_valid(self.clock.now_ms())
    }

    pub fn last_update_ms(&self) -> u32 {
        self.decoder.last_update_ms()
    }

    /// Milliseconds since the last accepted block
    pub fn data_age_ms(&self) -> Option<u32> {
        self.decoder.age_ms(self.clock.now_ms())
    }

    pub fn snapshot(&self) -> Snapshot<S::Record> {
        self.decoder.snapshot(self.clock.now_ms())
    }

    pub fn stats(&self) -> &DecodeStats {
        self.decoder.stats()
    }

    pub fn decoder(&self) -> &FrameDecoder<S> {
        &self.decoder
    }

    pub fn rx_mut(&mut self) -> &mut Rx {
        &mut self.rx
    }

    /// Give back the receiver and clock
    pub fn release(self) -> (Rx, C) {
        (self.rx, self.clock)
    }
}

/// Error from an `embedded_io` reader, seen as a serial error
#[derive(Debug)]
pub struct IoErrorShim<E: embedded_io::Error>(pub E);

impl<E: embedded_io::Error> Error for IoErrorShim<E> {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            embedded_io::ErrorKind::OutOfMemory => ErrorKind::Overrun,
            embedded_io::ErrorKind::InvalidData => ErrorKind::FrameFormat,
            _ => ErrorKind::Other,
        }
    }
}

impl<E: embedded_io::Error> From<E> for IoErrorShim<E> {
    fn from(value: E) -> Self {
        IoErrorShim(value)
    }
}

/// Presents an `embedded_io` reader as a non-blocking byte receiver.
///
/// Bytes are only read when `read_ready` says the read will not block.
#[derive(Debug)]
pub struct IoRx<T>(pub T);

impl<T: embedded_io::ErrorType> ErrorType for IoRx<T> {
    type Error = IoErrorShim<T::Error>;
}

impl<T: embedded_io::Read + embedded_io::ReadReady> Read<u8> for IoRx<T> {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let ready = embedded_io::ReadReady::read_ready(&mut self.0).map_err(|e| nb::Error::Other(IoErrorShim::from(e)))?;
        if !ready {
            return Err(nb::Error::WouldBlock);
        }
        let mut byte = [0; 1];
        match embedded_io::Read::read(&mut self.0, &mut byte) {
            Ok(0) => Err(nb::Error::WouldBlock),
            Ok(_) => Ok(byte[0]),
            Err(e) => Err(nb::Error::Other(IoErrorShim(e))),
        }
    }
}
