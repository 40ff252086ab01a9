use std::{cell::Cell, collections::VecDeque, convert::Infallible, env, fmt, fs, process};

use embedded_hal_nb::serial::{ErrorType, Read};
use vedirect_decoder::{BatteryMonitor, ChargeController, Schema, Snapshot, StatusTicker, VeDirect};

/// VE.Direct line rate, 8N1 so ten bits per byte
const VEDIRECT_BAUD: u64 = 19_200;
/// Bytes handed over per poll, roughly a UART receive FIFO
const RX_CHUNK: usize = 32;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} <mppt|shunt> <capture-file>", args[0]);
        process::exit(2);
    }

    let data = match fs::read(&args[2]) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}: {}", args[2], e);
            process::exit(1);
        }
    };

    match args[1].as_str() {
        "mppt" => replay::<ChargeController>(&data),
        "shunt" => replay::<BatteryMonitor>(&data),
        other => {
            eprintln!("unknown device {:?}, expected mppt or shunt", other);
            process::exit(2);
        }
    }
}

/// Time the link needs to deliver `bytes`
fn link_time_ms(bytes: u64) -> u32 {
    (bytes * 10 * 1000 / VEDIRECT_BAUD) as u32
}

/// Feed a capture through a port in receive-FIFO sized pieces, printing the
/// status summary on the usual interval of simulated link time.
fn replay<S: Schema>(data: &[u8])
where
    Snapshot<S::Record>: fmt::Display,
{
    let now = Cell::new(0u32);
    let mut port = VeDirect::<S, _, _>::new(ReadBuffer::default(), || now.get());
    let mut ticker = StatusTicker::default();
    let mut delivered = 0u64;

    for chunk in data.chunks(RX_CHUNK) {
        port.rx_mut().0.extend(chunk);
        delivered += chunk.len() as u64;
        now.set(link_time_ms(delivered));
        port.update();
        if ticker.due(now.get()) {
            println!("--- {} ms ---\n{}", now.get(), port.snapshot());
        }
    }

    println!("--- end of capture, {} ms ---\n{}", now.get(), port.snapshot());
    println!("{:?}", port.stats());
}

#[derive(Debug, Default)]
struct ReadBuffer(VecDeque<u8>);

impl ErrorType for ReadBuffer {
    type Error = Infallible;
}

impl Read for ReadBuffer {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.0.pop_front().ok_or(nb::Error::WouldBlock)
    }
}
