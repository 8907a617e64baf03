//! Byte-level port abstraction for the serial session loops.
//!
//! [`BusPort`] is the small surface the loops actually need: polled
//! reads, blocking writes, buffer control and the modem lines used for
//! the slow-init wake-up. [`SerialBusPort`] backs it with a real serial
//! port; [`MockPort`] is the scripted in-memory double the test suite
//! drives the loops with.

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::config::ConceptType;
use crate::error::Result;

/// Poll interval for the byte-availability loops.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Transport endpoint the serial loops talk through.
pub trait BusPort: Send {
    /// Bytes buffered for reading.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Reads whatever is buffered, up to `buf.len()` bytes, without
    /// blocking for more. Returns 0 when the line is quiet.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes a complete telegram.
    fn write_all_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Drops all buffered input.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Switches the line parity (Concept3 init dance).
    fn set_parity(&mut self, parity: Parity) -> io::Result<()>;

    /// Drives DTR, which mirrors the simulated ignition.
    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    /// CTS level, sampled during the wake-up when a K-line responder
    /// is attached.
    fn read_cts(&mut self) -> io::Result<bool>;

    /// DSR level, sampled during the wake-up otherwise.
    fn read_dsr(&mut self) -> io::Result<bool>;
}

/// A [`serialport`] port configured for one concept.
pub struct SerialBusPort {
    port: Box<dyn SerialPort>,
}

impl SerialBusPort {
    /// Opens and configures a port with the concept's fixed baud rate
    /// and parity, 8 data bits, one stop bit, no flow control.
    pub fn open(name: &str, concept: ConceptType) -> Result<Self> {
        let (baud_rate, parity) = concept.serial_params();
        let mut port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(parity)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(POLL_INTERVAL)
            .open()?;
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;
        Ok(SerialBusPort { port })
    }
}

impl BusPort for SerialBusPort {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.bytes_to_read()? == 0 {
            return Ok(0);
        }
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_parity(&mut self, parity: Parity) -> io::Result<()> {
        self.port
            .set_parity(parity)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.port
            .write_data_terminal_ready(level)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn read_cts(&mut self) -> io::Result<bool> {
        self.port
            .read_clear_to_send()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn read_dsr(&mut self) -> io::Result<bool> {
        self.port
            .read_data_set_ready()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Scripted in-memory port: the test queues inbound bytes, the loop's
/// writes are captured for inspection.
#[derive(Debug, Default)]
pub struct MockPort {
    /// Bytes waiting to be read by the loop.
    pub rx: VecDeque<u8>,
    /// Everything the loop wrote, in order.
    pub tx: Vec<u8>,
    /// When set, every write is fed back into `rx` (wire echo).
    pub loopback: bool,
    /// Simulated CTS/DSR level for the wake-up sampling.
    pub wakeup_line: bool,
    /// Parity switches, recorded in order.
    pub parity_log: Vec<Parity>,
}

impl MockPort {
    /// Queues bytes for the loop to read.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl BusPort for MockPort {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.rx.len())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[count] = b;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx.extend_from_slice(data);
        if self.loopback {
            self.rx.extend(data.iter().copied());
        }
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> io::Result<()> {
        self.parity_log.push(parity);
        Ok(())
    }

    fn set_dtr(&mut self, _level: bool) -> io::Result<()> {
        Ok(())
    }

    fn read_cts(&mut self) -> io::Result<bool> {
        Ok(self.wakeup_line)
    }

    fn read_dsr(&mut self) -> io::Result<bool> {
        Ok(self.wakeup_line)
    }
}

/// Reads exactly `buf.len()` bytes, giving up once the line stays
/// quiet longer than `gap` between bytes (or before the first one).
pub(crate) fn read_exact_gap(
    port: &mut dyn BusPort,
    buf: &mut [u8],
    gap: Duration,
) -> io::Result<bool> {
    let mut filled = 0;
    let mut last_progress = Instant::now();
    while filled < buf.len() {
        let n = port.read_available(&mut buf[filled..])?;
        if n > 0 {
            filled += n;
            last_progress = Instant::now();
            continue;
        }
        if last_progress.elapsed() > gap {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(true)
}

/// Reads exactly `buf.len()` bytes with a separate deadline for the
/// first byte; used by the block-exchange handshakes.
pub(crate) fn read_exact_timeout(
    port: &mut dyn BusPort,
    buf: &mut [u8],
    first_byte: Duration,
    gap: Duration,
) -> io::Result<bool> {
    let started = Instant::now();
    while port.bytes_to_read()? == 0 {
        if started.elapsed() > first_byte {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
    read_exact_gap(port, buf, gap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_exact_gap_collects_queued_bytes() {
        let mut port = MockPort::default();
        port.push_rx(&[0x82, 0x38, 0xF1]);
        let mut buf = [0u8; 3];
        assert!(read_exact_gap(&mut port, &mut buf, Duration::from_millis(5)).unwrap());
        assert_eq!(buf, [0x82, 0x38, 0xF1]);
    }

    #[test]
    fn test_read_exact_gap_times_out_short() {
        let mut port = MockPort::default();
        port.push_rx(&[0x82]);
        let mut buf = [0u8; 3];
        assert!(!read_exact_gap(&mut port, &mut buf, Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_read_exact_timeout_waits_for_first_byte() {
        let mut port = MockPort::default();
        let mut buf = [0u8; 1];
        assert!(!read_exact_timeout(
            &mut port,
            &mut buf,
            Duration::from_millis(5),
            Duration::from_millis(5)
        )
        .unwrap());

        port.push_rx(&[0x55]);
        assert!(read_exact_timeout(
            &mut port,
            &mut buf,
            Duration::from_millis(5),
            Duration::from_millis(5)
        )
        .unwrap());
        assert_eq!(buf[0], 0x55);
    }

    #[test]
    fn test_mock_loopback_echoes_writes() {
        let mut port = MockPort {
            loopback: true,
            ..MockPort::default()
        };
        port.write_all_bytes(&[0x01, 0x02]).unwrap();
        assert_eq!(port.tx, vec![0x01, 0x02]);
        assert_eq!(port.rx, VecDeque::from(vec![0x01, 0x02]));
    }
}
