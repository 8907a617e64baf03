//! Slow-init concepts: the ISO9141 block exchange and the Concept3
//! one-way broadcast.
//!
//! Both start with a 5-baud wake-up the simulator samples bit by bit
//! on a modem line, followed by the 0x55 sync byte and the configured
//! init bytes. ISO9141 then alternates blocks with the tester, each
//! byte acknowledged with its complement; Concept3 switches to even
//! parity and streams its telegram list until the tester talks back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serialport::Parity;
use tracing::{debug, info};

use crate::codec::checksum_xor;
use crate::config::AdapterFlags;
use crate::error::Result;
use crate::sim::EcuSimulator;

use super::channel::{read_exact_timeout, BusPort};
use super::serial::send_wire;

/// Timeout for one byte of a block exchange.
const BLOCK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Sample time per wake-up bit (5 baud).
const WAKEUP_BIT_TIME: Duration = Duration::from_millis(200);

/// Pause between two Concept3 broadcast telegrams.
const BROADCAST_GAP: Duration = Duration::from_millis(200);

/// Samples the 5-baud wake-up address: start bit on the modem line,
/// then 8 data bits and a stop bit, all inverted. `None` means the
/// stop flag was raised or the stop bit did not verify.
fn receive_wake_up(
    port: &mut dyn BusPort,
    flags: AdapterFlags,
    ignition_on: bool,
    stop: &AtomicBool,
) -> Result<Option<u8>> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        port.set_dtr(ignition_on)?;
        let line = if flags.kline_responder {
            port.read_cts()?
        } else {
            port.read_dsr()?
        };
        if line {
            // start bit
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    thread::sleep(Duration::from_millis(100));

    let mut value = 0u16;
    for bit in 0..9 {
        thread::sleep(WAKEUP_BIT_TIME);
        let line = if flags.kline_responder {
            port.read_cts()?
        } else {
            port.read_dsr()?
        };
        if !line {
            value |= 1 << bit;
        }
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
    }
    if value & 0x100 == 0 {
        debug!("wake-up stop bit missing");
        return Ok(None);
    }
    thread::sleep(Duration::from_millis(100));
    Ok(Some(value as u8))
}

/// Runs the ISO9141 session until the tester goes quiet or the stop
/// flag is raised; the caller restarts it from the top.
pub(super) fn run_iso9141(
    port: &mut dyn BusPort,
    sim: &mut EcuSimulator,
    flags: AdapterFlags,
    stop: &AtomicBool,
) -> Result<()> {
    // slow init handshake
    loop {
        let address =
            match receive_wake_up(port, flags, sim.toggles().ignition_on(), stop)? {
                Some(address) => address,
                None => return Ok(()),
            };
        debug!("wake-up address {:02X}", address);
        let wakeup = sim.wakeup().to_vec();
        if wakeup.len() > 1 && address != wakeup[0] {
            debug!("wake-up address mismatch");
            continue;
        }

        thread::sleep(Duration::from_millis(100));
        send_wire(port, &[0x55], flags)?;

        thread::sleep(Duration::from_millis(100));
        let config_bytes = if wakeup.len() > 1 {
            wakeup[1..].to_vec()
        } else {
            vec![0x08, 0x08]
        };
        send_wire(port, &config_bytes, flags)?;

        let mut ack = [0u8; 1];
        if !read_exact_timeout(
            port,
            &mut ack,
            Duration::from_millis(70),
            Duration::from_millis(70),
        )? {
            debug!("no init acknowledge");
            continue;
        }
        let expected = config_bytes.get(1).copied().unwrap_or(config_bytes[0]);
        if !ack[0] == expected {
            break;
        }
        debug!("bad init acknowledge {:02X}", ack[0]);
    }
    info!("slow init complete, entering block exchange");

    let mut block_counter: u8 = 1;
    let mut pending: Option<Vec<Vec<u8>>> = None;
    let mut pending_index = 0;
    let mut startup_index = 0;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        // a queued multi-block response goes out one block per
        // exchange; otherwise the startup telegrams, then plain ACKs
        let mut block = match pending.take() {
            Some(blocks) => {
                let block = blocks[pending_index].clone();
                pending_index += 1;
                if pending_index < blocks.len() {
                    pending = Some(blocks);
                }
                block
            }
            None if startup_index < sim.response_only().len() => {
                let block = sim.response_only()[startup_index].clone();
                startup_index += 1;
                block
            }
            None => vec![0x03, 0x00, 0x09],
        };
        if block.len() > 1 {
            block[1] = block_counter;
        }
        block_counter = block_counter.wrapping_add(1);

        if !send_block(port, &block, flags, stop)? {
            debug!("block send failed");
            return Ok(());
        }

        let received = match receive_block(port, flags)? {
            Some(received) => received,
            None => {
                debug!("block receive failed");
                return Ok(());
            }
        };
        if received.get(1) != Some(&block_counter) {
            debug!("unexpected block counter {:?}", received.get(1));
        }
        block_counter = block_counter.wrapping_add(1);

        let length = received[0] as usize;
        let command = received.get(2).copied().unwrap_or(0x09);
        if command != 0x09 {
            match sim.lookup_blocks(&received[..length.min(received.len())]) {
                Some(blocks) => {
                    pending = Some(blocks);
                    pending_index = 0;
                }
                None => debug!("no table entry for block: {:02X?}", received),
            }
        }
    }
}

/// Sends one block byte by byte, each byte acknowledged by its
/// complement, then the 0x03 terminator.
fn send_block(
    port: &mut dyn BusPort,
    block: &[u8],
    flags: AdapterFlags,
    stop: &AtomicBool,
) -> Result<bool> {
    let length = block[0] as usize;
    for &byte in block.iter().take(length.min(block.len())) {
        if stop.load(Ordering::Relaxed) {
            return Ok(false);
        }
        send_wire(port, &[byte], flags)?;
        let mut ack = [0u8; 1];
        if !read_exact_timeout(port, &mut ack, BLOCK_TIMEOUT, BLOCK_TIMEOUT)? {
            return Ok(false);
        }
        if !ack[0] != byte {
            debug!("bad byte acknowledge {:02X}", ack[0]);
            return Ok(false);
        }
    }
    send_wire(port, &[0x03], flags)?;
    Ok(true)
}

/// Receives one block, acknowledging every byte with its complement;
/// the returned vector ends with the 0x03 terminator.
fn receive_block(port: &mut dyn BusPort, flags: AdapterFlags) -> Result<Option<Vec<u8>>> {
    let mut byte = [0u8; 1];
    if !read_exact_timeout(port, &mut byte, BLOCK_TIMEOUT, BLOCK_TIMEOUT)? {
        return Ok(None);
    }
    let length = byte[0] as usize;
    let mut block = vec![byte[0]];
    for _ in 0..length {
        send_wire(port, &[!block[block.len() - 1]], flags)?;
        if !read_exact_timeout(port, &mut byte, BLOCK_TIMEOUT, BLOCK_TIMEOUT)? {
            return Ok(None);
        }
        block.push(byte[0]);
    }
    if block[length] != 0x03 {
        debug!("block terminator invalid {:02X}", block[length]);
        return Ok(None);
    }
    Ok(Some(block))
}

/// Runs the Concept3 session: slow init, then broadcast the
/// response-only list until inbound traffic aborts it.
pub(super) fn run_concept3(
    port: &mut dyn BusPort,
    sim: &mut EcuSimulator,
    flags: AdapterFlags,
    stop: &AtomicBool,
) -> Result<()> {
    loop {
        port.set_parity(Parity::None)?;
        let address =
            match receive_wake_up(port, flags, sim.toggles().ignition_on(), stop)? {
                Some(address) => address,
                None => return Ok(()),
            };
        debug!("wake-up address {:02X}", address);
        let wakeup = sim.wakeup().to_vec();
        if wakeup.len() > 1 && address != wakeup[0] {
            debug!("wake-up address mismatch");
            continue;
        }

        thread::sleep(Duration::from_millis(100));
        send_wire(port, &[0x55], flags)?;

        thread::sleep(Duration::from_millis(10));
        if wakeup.len() > 1 {
            send_wire(port, &wakeup[1..], flags)?;
            thread::sleep(Duration::from_millis(10));
        }
        port.set_parity(Parity::Even)?;
        thread::sleep(Duration::from_millis(200));
        break;
    }
    info!("slow init complete, broadcasting");

    loop {
        for telegram in sim.response_only().to_vec() {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            if port.bytes_to_read()? > 0 {
                debug!("inbound traffic, aborting broadcast");
                thread::sleep(Duration::from_millis(100));
                return Ok(());
            }
            if telegram.is_empty() {
                continue;
            }
            let mut out = telegram.clone();
            let end = out.len() - 1;
            out[end] = checksum_xor(&out[..end]);
            send_wire(port, &out, flags)?;
            thread::sleep(BROADCAST_GAP);
        }
    }
}
