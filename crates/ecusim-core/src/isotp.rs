//! ISO-TP (ISO 15765-2 style) segmentation over classic CAN frames.
//!
//! Telegrams ride on ids `0x600 + sender address`; data byte 0 carries the
//! peer address. Payloads up to 6 bytes travel as a Single Frame, longer
//! ones as a First Frame followed by Consecutive Frames gated by Flow
//! Control.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::codec::Frame;

/// Base CAN id; the low byte is the sender address.
pub const CAN_ID_BASE: u16 = 0x600;

/// Inactivity deadline for one reassembly or one Flow Control wait.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Minimum gap between two outgoing telegrams.
const SEND_GAP: Duration = Duration::from_millis(10);

/// Poll interval while waiting for bus traffic.
const POLL_WAIT: Duration = Duration::from_millis(10);

/// One classic CAN frame, padded to 8 data bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// 11-bit identifier.
    pub id: u16,
    len: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Builds a frame from up to 8 data bytes.
    pub fn new(id: u16, bytes: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let len = bytes.len().min(8);
        data[..len].copy_from_slice(&bytes[..len]);
        CanFrame {
            id,
            len: len as u8,
            data,
        }
    }

    /// Data bytes actually carried.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Blocking single-frame CAN I/O with a bounded receive wait.
pub trait CanIo: Send {
    /// Writes one frame.
    fn send(&mut self, frame: &CanFrame) -> io::Result<()>;
    /// Reads one frame, returning `None` when nothing arrives in time.
    /// A zero timeout only drains already-buffered frames.
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<CanFrame>>;
}

impl<C: CanIo + ?Sized> CanIo for Box<C> {
    fn send(&mut self, frame: &CanFrame) -> io::Result<()> {
        (**self).send(frame)
    }

    fn recv(&mut self, timeout: Duration) -> io::Result<Option<CanFrame>> {
        (**self).recv(timeout)
    }
}

/// ISO-TP endpoint over one CAN handle.
pub struct IsoTpChannel<C: CanIo> {
    io: C,
    /// Block size advertised in outgoing Flow Control (0 = unlimited).
    block_size: u8,
    /// Separation time advertised in outgoing Flow Control.
    sep_time: u8,
    last_send: Option<Instant>,
}

struct Reassembly {
    source: u8,
    target: u8,
    buffer: Vec<u8>,
    expected_len: usize,
    block_count: u8,
    fc_count: u8,
    last_progress: Instant,
}

impl<C: CanIo> IsoTpChannel<C> {
    /// Wraps a CAN handle with default flow-control parameters
    /// (unlimited block size, no separation time).
    pub fn new(io: C) -> Self {
        IsoTpChannel {
            io,
            block_size: 0,
            sep_time: 0,
            last_send: None,
        }
    }

    /// Overrides the advertised flow-control parameters.
    pub fn with_flow_control(mut self, block_size: u8, sep_time: u8) -> Self {
        self.block_size = block_size;
        self.sep_time = sep_time;
        self
    }

    /// Releases the underlying CAN handle.
    pub fn into_inner(self) -> C {
        self.io
    }

    fn send_flow_control(&mut self, source: u8, target: u8) -> io::Result<()> {
        let fc = CanFrame::new(
            CAN_ID_BASE + target as u16,
            &[source, 0x30, self.block_size, self.sep_time],
        );
        self.io.send(&fc)
    }

    /// Receives one reassembled telegram.
    ///
    /// Returns quickly with `None` when the bus is idle so the caller can
    /// observe its stop flag; an unfinished reassembly is abandoned after
    /// [`RECEIVE_TIMEOUT`] without progress. Frames with the wrong address
    /// pair, an out-of-order sequence number or a duplicate First Frame
    /// are dropped without touching the deadline.
    pub fn receive(&mut self) -> io::Result<Option<Frame>> {
        let mut state: Option<Reassembly> = None;
        loop {
            let msg = match self.io.recv(POLL_WAIT)? {
                Some(msg) => msg,
                None => match &state {
                    None => return Ok(None),
                    Some(st) => {
                        if st.last_progress.elapsed() > RECEIVE_TIMEOUT {
                            warn!("reassembly timed out after {} bytes", st.buffer.len());
                            return Ok(None);
                        }
                        continue;
                    }
                },
            };
            let data = msg.data();
            if data.len() < 2 || msg.id & 0xFF00 != CAN_ID_BASE {
                continue;
            }
            let frame_type = data[1] >> 4;
            match &mut state {
                None => {
                    let source = (msg.id & 0xFF) as u8;
                    let target = data[0];
                    match frame_type {
                        0x0 => {
                            // single frame
                            let len = (data[1] & 0x0F) as usize;
                            if len > data.len() - 2 {
                                continue;
                            }
                            let payload = data[2..2 + len].to_vec();
                            return Ok(Some(Frame::new(target, source, payload)));
                        }
                        0x1 => {
                            // first frame
                            if data.len() < 8 {
                                continue;
                            }
                            let expected_len =
                                (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
                            let mut buffer = Vec::with_capacity(expected_len);
                            buffer.extend_from_slice(&data[3..8]);
                            self.send_flow_control(source, target)?;
                            state = Some(Reassembly {
                                source,
                                target,
                                buffer,
                                expected_len,
                                block_count: 1,
                                fc_count: self.block_size,
                                last_progress: Instant::now(),
                            });
                        }
                        _ => continue,
                    }
                }
                Some(st) => {
                    if frame_type != 0x2 {
                        // duplicate first frames and stray singles are dropped
                        continue;
                    }
                    if st.source != (msg.id & 0xFF) as u8 || st.target != data[0] {
                        continue;
                    }
                    if data[1] & 0x0F != st.block_count & 0x0F {
                        debug!(
                            "dropping consecutive frame with sequence {:#x}, expected {:#x}",
                            data[1] & 0x0F,
                            st.block_count & 0x0F
                        );
                        continue;
                    }
                    let remaining = st.expected_len - st.buffer.len();
                    let len = remaining.min(6);
                    if len > data.len() - 2 {
                        continue;
                    }
                    st.buffer.extend_from_slice(&data[2..2 + len]);
                    st.block_count = st.block_count.wrapping_add(1);
                    st.last_progress = Instant::now();

                    if st.fc_count > 0 && st.buffer.len() < st.expected_len {
                        st.fc_count -= 1;
                        if st.fc_count == 0 {
                            st.fc_count = self.block_size;
                            let (source, target) = (st.source, st.target);
                            self.send_flow_control(source, target)?;
                        }
                    }
                }
            }
            if let Some(st) = &state {
                if st.buffer.len() >= st.expected_len {
                    let st = match state.take() {
                        Some(st) => st,
                        None => unreachable!(),
                    };
                    return Ok(Some(Frame::new(st.target, st.source, st.buffer)));
                }
            }
        }
    }

    /// Sends one telegram, segmenting when the payload exceeds 6 bytes.
    ///
    /// Returns `Ok(false)` when the peer never answers the First Frame or
    /// aborts via Flow Control; the session treats that as a dropped
    /// telegram, not a transport failure.
    pub fn send(&mut self, frame: &Frame) -> io::Result<bool> {
        let id = CAN_ID_BASE + frame.source as u16;
        let peer = frame.target;

        if let Some(last) = self.last_send {
            if last.elapsed() < SEND_GAP {
                thread::sleep(SEND_GAP);
            }
        }
        // stale bus traffic must not be mistaken for flow control
        while self.io.recv(Duration::ZERO)?.is_some() {}

        let payload = &frame.payload;
        if payload.len() <= 6 {
            let mut data = vec![peer, payload.len() as u8];
            data.extend_from_slice(payload);
            self.io.send(&CanFrame::new(id, &data))?;
            self.last_send = Some(Instant::now());
            return Ok(true);
        }

        let mut data = vec![
            peer,
            0x10 | ((payload.len() >> 8) & 0x0F) as u8,
            payload.len() as u8,
        ];
        data.extend_from_slice(&payload[..5]);
        self.io.send(&CanFrame::new(id, &data))?;

        let mut offset = 5;
        let mut block_count = 1u8;
        let mut wait_for_fc = true;
        let mut block_size = 0u8;
        let mut sep_time = 0u8;
        loop {
            if wait_for_fc {
                match self.wait_flow_control(frame.source, peer)? {
                    Some((bs, st)) => {
                        block_size = bs;
                        sep_time = st;
                    }
                    None => return Ok(false),
                }
            }
            let len = (payload.len() - offset).min(6);
            let mut data = vec![peer, 0x20 | (block_count & 0x0F)];
            data.extend_from_slice(&payload[offset..offset + len]);
            self.io.send(&CanFrame::new(id, &data))?;
            offset += len;
            block_count = block_count.wrapping_add(1);
            if offset >= payload.len() {
                break;
            }

            wait_for_fc = false;
            if block_size > 0 {
                if block_size == 1 {
                    wait_for_fc = true;
                }
                block_size -= 1;
            }
            if !wait_for_fc && sep_time > 0 {
                thread::sleep(Duration::from_millis(sep_time as u64));
            }
        }
        self.last_send = Some(Instant::now());
        Ok(true)
    }

    /// Waits for a Flow Control frame from the peer, looping on Wait
    /// status. `None` means timeout or abort.
    fn wait_flow_control(&mut self, source: u8, peer: u8) -> io::Result<Option<(u8, u8)>> {
        loop {
            let started = Instant::now();
            let fc = loop {
                if let Some(msg) = self.io.recv(POLL_WAIT)? {
                    let data = msg.data();
                    if data.len() >= 4
                        && msg.id & 0xFF00 == CAN_ID_BASE
                        && (msg.id & 0xFF) as u8 == peer
                        && data[0] == source
                        && data[1] & 0xF0 == 0x30
                    {
                        break msg;
                    }
                }
                if started.elapsed() > RECEIVE_TIMEOUT {
                    warn!("flow control timeout");
                    return Ok(None);
                }
            };
            let data = fc.data();
            match data[1] & 0x0F {
                0x0 => return Ok(Some((data[2], data[3]))),
                0x1 => continue,
                status => {
                    debug!("flow control abort, status {:#x}", status);
                    return Ok(None);
                }
            }
        }
    }
}
