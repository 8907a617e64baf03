//! ENET session loop: TCP diagnostic and control channels plus the UDP
//! discovery responder, all polled non-blocking from the session
//! worker.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::codec::{encode_bmw_fast, MAX_TELEGRAM_SIZE};
use crate::enet::{
    ack_frame, build_diag_frame, discovery_reply, frame_from_diag, header_length,
    ignition_response, is_discovery, is_ignition_query, keep_alive_frame, CONTROL_PORT, DIAG_PORT,
    KEEP_ALIVE_IDLE_MS,
};
use crate::error::Result;
use crate::sim::EcuSimulator;

/// Listening sockets and per-client state of one ENET session.
pub(super) struct EnetSession {
    diag_listener: TcpListener,
    control_listener: TcpListener,
    discovery: UdpSocket,
    diag: Option<TcpStream>,
    diag_buf: Vec<u8>,
    control: Option<TcpStream>,
    control_buf: Vec<u8>,
    last_activity: Instant,
}

impl EnetSession {
    /// Binds the fixed diagnostic and control ports on all interfaces.
    pub(super) fn bind() -> Result<Self> {
        Self::bind_on(("0.0.0.0", DIAG_PORT), ("0.0.0.0", CONTROL_PORT))
    }

    fn bind_on<A: ToSocketAddrs, B: ToSocketAddrs + Copy>(diag: A, control: B) -> Result<Self> {
        let diag_listener = TcpListener::bind(diag)?;
        diag_listener.set_nonblocking(true)?;
        let control_listener = TcpListener::bind(control)?;
        control_listener.set_nonblocking(true)?;
        let discovery = UdpSocket::bind(control)?;
        discovery.set_nonblocking(true)?;
        info!(
            "listening on {} (diag) and {} (control)",
            diag_listener.local_addr()?,
            control_listener.local_addr()?
        );
        Ok(EnetSession {
            diag_listener,
            control_listener,
            discovery,
            diag: None,
            diag_buf: Vec::new(),
            control: None,
            control_buf: Vec::new(),
            last_activity: Instant::now(),
        })
    }

    /// One polling pass over all three sockets.
    pub(super) fn iteration(&mut self, sim: &mut EcuSimulator) -> Result<()> {
        sim.tick();
        self.accept_clients(sim)?;
        self.answer_discovery()?;
        self.pump_diag(sim)?;
        self.pump_control(sim)?;
        self.send_keep_alive();
        Ok(())
    }

    fn accept_clients(&mut self, sim: &mut EcuSimulator) -> Result<()> {
        match self.diag_listener.accept() {
            Ok((stream, peer)) => {
                info!("diagnostic client connected from {}", peer);
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                // a new tester starts from a clean vehicle state
                sim.reset_connection();
                self.diag = Some(stream);
                self.diag_buf.clear();
                self.last_activity = Instant::now();
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }
        match self.control_listener.accept() {
            Ok((stream, peer)) => {
                debug!("control client connected from {}", peer);
                stream.set_nonblocking(true)?;
                self.control = Some(stream);
                self.control_buf.clear();
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn answer_discovery(&mut self) -> Result<()> {
        let mut datagram = [0u8; 64];
        loop {
            match self.discovery.recv_from(&mut datagram) {
                Ok((len, peer)) => {
                    if is_discovery(&datagram[..len]) {
                        debug!("discovery probe from {}", peer);
                        self.discovery.send_to(&discovery_reply(), peer)?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn pump_diag(&mut self, sim: &mut EcuSimulator) -> Result<()> {
        let mut stream = match self.diag.take() {
            Some(stream) => stream,
            None => return Ok(()),
        };
        if !read_into(&mut stream, &mut self.diag_buf)? {
            info!("diagnostic client disconnected");
            self.diag_buf.clear();
            return Ok(());
        }

        while let Some(telegram) = take_frame(&mut self.diag_buf) {
            self.last_activity = Instant::now();
            // only diagnostic payloads are acknowledged
            let frame = match frame_from_diag(&telegram) {
                Some(frame) => frame,
                None => {
                    debug!("ignoring non-diagnostic payload type {:#04x}", telegram[5]);
                    continue;
                }
            };
            if write_or_drop(&mut stream, &ack_frame(&telegram)).is_err() {
                return Ok(());
            }
            let canonical = encode_bmw_fast(&frame)?;
            for reply in sim.process(&canonical) {
                if reply.delay_ms > 0 {
                    thread::sleep(Duration::from_millis(reply.delay_ms));
                }
                if write_or_drop(&mut stream, &build_diag_frame(&reply.frame)).is_err() {
                    return Ok(());
                }
            }
        }
        self.diag = Some(stream);
        Ok(())
    }

    fn pump_control(&mut self, sim: &mut EcuSimulator) -> Result<()> {
        let mut stream = match self.control.take() {
            Some(stream) => stream,
            None => return Ok(()),
        };
        if !read_into(&mut stream, &mut self.control_buf)? {
            debug!("control client disconnected");
            self.control_buf.clear();
            return Ok(());
        }

        while let Some(telegram) = take_frame(&mut self.control_buf) {
            if is_ignition_query(&telegram) {
                let response = ignition_response(sim.toggles().ignition_on());
                if write_or_drop(&mut stream, &response).is_err() {
                    return Ok(());
                }
            } else {
                debug!("ignoring control payload type {:#04x}", telegram[5]);
            }
        }
        self.control = Some(stream);
        Ok(())
    }

    fn send_keep_alive(&mut self) {
        if self.last_activity.elapsed() < Duration::from_millis(KEEP_ALIVE_IDLE_MS) {
            return;
        }
        if let Some(stream) = self.diag.as_mut() {
            if write_or_drop(stream, &keep_alive_frame()).is_err() {
                self.diag = None;
                return;
            }
            self.last_activity = Instant::now();
        }
    }
}

/// Appends everything currently readable. `Ok(false)` means the peer
/// closed the connection.
fn read_into(stream: &mut TcpStream, buf: &mut Vec<u8>) -> io::Result<bool> {
    let mut chunk = [0u8; 512];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
            Err(e) => {
                debug!("client read failed: {}", e);
                return Ok(false);
            }
        }
    }
}

/// Splits one complete frame off the front of the buffer. An oversized
/// length field drops the whole buffer, the peer has lost framing.
fn take_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    if buf.len() < 6 {
        return None;
    }
    let total = header_length(buf) + 6;
    if total > MAX_TELEGRAM_SIZE + 8 {
        debug!("dropping {} buffered bytes, framing lost", buf.len());
        buf.clear();
        return None;
    }
    if buf.len() < total {
        return None;
    }
    let telegram: Vec<u8> = buf.drain(..total).collect();
    Some(telegram)
}

fn write_or_drop(stream: &mut TcpStream, data: &[u8]) -> io::Result<()> {
    if let Err(e) = stream.write_all(data) {
        debug!("client write failed: {}", e);
        return Err(e);
    }
    Ok(())
}
