//! Session lifecycle: one worker thread driving one endpoint until the
//! handle stops it.
//!
//! The worker owns the transport and the simulator; the caller keeps a
//! [`SessionHandle`] with the live toggles and the stop flag. An I/O
//! error on the transport ends the session, a malformed request never
//! does.

mod can;
mod channel;
mod enet;
mod iso9141;
mod serial;

pub use channel::{BusPort, MockPort, SerialBusPort};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::config::{AdapterFlags, ConceptType, ConfigData, Profile};
use crate::error::Result;
use crate::isotp::{CanIo, IsoTpChannel};
use crate::sim::{EcuSimulator, Toggles};

use can::can_iteration;
use enet::EnetSession;
use iso9141::{run_concept3, run_iso9141};
use serial::{concept1_iteration, default_iteration};

/// Pause between ENET polling passes.
const ENET_POLL: Duration = Duration::from_millis(10);

/// Transport a session talks through.
pub enum Endpoint {
    /// A named serial port, opened with the concept's parameters.
    Serial(String),
    /// An already-open byte port.
    Bus(Box<dyn BusPort>),
    /// A CAN handle carrying segmented telegrams.
    Can(Box<dyn CanIo>),
    /// The TCP/UDP listener set on the fixed diagnostic ports.
    Enet,
}

/// An opened transport, ready for the worker thread.
enum Transport {
    Bus(Box<dyn BusPort>),
    Can(Box<dyn CanIo>),
    Enet(EnetSession),
}

/// Entry point for running the simulator against one endpoint.
pub struct Session;

impl Session {
    /// Opens the endpoint and spawns the worker thread for one session.
    ///
    /// Opening happens here, so a bad port name or an occupied listen
    /// port fails the start instead of dying silently on the worker.
    pub fn start(
        endpoint: Endpoint,
        concept: ConceptType,
        flags: AdapterFlags,
        profile: Profile,
        config: ConfigData,
    ) -> Result<SessionHandle> {
        let transport = match endpoint {
            Endpoint::Serial(name) => {
                let port = SerialBusPort::open(&name, concept)?;
                info!("serial session on {}", name);
                Transport::Bus(Box::new(port))
            }
            Endpoint::Bus(port) => Transport::Bus(port),
            Endpoint::Can(io) => Transport::Can(io),
            Endpoint::Enet => Transport::Enet(EnetSession::bind()?),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let toggles = Arc::new(Toggles::default());

        let worker_stop = Arc::clone(&stop);
        let worker_toggles = Arc::clone(&toggles);
        let worker = thread::spawn(move || {
            let mut sim = EcuSimulator::new(profile, config, worker_toggles);
            sim.session_start();
            sim.reset_connection();
            match run(transport, concept, flags, &mut sim, &worker_stop) {
                Ok(()) => info!("session stopped"),
                Err(e) => error!("session ended: {}", e),
            }
        });

        Ok(SessionHandle {
            worker: Some(worker),
            stop,
            toggles,
        })
    }
}

fn run(
    transport: Transport,
    concept: ConceptType,
    flags: AdapterFlags,
    sim: &mut EcuSimulator,
    stop: &AtomicBool,
) -> Result<()> {
    match transport {
        Transport::Bus(mut port) => run_bus(port.as_mut(), sim, concept, flags, stop),
        Transport::Can(io) => {
            let mut channel = IsoTpChannel::new(io);
            while !stop.load(Ordering::Relaxed) {
                can_iteration(&mut channel, sim)?;
            }
            Ok(())
        }
        Transport::Enet(mut session) => {
            while !stop.load(Ordering::Relaxed) {
                session.iteration(sim)?;
                thread::sleep(ENET_POLL);
            }
            Ok(())
        }
    }
}

fn run_bus(
    port: &mut dyn BusPort,
    sim: &mut EcuSimulator,
    concept: ConceptType,
    flags: AdapterFlags,
    stop: &AtomicBool,
) -> Result<()> {
    while !stop.load(Ordering::Relaxed) {
        match concept {
            ConceptType::Concept1 => {
                sim.tick();
                concept1_iteration(port, sim, flags)?;
            }
            ConceptType::Iso9141 => run_iso9141(port, sim, flags, stop)?,
            ConceptType::Concept3 => run_concept3(port, sim, flags, stop)?,
            _ => default_iteration(port, sim, concept, flags)?,
        }
    }
    Ok(())
}

/// Owner side of a running session.
///
/// Dropping the handle stops the worker; [`SessionHandle::stop`] does
/// the same explicitly.
pub struct SessionHandle {
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    toggles: Arc<Toggles>,
}

impl SessionHandle {
    /// Live switches shared with the session thread.
    pub fn toggles(&self) -> Arc<Toggles> {
        Arc::clone(&self.toggles)
    }

    /// Signals the worker and waits for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_bmw_fast, Frame, TESTER_ADDR};
    use pretty_assertions::assert_eq;
    use serialport::Parity;
    use std::io;
    use std::sync::Mutex;
    use std::time::Instant;

    /// A [`MockPort`] both the test and the worker can reach.
    #[derive(Clone, Default)]
    struct SharedPort(Arc<Mutex<MockPort>>);

    impl SharedPort {
        fn lock(&self) -> std::sync::MutexGuard<'_, MockPort> {
            self.0.lock().unwrap()
        }
    }

    impl BusPort for SharedPort {
        fn bytes_to_read(&mut self) -> io::Result<usize> {
            self.lock().bytes_to_read()
        }

        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.lock().read_available(buf)
        }

        fn write_all_bytes(&mut self, data: &[u8]) -> io::Result<()> {
            self.lock().write_all_bytes(data)
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.lock().discard_input()
        }

        fn set_parity(&mut self, parity: Parity) -> io::Result<()> {
            self.lock().set_parity(parity)
        }

        fn set_dtr(&mut self, level: bool) -> io::Result<()> {
            self.lock().set_dtr(level)
        }

        fn read_cts(&mut self) -> io::Result<bool> {
            self.lock().read_cts()
        }

        fn read_dsr(&mut self) -> io::Result<bool> {
            self.lock().read_dsr()
        }
    }

    #[test]
    fn test_session_serves_request_until_stopped() {
        let port = SharedPort::default();
        let handle = Session::start(
            Endpoint::Bus(Box::new(port.clone())),
            ConceptType::BmwFast,
            AdapterFlags {
                ads_adapter: true,
                kline_responder: false,
            },
            Profile::None,
            ConfigData::default(),
        ).unwrap();

        let request =
            encode_bmw_fast(&Frame::new(0x38, TESTER_ADDR, vec![0x3E])).unwrap();
        port.lock().push_rx(&request);

        let expected =
            encode_bmw_fast(&Frame::response(0x38, vec![0x7E, 0x00, 0x00])).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if port.lock().tx == expected {
                break;
            }
            assert!(Instant::now() < deadline, "no response from worker");
            thread::sleep(Duration::from_millis(10));
        }

        handle.stop();
        let tx = port.lock().tx.clone();
        assert_eq!(tx, expected);
    }

    #[test]
    fn test_handle_toggles_reach_worker() {
        let port = SharedPort::default();
        let handle = Session::start(
            Endpoint::Bus(Box::new(port)),
            ConceptType::BmwFast,
            AdapterFlags::default(),
            Profile::None,
            ConfigData::default(),
        ).unwrap();
        let toggles = handle.toggles();
        assert!(toggles.ignition_on());
        toggles.set_ignition_on(false);
        assert!(!toggles.ignition_on());
        handle.stop();
    }
}
