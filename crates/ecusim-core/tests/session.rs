//! End-to-end session tests: a worker thread serving requests over an
//! in-memory byte port.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serialport::Parity;

use ecusim_core::codec::{decode_bmw_fast, encode_bmw_fast, Frame, TESTER_ADDR};
use ecusim_core::config::{AdapterFlags, ConceptType, ConfigData, Profile};
use ecusim_core::session::{BusPort, Endpoint, MockPort, Session};

/// A [`MockPort`] the test keeps a handle on after the session worker
/// takes ownership of its endpoint.
#[derive(Clone, Default)]
struct SharedPort(Arc<Mutex<MockPort>>);

impl SharedPort {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockPort> {
        self.0.lock().unwrap()
    }

    fn wait_for_tx(&self, len: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            {
                let port = self.lock();
                if port.tx.len() >= len {
                    return port.tx.clone();
                }
            }
            assert!(Instant::now() < deadline, "worker produced no output");
            thread::sleep(Duration::from_millis(10));
        }
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

fn no_echo() -> AdapterFlags {
    AdapterFlags {
        ads_adapter: true,
        kline_responder: false,
    }
}

fn request(device: u8, payload: &[u8]) -> Vec<u8> {
    encode_bmw_fast(&Frame::new(device, TESTER_ADDR, payload.to_vec())).unwrap()
}

#[test]
fn test_tester_present_round_trip_with_echo() {
    let port = SharedPort::default();
    let handle = Session::start(
        Endpoint::Bus(Box::new(port.clone())),
        ConceptType::BmwFast,
        AdapterFlags::default(),
        Profile::None,
        ConfigData::default(),
    ).unwrap();

    let req = request(0x38, &[0x3E]);
    port.lock().push_rx(&req);

    let response = encode_bmw_fast(&Frame::response(0x38, vec![0x7E, 0x00, 0x00])).unwrap();
    let tx = port.wait_for_tx(req.len() + response.len());
    handle.stop();

    assert_eq!(&tx[..req.len()], &req[..]);
    assert_eq!(&tx[req.len()..], &response[..]);
}

#[test]
fn test_profile_identification_over_session() {
    let port = SharedPort::default();
    let handle = Session::start(
        Endpoint::Bus(Box::new(port.clone())),
        ConceptType::BmwFast,
        no_echo(),
        Profile::E61,
        ConfigData::default(),
    ).unwrap();

    port.lock().push_rx(&request(0x12, &[0x1A, 0x80]));
    let tx = port.wait_for_tx(6);
    handle.stop();

    let (frame, _) = decode_bmw_fast(&tx).unwrap();
    assert_eq!(frame.source, 0x12);
    assert_eq!(frame.target, TESTER_ADDR);
    assert_eq!(&frame.payload[..2], &[0x5A, 0x80]);
}

#[test]
fn test_table_entry_served_over_session() {
    let json = r#"{
        "entries": [{
            "request": "82 55 F1 21 01 00",
            "responses": ["84 F1 55 61 01 12 34 00"]
        }]
    }"#;
    let config = ConfigData::from_json(json).unwrap();

    let port = SharedPort::default();
    let handle = Session::start(
        Endpoint::Bus(Box::new(port.clone())),
        ConceptType::BmwFast,
        no_echo(),
        Profile::None,
        config,
    ).unwrap();

    port.lock().push_rx(&request(0x55, &[0x21, 0x01]));
    let tx = port.wait_for_tx(6);
    handle.stop();

    let (frame, _) = decode_bmw_fast(&tx).unwrap();
    assert_eq!(frame.payload, vec![0x61, 0x01, 0x12, 0x34]);
}

#[test]
fn test_consecutive_requests_one_session() {
    let port = SharedPort::default();
    let handle = Session::start(
        Endpoint::Bus(Box::new(port.clone())),
        ConceptType::BmwFast,
        no_echo(),
        Profile::None,
        ConfigData::default(),
    ).unwrap();

    port.lock().push_rx(&request(0x38, &[0x81]));
    let first = encode_bmw_fast(&Frame::response(0x38, vec![0xC1, 0xDF, 0x8F])).unwrap();
    port.wait_for_tx(first.len());

    port.lock().push_rx(&request(0x40, &[0x3E]));
    let second = encode_bmw_fast(&Frame::response(0x40, vec![0x7E, 0x00, 0x00])).unwrap();
    let tx = port.wait_for_tx(first.len() + second.len());
    handle.stop();

    assert_eq!(&tx[..first.len()], &first[..]);
    assert_eq!(&tx[first.len()..], &second[..]);
}
