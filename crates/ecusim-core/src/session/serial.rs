//! Request/response serial loops: the frame-dispatching default loop
//! and the table-only Concept1 loop.

use std::io;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::{
    checksum_xor, decode_bmw_fast, decode_ds2, decode_kwp2000s, encode_bmw_fast, encode_ds2,
    encode_kwp2000s, Frame, MAX_TELEGRAM_SIZE,
};
use crate::config::{AdapterFlags, ConceptType};
use crate::error::{CodecError, Result};
use crate::sim::EcuSimulator;

use super::channel::{read_exact_gap, BusPort};

/// Inter-byte gap allowed while a kline responder echoes a write back.
const ECHO_TIMEOUT: Duration = Duration::from_millis(50);

/// One pass of the default loop: advance the vehicle state, then serve
/// at most one request in the concept's native wire layout.
pub(super) fn default_iteration(
    port: &mut dyn BusPort,
    sim: &mut EcuSimulator,
    concept: ConceptType,
    flags: AdapterFlags,
) -> Result<()> {
    sim.tick();
    port.set_dtr(sim.toggles().ignition_on())?;

    let gap = Duration::from_millis(concept.inter_byte_timeout_ms());
    let request = match receive_request(port, concept, gap)? {
        Some(request) => request,
        None => return Ok(()),
    };

    if !flags.ads_adapter && !flags.kline_responder {
        send_wire(port, &request.wire, flags)?;
    }

    for reply in sim.process(&request.canonical) {
        if reply.delay_ms > 0 {
            thread::sleep(Duration::from_millis(reply.delay_ms));
        }
        let wire = encode_reply(&reply.frame, concept)?;
        send_wire(port, &wire, flags)?;
    }
    Ok(())
}

/// One pass of the Concept1 loop: trailing-length telegrams answered
/// from the response table only, first alternative, XOR checksum
/// recomputed on the way out.
pub(super) fn concept1_iteration(
    port: &mut dyn BusPort,
    sim: &mut EcuSimulator,
    flags: AdapterFlags,
) -> Result<()> {
    let gap = Duration::from_millis(ConceptType::Concept1.inter_byte_timeout_ms());
    let mut telegram = Vec::new();
    let mut byte = [0u8; 1];
    while telegram.len() < MAX_TELEGRAM_SIZE && read_exact_gap(port, &mut byte, gap)? {
        telegram.push(byte[0]);
    }
    if telegram.is_empty() {
        return Ok(());
    }

    if !flags.ads_adapter && !flags.kline_responder {
        send_wire(port, &telegram, flags)?;
    }

    match sim.lookup_first(&telegram) {
        Some(response) if !response.is_empty() => {
            let mut out = response.to_vec();
            let end = out.len() - 1;
            out[end] = checksum_xor(&out[..end]);
            send_wire(port, &out, flags)?;
        }
        Some(_) => {}
        None => debug!("no table entry for request: {:02X?}", telegram),
    }
    Ok(())
}

/// A received request: the wire bytes (for the echo) and the same
/// telegram in canonical BMW-FAST layout (for dispatch).
struct Request {
    wire: Vec<u8>,
    canonical: Vec<u8>,
}

fn receive_request(
    port: &mut dyn BusPort,
    concept: ConceptType,
    gap: Duration,
) -> Result<Option<Request>> {
    let header_len = match concept {
        ConceptType::Ds2 => 2,
        _ => 4,
    };
    let mut wire = vec![0u8; header_len];
    if !read_exact_gap(port, &mut wire, gap)? {
        port.discard_input()?;
        return Ok(None);
    }

    let total = match wire_length(&wire, concept) {
        Some(total) if total <= MAX_TELEGRAM_SIZE => total,
        _ => {
            // broadcast or garbage, drain and drop
            drain(port, gap)?;
            port.discard_input()?;
            return Ok(None);
        }
    };
    wire.resize(total, 0);
    if !read_exact_gap(port, &mut wire[header_len..], gap)? {
        port.discard_input()?;
        return Ok(None);
    }

    let decoded = match concept {
        ConceptType::Kwp2000S => decode_kwp2000s(&wire),
        ConceptType::Ds2 => decode_ds2(&wire),
        _ => decode_bmw_fast(&wire),
    };
    let frame = match decoded {
        Ok((frame, _)) => frame,
        Err(err) => {
            debug!("dropping request: {}", err);
            port.discard_input()?;
            return Ok(None);
        }
    };
    let canonical = match concept {
        ConceptType::Kwp2000S | ConceptType::Ds2 => encode_bmw_fast(&frame)?,
        _ => wire.clone(),
    };
    Ok(Some(Request { wire, canonical }))
}

/// Total wire length including checksum, from the telegram header.
fn wire_length(header: &[u8], concept: ConceptType) -> Option<usize> {
    match concept {
        ConceptType::Kwp2000S => Some(header[3] as usize + 5),
        ConceptType::Ds2 => {
            let total = header[1] as usize;
            if total < 4 {
                return None;
            }
            Some(total)
        }
        _ => {
            if header[0] & 0x80 != 0x80 {
                return None;
            }
            let payload_len = (header[0] & 0x3F) as usize;
            if payload_len == 0 {
                Some(header[3] as usize + 5)
            } else {
                Some(payload_len + 4)
            }
        }
    }
}

fn encode_reply(frame: &Frame, concept: ConceptType) -> std::result::Result<Vec<u8>, CodecError> {
    match concept {
        ConceptType::Kwp2000S => encode_kwp2000s(frame),
        ConceptType::Ds2 => encode_ds2(frame),
        _ => encode_bmw_fast(frame),
    }
}

/// Writes a telegram and, with a kline responder attached, consumes
/// the wire echo it produces.
pub(super) fn send_wire(
    port: &mut dyn BusPort,
    data: &[u8],
    flags: AdapterFlags,
) -> io::Result<()> {
    port.write_all_bytes(data)?;
    if flags.kline_responder {
        let mut echo = vec![0u8; data.len()];
        if !read_exact_gap(port, &mut echo, ECHO_TIMEOUT)? || echo != data {
            warn!("kline echo mismatch, continuing");
        }
    }
    Ok(())
}

fn drain(port: &mut dyn BusPort, gap: Duration) -> io::Result<()> {
    let mut byte = [0u8; 1];
    while read_exact_gap(port, &mut byte, gap)? {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TESTER_ADDR;
    use crate::config::{ConfigData, Profile};
    use crate::sim::Toggles;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    use super::super::channel::MockPort;

    fn simulator(profile: Profile) -> EcuSimulator {
        EcuSimulator::new(profile, ConfigData::default(), Arc::new(Toggles::default()))
    }

    fn bmw_fast(device: u8, payload: &[u8]) -> Vec<u8> {
        encode_bmw_fast(&Frame::new(device, TESTER_ADDR, payload.to_vec())).unwrap()
    }

    #[test]
    fn test_default_loop_echoes_and_responds() {
        let mut port = MockPort::default();
        let request = bmw_fast(0x38, &[0x81]);
        port.push_rx(&request);

        let mut sim = simulator(Profile::None);
        default_iteration(
            &mut port,
            &mut sim,
            ConceptType::BmwFast,
            AdapterFlags::default(),
        )
        .unwrap();

        let response = encode_bmw_fast(&Frame::response(0x38, vec![0xC1, 0xDF, 0x8F])).unwrap();
        let mut expected = request.clone();
        expected.extend_from_slice(&response);
        assert_eq!(port.tx, expected);
    }

    #[test]
    fn test_adapter_flag_suppresses_echo() {
        let mut port = MockPort::default();
        port.push_rx(&bmw_fast(0x38, &[0x3E]));

        let mut sim = simulator(Profile::None);
        let flags = AdapterFlags {
            ads_adapter: true,
            kline_responder: false,
        };
        default_iteration(&mut port, &mut sim, ConceptType::BmwFast, flags).unwrap();

        let response = encode_bmw_fast(&Frame::response(0x38, vec![0x7E, 0x00, 0x00])).unwrap();
        assert_eq!(port.tx, response);
    }

    #[test]
    fn test_bad_checksum_discarded_silently() {
        let mut port = MockPort::default();
        let mut request = bmw_fast(0x38, &[0x3E]);
        let end = request.len() - 1;
        request[end] ^= 0xFF;
        port.push_rx(&request);

        let mut sim = simulator(Profile::None);
        default_iteration(
            &mut port,
            &mut sim,
            ConceptType::BmwFast,
            AdapterFlags::default(),
        )
        .unwrap();
        assert!(port.tx.is_empty());
    }

    #[test]
    fn test_kwp2000s_translation_preserves_payload() {
        let mut port = MockPort::default();
        let frame = Frame::new(0x12, TESTER_ADDR, vec![0x1A, 0x80]);
        port.push_rx(&encode_kwp2000s(&frame).unwrap());

        let flags = AdapterFlags {
            ads_adapter: true,
            kline_responder: false,
        };
        let mut sim = simulator(Profile::E61);
        default_iteration(&mut port, &mut sim, ConceptType::Kwp2000S, flags).unwrap();

        // the identification block comes back in KWP2000* layout
        assert_eq!(port.tx[0], 0xB8);
        assert_eq!(port.tx[1], TESTER_ADDR);
        assert_eq!(port.tx[2], 0x12);
        assert_eq!(port.tx[4], 0x5A);
        assert_eq!(port.tx[5], 0x80);
    }

    #[test]
    fn test_ds2_translation_addresses() {
        let mut port = MockPort::default();
        // DS2 error memory read for the park distance unit
        let frame = Frame::new(0x64, TESTER_ADDR, vec![0x18, 0x02, 0xFF, 0xFF]);
        port.push_rx(&encode_ds2(&frame).unwrap());

        let flags = AdapterFlags {
            ads_adapter: true,
            kline_responder: false,
        };
        let mut sim = simulator(Profile::E61);
        default_iteration(&mut port, &mut sim, ConceptType::Ds2, flags).unwrap();

        // response carries the device address and total length up front
        assert_eq!(port.tx[0], 0x64);
        assert_eq!(port.tx[1] as usize, port.tx.len());
        assert_eq!(checksum_xor(&port.tx[..port.tx.len() - 1]), port.tx[port.tx.len() - 1]);
    }

    #[test]
    fn test_concept1_first_alternative_with_xor() {
        let json = r#"{
            "entries": [{
                "request": "B0 04 01 00",
                "responses": ["B0 05 01 02 00", "B0 05 01 03 00"]
            }]
        }"#;
        let config = ConfigData::from_json(json).unwrap();
        let mut sim = EcuSimulator::new(Profile::None, config, Arc::new(Toggles::default()));

        let mut port = MockPort::default();
        port.push_rx(&[0xB0, 0x04, 0x01, 0x00]);
        let flags = AdapterFlags {
            ads_adapter: true,
            kline_responder: false,
        };
        concept1_iteration(&mut port, &mut sim, flags).unwrap();

        let expected_sum = checksum_xor(&[0xB0, 0x05, 0x01, 0x02]);
        assert_eq!(port.tx, vec![0xB0, 0x05, 0x01, 0x02, expected_sum]);

        // the first alternative is served every time
        port.tx.clear();
        port.push_rx(&[0xB0, 0x04, 0x01, 0x00]);
        concept1_iteration(&mut port, &mut sim, flags).unwrap();
        assert_eq!(port.tx[3], 0x02);
    }

    #[test]
    fn test_concept1_silent_without_match() {
        let mut port = MockPort::default();
        port.push_rx(&[0x01, 0x02, 0x03]);
        let mut sim = simulator(Profile::None);
        let flags = AdapterFlags {
            ads_adapter: true,
            kline_responder: false,
        };
        concept1_iteration(&mut port, &mut sim, flags).unwrap();
        assert!(port.tx.is_empty());
    }
}
