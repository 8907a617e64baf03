//! ENET diagnostic framing
//!
//! TCP frames are `[length:4 big-endian][reserved][type][source][target][payload]`
//! where the length field counts everything after the 6-byte header. The
//! UDP discovery channel answers a fixed identification datagram.

use byteorder::{BigEndian, ByteOrder};

use crate::codec::{is_functional_addr, Frame, TESTER_ADDR};

/// TCP port of the diagnostic channel.
pub const DIAG_PORT: u16 = 6801;

/// TCP port of the control channel, also the UDP discovery port.
pub const CONTROL_PORT: u16 = 6811;

/// Tester address on the ENET wire, remapped to the canonical tester
/// address on receive and back on send.
pub const TCP_TESTER_ADDR: u8 = 0xF4;

/// Payload type: diagnostic message.
pub const PAYLOAD_DIAG: u8 = 0x01;
/// Payload type: acknowledgment.
pub const PAYLOAD_ACK: u8 = 0x02;
/// Payload type: UDP identification announcement.
pub const PAYLOAD_ANNOUNCE: u8 = 0x04;
/// Payload type: ignition state query/response.
pub const PAYLOAD_IGNITION: u8 = 0x10;
/// Payload type: alive check.
pub const PAYLOAD_ALIVE: u8 = 0x12;

/// Marker byte ending a 6-byte UDP discovery datagram.
pub const DISCOVERY_MARKER: u8 = 0x11;

/// Milliseconds of diagnostic silence before a keep-alive is sent.
pub const KEEP_ALIVE_IDLE_MS: u64 = 2000;

/// Length field of a frame header.
pub fn header_length(header: &[u8]) -> usize {
    BigEndian::read_u32(&header[..4]) as usize
}

/// Wraps a canonical frame into an ENET diagnostic frame.
pub fn build_diag_frame(frame: &Frame) -> Vec<u8> {
    let target = if frame.target == TESTER_ADDR {
        TCP_TESTER_ADDR
    } else {
        frame.target
    };
    let mut out = vec![0u8; 8 + frame.payload.len()];
    BigEndian::write_u32(&mut out[..4], frame.payload.len() as u32 + 2);
    out[4] = 0x00;
    out[5] = PAYLOAD_DIAG;
    out[6] = frame.source;
    out[7] = target;
    out[8..].copy_from_slice(&frame.payload);
    out
}

/// Extracts the canonical frame from a complete diagnostic frame.
///
/// Returns `None` for non-diagnostic payload types and for frames too
/// short to carry a service byte.
pub fn frame_from_diag(telegram: &[u8]) -> Option<Frame> {
    if telegram.len() < 9 || telegram[5] != PAYLOAD_DIAG {
        return None;
    }
    let payload_len = header_length(telegram);
    if payload_len < 3 || payload_len + 6 > telegram.len() {
        return None;
    }
    let mut source = telegram[6];
    let target = telegram[7];
    if source == TCP_TESTER_ADDR {
        source = TESTER_ADDR;
    }
    let mut frame = Frame::new(target, source, telegram[8..6 + payload_len].to_vec());
    frame.functional = is_functional_addr(target);
    Some(frame)
}

/// Builds the acknowledgment for an inbound diagnostic frame.
///
/// The ack mirrors the frame with the payload type swapped. One request
/// shape deviates: a 14-byte telegram whose byte at offset 8 is 0x19 is
/// acknowledged with the length field decremented by one and one byte
/// fewer on the wire. This is a compatibility quirk preserved exactly.
pub fn ack_frame(telegram: &[u8]) -> Vec<u8> {
    let mut ack = telegram.to_vec();
    ack[5] = PAYLOAD_ACK;
    if telegram.len() == 14 && telegram[8] == 0x19 {
        let ack_length = header_length(telegram) - 1;
        BigEndian::write_u32(&mut ack[..4], ack_length as u32);
        ack.truncate(ack_length + 6);
    }
    ack
}

/// Unsolicited keep-alive frame for an idle diagnostic connection.
pub fn keep_alive_frame() -> [u8; 8] {
    [0x00, 0x00, 0x00, 0x02, 0x00, PAYLOAD_ALIVE, TCP_TESTER_ADDR, 0x00]
}

/// True when a control-channel frame asks for the ignition state.
pub fn is_ignition_query(telegram: &[u8]) -> bool {
    telegram.len() >= 6 && telegram[5] == PAYLOAD_IGNITION
}

/// Ignition state response; clamp-state bits 3 and 4 signal ignition on.
pub fn ignition_response(ignition_on: bool) -> [u8; 7] {
    let state = if ignition_on { 0x05 } else { 0x00 };
    [0x00, 0x00, 0x00, 0x01, 0x00, PAYLOAD_IGNITION, state]
}

/// True when a UDP datagram is a discovery probe.
pub fn is_discovery(datagram: &[u8]) -> bool {
    datagram.len() == 6 && datagram[5] == DISCOVERY_MARKER
}

/// Fixed 56-byte identification reply to a discovery probe: tester id,
/// placeholder hardware id and placeholder vehicle id.
pub fn discovery_reply() -> Vec<u8> {
    let mut out = Vec::with_capacity(56);
    out.extend_from_slice(&[0x00, 0x00, 0x00, 50, 0x00, PAYLOAD_ANNOUNCE]);
    out.extend_from_slice(b"DIAGADR10");
    out.extend_from_slice(b"BMWMAC");
    for i in 0..12u8 {
        out.push(b'0' + (i % 10));
    }
    out.extend_from_slice(b"BMWVIN");
    for i in 0..17u8 {
        out.push(b'a' + i);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diag_frame_roundtrip() {
        let frame = Frame::response(0x12, vec![0x62, 0x17, 0x42, 0x00]);
        let wire = build_diag_frame(&frame);
        assert_eq!(header_length(&wire), 6);
        assert_eq!(wire[5], PAYLOAD_DIAG);
        // tester address remapped on the wire
        assert_eq!(wire[6], 0x12);
        assert_eq!(wire[7], TCP_TESTER_ADDR);

        // and back again on receive
        let decoded = frame_from_diag(&wire).unwrap();
        assert_eq!(decoded.source, 0x12);
        assert_eq!(decoded.target, TESTER_ADDR);
        assert_eq!(decoded.payload, frame.payload);
    }

    #[test]
    fn test_functional_target_flag() {
        let mut wire = build_diag_frame(&Frame::new(0x12, TESTER_ADDR, vec![0x19, 0x02, 0x0C]));
        wire[7] = 0xEF;
        let decoded = frame_from_diag(&wire).unwrap();
        assert!(decoded.functional);
    }

    #[test]
    fn test_ack_mirrors_frame() {
        let wire = build_diag_frame(&Frame::new(0x12, TESTER_ADDR, vec![0x22, 0x17, 0x42]));
        let ack = ack_frame(&wire);
        assert_eq!(ack.len(), wire.len());
        assert_eq!(ack[5], PAYLOAD_ACK);
        assert_eq!(&ack[6..], &wire[6..]);
    }

    #[test]
    fn test_detail_read_ack_quirk() {
        // 14-byte request with service byte 0x19 at offset 8
        let wire = build_diag_frame(&Frame::new(
            0x12,
            TESTER_ADDR,
            vec![0x19, 0x02, 0x0C, 0x0F, 0x0B, 0x02],
        ));
        assert_eq!(wire.len(), 14);
        let ack = ack_frame(&wire);
        assert_eq!(header_length(&ack), header_length(&wire) - 1);
        assert_eq!(ack.len(), wire.len() - 1);
        assert_eq!(ack[5], PAYLOAD_ACK);
    }

    #[test]
    fn test_keep_alive_bytes() {
        assert_eq!(
            keep_alive_frame(),
            [0x00, 0x00, 0x00, 0x02, 0x00, 0x12, 0xF4, 0x00]
        );
    }

    #[test]
    fn test_ignition_response_states() {
        assert_eq!(ignition_response(true)[6], 0x05);
        assert_eq!(ignition_response(false)[6], 0x00);
        assert_eq!(ignition_response(true)[5], PAYLOAD_IGNITION);
    }

    #[test]
    fn test_discovery_reply_layout() {
        assert!(is_discovery(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x11]));
        assert!(!is_discovery(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x10]));
        let reply = discovery_reply();
        assert_eq!(reply.len(), 56);
        assert_eq!(&reply[..6], &[0x00, 0x00, 0x00, 0x32, 0x00, 0x04]);
        assert_eq!(&reply[6..15], b"DIAGADR10");
        assert_eq!(&reply[15..21], b"BMWMAC");
        assert_eq!(&reply[21..33], b"012345678901");
        assert_eq!(&reply[33..39], b"BMWVIN");
        assert_eq!(&reply[39..], b"abcdefghijklmnopq");
    }
}
