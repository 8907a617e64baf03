//! Canonical frames and the serial wire layouts.

use super::{is_functional_addr, TESTER_ADDR};
use crate::error::CodecError;

/// Canonical diagnostic frame.
///
/// All transports and the simulator converse in this form; the wire
/// layouts below are encode/decode targets only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Target device address.
    pub target: u8,
    /// Source device address.
    pub source: u8,
    /// Service payload, never empty.
    pub payload: Vec<u8>,
    /// Set when the target is a functional (broadcast) address.
    pub functional: bool,
}

impl Frame {
    /// Creates a request/response frame, deriving the functional flag
    /// from the target address.
    pub fn new(target: u8, source: u8, payload: Vec<u8>) -> Self {
        let functional = is_functional_addr(target);
        Frame {
            target,
            source,
            payload,
            functional,
        }
    }

    /// Creates a response from a device to the tester.
    pub fn response(device: u8, payload: Vec<u8>) -> Self {
        Frame::new(TESTER_ADDR, device, payload)
    }
}

/// Arithmetic sum mod 256 (BMW-FAST checksum).
pub fn checksum_sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Running XOR (KWP2000S and DS2 checksum).
pub fn checksum_xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum ^ *b)
}

/// Encodes a frame into the BMW-FAST wire layout.
///
/// `[hdr][target][source][len?][payload...][sum]` — payload lengths up to
/// 63 ride in the header's low bits, longer ones use an explicit length
/// byte, and lengths above 255 a zero length byte followed by a 16-bit
/// big-endian length. The checksum is always recomputed here.
pub fn encode_bmw_fast(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let len = frame.payload.len();
    if len == 0 || len > 0xFFFF {
        return Err(CodecError::Length(len));
    }
    let mut out = Vec::with_capacity(len + 7);
    let mut hdr = 0x80u8;
    if frame.functional || is_functional_addr(frame.target) {
        hdr |= 0x40;
    }
    if len <= 0x3F {
        out.push(hdr | len as u8);
        out.push(frame.target);
        out.push(frame.source);
    } else if len <= 0xFF {
        out.push(hdr);
        out.push(frame.target);
        out.push(frame.source);
        out.push(len as u8);
    } else {
        out.push(hdr);
        out.push(frame.target);
        out.push(frame.source);
        out.push(0x00);
        out.push((len >> 8) as u8);
        out.push(len as u8);
    }
    out.extend_from_slice(&frame.payload);
    out.push(checksum_sum(&out));
    Ok(out)
}

/// Telegram length (without checksum) declared by a BMW-FAST header.
fn bmw_fast_len(buf: &[u8]) -> Result<(usize, usize), CodecError> {
    if buf.len() < 4 {
        return Err(CodecError::Truncated {
            needed: 4,
            have: buf.len(),
        });
    }
    let data_len = (buf[0] & 0x3F) as usize;
    if data_len != 0 {
        return Ok((data_len, 3));
    }
    if buf[3] != 0 {
        return Ok((buf[3] as usize, 4));
    }
    if buf.len() < 6 {
        return Err(CodecError::Truncated {
            needed: 6,
            have: buf.len(),
        });
    }
    let len = ((buf[4] as usize) << 8) | buf[5] as usize;
    if len == 0 {
        return Err(CodecError::Length(0));
    }
    Ok((len, 6))
}

/// Decodes one BMW-FAST telegram from the head of `buf`.
///
/// Returns the frame and the number of bytes consumed, including the
/// checksum byte.
pub fn decode_bmw_fast(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Truncated { needed: 4, have: 0 });
    }
    if buf[0] & 0x80 != 0x80 {
        return Err(CodecError::Header(buf[0]));
    }
    let (data_len, offset) = bmw_fast_len(buf)?;
    let total = offset + data_len;
    if buf.len() < total + 1 {
        return Err(CodecError::Truncated {
            needed: total + 1,
            have: buf.len(),
        });
    }
    let calculated = checksum_sum(&buf[..total]);
    if calculated != buf[total] {
        return Err(CodecError::Checksum {
            found: buf[total],
            calculated,
        });
    }
    Ok((
        Frame {
            target: buf[1],
            source: buf[2],
            payload: buf[offset..total].to_vec(),
            functional: buf[0] & 0x40 != 0,
        },
        total + 1,
    ))
}

/// Parses a raw BMW-FAST telegram that carries no checksum byte.
///
/// Canned response tables are stored in this form; the checksum is
/// appended at encode time, never stored.
pub fn frame_from_raw(raw: &[u8]) -> Result<Frame, CodecError> {
    if raw.is_empty() {
        return Err(CodecError::Truncated { needed: 4, have: 0 });
    }
    if raw[0] & 0x80 != 0x80 {
        return Err(CodecError::Header(raw[0]));
    }
    let (data_len, offset) = bmw_fast_len(raw)?;
    let total = offset + data_len;
    if raw.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            have: raw.len(),
        });
    }
    Ok(Frame {
        target: raw[1],
        source: raw[2],
        payload: raw[offset..total].to_vec(),
        functional: raw[0] & 0x40 != 0,
    })
}

/// Encodes a frame into the KWP2000S layout
/// `[0xB8][target][source][len][payload...][xor]`.
pub fn encode_kwp2000s(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let len = frame.payload.len();
    if len == 0 || len > 0xFF {
        return Err(CodecError::Length(len));
    }
    let mut out = Vec::with_capacity(len + 5);
    out.push(0xB8);
    out.push(frame.target);
    out.push(frame.source);
    out.push(len as u8);
    out.extend_from_slice(&frame.payload);
    out.push(checksum_xor(&out));
    Ok(out)
}

/// Decodes one KWP2000S telegram from the head of `buf`.
pub fn decode_kwp2000s(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    if buf.len() < 4 {
        return Err(CodecError::Truncated {
            needed: 4,
            have: buf.len(),
        });
    }
    let data_len = buf[3] as usize;
    let total = data_len + 4;
    if buf.len() < total + 1 {
        return Err(CodecError::Truncated {
            needed: total + 1,
            have: buf.len(),
        });
    }
    let calculated = checksum_xor(&buf[..total]);
    if calculated != buf[total] {
        return Err(CodecError::Checksum {
            found: buf[total],
            calculated,
        });
    }
    Ok((
        Frame::new(buf[1], buf[2], buf[4..total].to_vec()),
        total + 1,
    ))
}

/// Encodes a frame into the DS2 layout `[addr][len][payload...][xor]`,
/// where `len` counts the whole telegram including checksum.
///
/// DS2 carries a single address byte: responses use the source device,
/// request echoes (tester source) fall back to the target.
pub fn encode_ds2(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let len = frame.payload.len();
    if len == 0 || len + 3 > 0xFF {
        return Err(CodecError::Length(len));
    }
    let addr = if frame.source == TESTER_ADDR {
        frame.target
    } else {
        frame.source
    };
    let mut out = Vec::with_capacity(len + 3);
    out.push(addr);
    out.push((len + 3) as u8);
    out.extend_from_slice(&frame.payload);
    out.push(checksum_xor(&out));
    Ok(out)
}

/// Decodes one DS2 telegram from the head of `buf`.
///
/// The single wire address becomes the target; the source is always the
/// tester.
pub fn decode_ds2(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    if buf.len() < 2 {
        return Err(CodecError::Truncated {
            needed: 2,
            have: buf.len(),
        });
    }
    let total = buf[1] as usize;
    if total < 4 {
        return Err(CodecError::Length(total));
    }
    if buf.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            have: buf.len(),
        });
    }
    let calculated = checksum_xor(&buf[..total - 1]);
    if calculated != buf[total - 1] {
        return Err(CodecError::Checksum {
            found: buf[total - 1],
            calculated,
        });
    }
    Ok((
        Frame::new(buf[0], TESTER_ADDR, buf[2..total - 1].to_vec()),
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bmw_fast_roundtrip_short() {
        let frame = Frame::new(0x38, 0xF1, vec![0x21, 0xC2]);
        let wire = encode_bmw_fast(&frame).unwrap();
        assert_eq!(wire[0], 0x82);
        assert_eq!(*wire.last().unwrap(), checksum_sum(&wire[..wire.len() - 1]));
        let (decoded, consumed) = decode_bmw_fast(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_bmw_fast_length_forms() {
        for len in [1usize, 63, 64, 255, 256, 4095] {
            let frame = Frame::new(0x12, 0xF1, vec![0xA5; len]);
            let wire = encode_bmw_fast(&frame).unwrap();
            if len <= 63 {
                assert_eq!(wire[0] & 0x3F, len as u8, "len {}", len);
            } else {
                assert_eq!(wire[0] & 0x3F, 0, "len {}", len);
            }
            let (decoded, _) = decode_bmw_fast(&wire).unwrap();
            assert_eq!(decoded.payload.len(), len);
        }
    }

    #[test]
    fn test_bmw_fast_functional_header() {
        let frame = Frame::new(0xDF, 0xF1, vec![0x1A, 0x80]);
        let wire = encode_bmw_fast(&frame).unwrap();
        assert_eq!(wire[0] & 0xC0, 0xC0);
        let (decoded, _) = decode_bmw_fast(&wire).unwrap();
        assert!(decoded.functional);
    }

    #[test]
    fn test_bmw_fast_checksum_rejected() {
        let frame = Frame::new(0x38, 0xF1, vec![0x1A, 0x80]);
        let mut wire = encode_bmw_fast(&frame).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        match decode_bmw_fast(&wire) {
            Err(CodecError::Checksum { .. }) => {}
            other => panic!("expected checksum error, got {:?}", other),
        }
    }

    #[test]
    fn test_bmw_fast_truncated() {
        let frame = Frame::new(0x38, 0xF1, vec![0x22, 0x30, 0x00]);
        let wire = encode_bmw_fast(&frame).unwrap();
        assert!(matches!(
            decode_bmw_fast(&wire[..wire.len() - 2]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_kwp2000s_roundtrip_preserves_payload() {
        let frame = Frame::new(0x40, 0xF1, vec![0x30, 0x01, 0x01]);
        let wire = encode_kwp2000s(&frame).unwrap();
        assert_eq!(wire[0], 0xB8);
        assert_eq!(wire[3], 3);
        assert_eq!(*wire.last().unwrap(), checksum_xor(&wire[..wire.len() - 1]));
        let (decoded, consumed) = decode_kwp2000s(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded.payload, frame.payload);
        assert_eq!(decoded.target, 0x40);
        assert_eq!(decoded.source, 0xF1);
    }

    #[test]
    fn test_ds2_addressing() {
        // Response: source is the device, wire addr must be the device.
        let response = Frame::response(0x38, vec![0x61, 0x01]);
        let wire = encode_ds2(&response).unwrap();
        assert_eq!(wire[0], 0x38);
        assert_eq!(wire[1], 5);

        // Echo of a tester request: fall back to the target address.
        let request = Frame::new(0x38, TESTER_ADDR, vec![0x21, 0x01]);
        let echo = encode_ds2(&request).unwrap();
        assert_eq!(echo[0], 0x38);

        let (decoded, consumed) = decode_ds2(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded.target, 0x38);
        assert_eq!(decoded.source, TESTER_ADDR);
        assert_eq!(decoded.payload, vec![0x61, 0x01]);
    }

    #[test]
    fn test_ds2_checksum_is_xor() {
        let wire = encode_ds2(&Frame::response(0x12, vec![0xA0])).unwrap();
        assert_eq!(*wire.last().unwrap(), checksum_xor(&wire[..wire.len() - 1]));
    }

    #[test]
    fn test_frame_from_raw_without_checksum() {
        let frame = frame_from_raw(&[0x82, 0xF1, 0x38, 0x58, 0x00]).unwrap();
        assert_eq!(frame.target, 0xF1);
        assert_eq!(frame.source, 0x38);
        assert_eq!(frame.payload, vec![0x58, 0x00]);
    }

    #[test]
    fn test_empty_payload_rejected() {
        let frame = Frame::new(0x38, 0xF1, Vec::new());
        assert!(matches!(
            encode_bmw_fast(&frame),
            Err(CodecError::Length(0))
        ));
    }
}
