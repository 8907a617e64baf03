//! Wire-format codecs
//!
//! Converts between the canonical [`Frame`] representation and the serial
//! wire layouts (BMW-FAST, KWP2000S, DS2) with their checksums.
//!
//! BMW-FAST doubles as the internal canonical layout: the CAN and ENET
//! transports reassemble their payloads into it before dispatch.

mod frame;

pub use frame::{
    checksum_sum, checksum_xor, decode_bmw_fast, decode_ds2, decode_kwp2000s, encode_bmw_fast,
    encode_ds2, encode_kwp2000s, frame_from_raw, Frame,
};

/// Functional (broadcast) target addresses.
pub const FUNCTIONAL_ADDRS: [u8; 3] = [0xED, 0xEF, 0xDF];

/// Tester address used on the diagnostic side of every exchange.
pub const TESTER_ADDR: u8 = 0xF1;

/// Largest telegram any serial loop has to buffer.
pub const MAX_TELEGRAM_SIZE: usize = 260;

/// Returns true if `addr` is one of the functional broadcast addresses.
pub fn is_functional_addr(addr: u8) -> bool {
    FUNCTIONAL_ADDRS.contains(&addr)
}
