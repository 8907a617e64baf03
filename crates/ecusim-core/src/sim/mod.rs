//! The simulated vehicle.
//!
//! [`EcuSimulator`] consumes complete request telegrams in the canonical
//! BMW-FAST layout (checksum included) and produces response frames. The
//! transports never reach in here; they hand telegrams over and write
//! whatever comes back.
//!
//! Dispatch order for every request: the universal services all devices
//! answer, then the selected device profile, then the user-supplied
//! response table, then a dummy error-memory answer so functional error
//! scans never stall.

mod e61;
mod e90;
pub mod state;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{frame_from_raw, Frame, TESTER_ADDR};
use crate::config::{ConfigData, Profile};

pub use state::{EcuState, Toggles};

/// One response the transport has to send, optionally after a pause.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The response frame.
    pub frame: Frame,
    /// Milliseconds to wait before sending, almost always zero.
    pub delay_ms: u64,
}

impl Reply {
    fn new(frame: Frame) -> Self {
        Reply { frame, delay_ms: 0 }
    }
}

/// Response accumulator for the device handlers.
///
/// Handlers build raw telegrams (header, addresses, payload, no
/// checksum); parsing happens once here so a malformed canned block is
/// logged instead of sent.
#[derive(Debug, Default)]
pub(crate) struct Replies(Vec<Reply>);

impl Replies {
    pub(crate) fn new() -> Self {
        Replies(Vec::new())
    }

    pub(crate) fn push_raw(&mut self, raw: &[u8]) {
        match frame_from_raw(raw) {
            Ok(frame) => self.0.push(Reply::new(frame)),
            Err(err) => warn!("dropping malformed response telegram: {}", err),
        }
    }

    pub(crate) fn push_raw_delayed(&mut self, raw: &[u8], delay_ms: u64) {
        match frame_from_raw(raw) {
            Ok(frame) => self.0.push(Reply { frame, delay_ms }),
            Err(err) => warn!("dropping malformed response telegram: {}", err),
        }
    }

    fn into_vec(self) -> Vec<Reply> {
        self.0
    }
}

/// Telegram byte access that treats everything past the end as zero,
/// like the fixed receive buffers the handlers were written against.
pub(crate) fn at(telegram: &[u8], index: usize) -> u8 {
    telegram.get(index).copied().unwrap_or(0)
}

/// Packed BCD for wall-clock fields.
pub(crate) fn int_to_bcd(value: u32) -> u8 {
    ((value % 10) + ((value / 10) << 4)) as u8
}

/// The device side of a diagnostic session.
pub struct EcuSimulator {
    profile: Profile,
    config: ConfigData,
    toggles: Arc<Toggles>,
    state: EcuState,
}

impl EcuSimulator {
    /// Builds a simulator for one session.
    pub fn new(profile: Profile, config: ConfigData, toggles: Arc<Toggles>) -> Self {
        EcuSimulator {
            profile,
            config,
            toggles,
            state: EcuState::new(),
        }
    }

    /// Shared toggles handle.
    pub fn toggles(&self) -> Arc<Toggles> {
        Arc::clone(&self.toggles)
    }

    /// Vehicle state, exposed for tests and the status display.
    pub fn state(&self) -> &EcuState {
        &self.state
    }

    /// Called once when the session loop starts: response table cursors
    /// restart from their first alternative.
    pub fn session_start(&mut self) {
        self.config.reset();
    }

    /// Called when a tester (re)connects.
    pub fn reset_connection(&mut self) {
        self.state.reset_connection();
    }

    /// Unprompted telegrams the block-oriented loops send at startup.
    pub fn response_only(&self) -> &[Vec<u8>] {
        &self.config.response_only
    }

    /// Wake-up configuration bytes for the block-oriented concepts.
    pub fn wakeup(&self) -> &[u8] {
        &self.config.wakeup
    }

    /// First response alternative for a request, checksum-insensitive.
    /// Used by the loops that bypass frame dispatch entirely.
    pub fn lookup_first(&self, telegram: &[u8]) -> Option<&[u8]> {
        self.config
            .entries
            .iter()
            .find(|entry| entry.matches(telegram))
            .and_then(|entry| entry.first_response())
    }

    /// Multi-telegram response blocks for a block-exchange request,
    /// ignoring the block counter byte. An entry without a block list
    /// has nothing to queue and yields `None`.
    pub fn lookup_blocks(&self, block: &[u8]) -> Option<Vec<Vec<u8>>> {
        for entry in &self.config.entries {
            if block.len() != entry.request.len() {
                continue;
            }
            let equal = block
                .iter()
                .zip(entry.request.iter())
                .enumerate()
                .all(|(i, (a, b))| i == 1 || a == b);
            if equal {
                if entry.multi.is_empty() {
                    return None;
                }
                return Some(entry.multi.clone());
            }
        }
        None
    }

    /// Advances the vehicle state by one loop iteration.
    pub fn tick(&mut self) {
        if self.toggles.take_error_restore() {
            self.state.error_reset_list.clear();
        }
        self.state
            .tick(self.toggles.variable_values(), self.toggles.moving());
    }

    /// Dispatches one request telegram and returns the responses.
    ///
    /// The telegram includes its checksum byte; the transports validate
    /// it before calling in. An empty result means silence, either by
    /// request suppression or because nothing matched.
    pub fn process(&mut self, telegram: &[u8]) -> Vec<Reply> {
        if self.state.no_response_count > 0 {
            self.state.no_response_count -= 1;
            return Vec::new();
        }

        if let Some(replies) = self.universal_services(telegram) {
            return replies;
        }

        let handled = match self.profile {
            Profile::E61 => {
                e61::respond(&mut self.state, telegram, self.toggles.variable_values())
            }
            Profile::E90 => e90::respond(&mut self.state, telegram),
            Profile::None => None,
        };
        if let Some(replies) = handled {
            return replies.into_vec();
        }

        if let Some(replies) = self.lookup_table(telegram) {
            return replies;
        }

        if is_error_read(telegram) {
            // dummy empty error memory so scans across all devices finish
            return dummy_error_reply(at(telegram, 1));
        }

        debug!("no response for request: {:02X?}", telegram);
        Vec::new()
    }

    /// The services every device answers identically.
    fn universal_services(&mut self, t: &[u8]) -> Option<Vec<Reply>> {
        if at(t, 2) != TESTER_ADDR {
            return None;
        }
        let device = at(t, 1);
        if at(t, 0) == 0x81 && at(t, 3) == 0x81 {
            debug!("start communication, device {:02X}", device);
            let mut replies = Replies::new();
            replies.push_raw(&[0x83, TESTER_ADDR, device, 0xC1, 0xDF, 0x8F]);
            return Some(replies.into_vec());
        }
        if at(t, 0) == 0x81 && at(t, 3) == 0x3E {
            debug!("tester present, device {:02X}", device);
            let mut replies = Replies::new();
            replies.push_raw(&[0x83, TESTER_ADDR, device, 0x7E, 0x00, 0x00]);
            return Some(replies.into_vec());
        }
        if at(t, 0) == 0x81 && at(t, 3) == 0x20 {
            debug!("stop diagnosis, device {:02X}", device);
            let mut replies = Replies::new();
            replies.push_raw(&[0x83, TESTER_ADDR, device, 0x60, 0x00, 0x00]);
            return Some(replies.into_vec());
        }
        if at(t, 0) == 0x83 && at(t, 3) == 0x14 && at(t, 4) == 0xFF && at(t, 5) == 0xFF {
            // error reset: this device reports an empty memory from now on
            if !self.state.error_reset_list.contains(&device) {
                self.state.error_reset_list.push(device);
            }
            let mut replies = Replies::new();
            replies.push_raw(&[0x83, TESTER_ADDR, device, 0x54, 0xFF, 0xFF]);
            return Some(replies.into_vec());
        }
        if is_error_read(t) && self.state.error_reset_list.contains(&device) {
            return Some(dummy_error_reply(device));
        }
        None
    }

    fn lookup_table(&mut self, telegram: &[u8]) -> Option<Vec<Reply>> {
        let entry = self
            .config
            .entries
            .iter_mut()
            .find(|entry| entry.matches(telegram))?;
        let mut replies = Replies::new();
        for raw in entry.next_response() {
            replies.push_raw(&raw);
        }
        Some(replies.into_vec())
    }
}

/// `18 02 FF FF` error memory read, any device.
fn is_error_read(t: &[u8]) -> bool {
    at(t, 0) == 0x84
        && at(t, 2) == TESTER_ADDR
        && at(t, 3) == 0x18
        && at(t, 4) == 0x02
        && at(t, 5) == 0xFF
        && at(t, 6) == 0xFF
}

/// Empty error memory response.
fn dummy_error_reply(device: u8) -> Vec<Reply> {
    let mut replies = Replies::new();
    replies.push_raw(&[0x82, TESTER_ADDR, device, 0x58, 0x00]);
    replies.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_bmw_fast;
    use pretty_assertions::assert_eq;

    fn simulator(profile: Profile) -> EcuSimulator {
        EcuSimulator::new(profile, ConfigData::default(), Arc::new(Toggles::default()))
    }

    fn request(device: u8, payload: &[u8]) -> Vec<u8> {
        encode_bmw_fast(&Frame::new(device, TESTER_ADDR, payload.to_vec())).unwrap()
    }

    #[test]
    fn test_start_communication_any_device() {
        let mut sim = simulator(Profile::None);
        let replies = sim.process(&request(0x38, &[0x81]));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].frame.source, 0x38);
        assert_eq!(replies[0].frame.payload, vec![0xC1, 0xDF, 0x8F]);
    }

    #[test]
    fn test_tester_present() {
        let mut sim = simulator(Profile::None);
        let replies = sim.process(&request(0x12, &[0x3E]));
        assert_eq!(replies[0].frame.payload[0], 0x7E);
    }

    #[test]
    fn test_error_reset_silences_error_memory() {
        let mut sim = simulator(Profile::E61);
        // before the reset the profile serves a populated error memory
        let replies = sim.process(&request(0x38, &[0x18, 0x02, 0xFF, 0xFF]));
        assert_eq!(replies[0].frame.payload, vec![0x58, 0x01, 0x5F, 0xB4, 0x60]);

        let replies = sim.process(&request(0x38, &[0x14, 0xFF, 0xFF]));
        assert_eq!(replies[0].frame.payload, vec![0x54, 0xFF, 0xFF]);

        // afterwards the universal dummy wins over the profile
        let replies = sim.process(&request(0x38, &[0x18, 0x02, 0xFF, 0xFF]));
        assert_eq!(replies[0].frame.payload, vec![0x58, 0x00]);
    }

    #[test]
    fn test_error_restore_reenables_error_memory() {
        let mut sim = simulator(Profile::E61);
        sim.process(&request(0x38, &[0x14, 0xFF, 0xFF]));
        sim.toggles().restore_errors();
        sim.tick();
        let replies = sim.process(&request(0x38, &[0x18, 0x02, 0xFF, 0xFF]));
        assert_eq!(replies[0].frame.payload[1], 0x01);
    }

    #[test]
    fn test_unknown_device_error_read_gets_dummy() {
        let mut sim = simulator(Profile::None);
        let replies = sim.process(&request(0x99, &[0x18, 0x02, 0xFF, 0xFF]));
        assert_eq!(replies[0].frame.source, 0x99);
        assert_eq!(replies[0].frame.payload, vec![0x58, 0x00]);
    }

    #[test]
    fn test_response_suppression_counts_down() {
        let mut sim = simulator(Profile::None);
        sim.state.no_response_count = 1;
        assert!(sim.process(&request(0x38, &[0x3E])).is_empty());
        assert!(!sim.process(&request(0x38, &[0x3E])).is_empty());
    }

    #[test]
    fn test_table_round_robin_after_profile_miss() {
        let json = r#"{
            "entries": [{
                "request": "82 55 F1 21 01 00",
                "responses": ["84 F1 55 61 01 00 01 00", "84 F1 55 61 01 00 02 00"]
            }]
        }"#;
        let config = ConfigData::from_json(json).unwrap();
        let mut sim = EcuSimulator::new(Profile::E61, config, Arc::new(Toggles::default()));
        let req = request(0x55, &[0x21, 0x01]);
        assert_eq!(sim.process(&req)[0].frame.payload[3], 0x01);
        assert_eq!(sim.process(&req)[0].frame.payload[3], 0x02);
        assert_eq!(sim.process(&req)[0].frame.payload[3], 0x01);
    }

    #[test]
    fn test_unmatched_request_stays_silent() {
        let mut sim = simulator(Profile::None);
        assert!(sim.process(&request(0x38, &[0x21, 0xC1])).is_empty());
    }
}
