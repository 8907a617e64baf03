//! CAN session loop: ISO-TP transport carrying the canonical telegram
//! layout.
//!
//! The transport already yields whole frames, so there is no wire echo
//! and no per-concept translation here.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::codec::encode_bmw_fast;
use crate::error::Result;
use crate::isotp::{CanIo, IsoTpChannel};
use crate::sim::EcuSimulator;

/// One pass of the CAN loop: advance the vehicle state, then serve at
/// most one reassembled request.
pub(super) fn can_iteration<C: CanIo>(
    channel: &mut IsoTpChannel<C>,
    sim: &mut EcuSimulator,
) -> Result<()> {
    sim.tick();

    let frame = match channel.receive()? {
        Some(frame) => frame,
        None => return Ok(()),
    };
    let canonical = encode_bmw_fast(&frame)?;

    for reply in sim.process(&canonical) {
        if reply.delay_ms > 0 {
            thread::sleep(Duration::from_millis(reply.delay_ms));
        }
        if !channel.send(&reply.frame)? {
            debug!("flow control missing, response dropped");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TESTER_ADDR;
    use crate::config::{ConfigData, Profile};
    use crate::isotp::{CanFrame, CAN_ID_BASE};
    use crate::sim::Toggles;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;

    /// Scripted bus that answers every First Frame with an open Flow
    /// Control, as the tester side would.
    #[derive(Default)]
    struct MockCan {
        rx: VecDeque<CanFrame>,
        tx: Vec<CanFrame>,
    }

    impl CanIo for MockCan {
        fn send(&mut self, frame: &CanFrame) -> io::Result<()> {
            self.tx.push(*frame);
            let data = frame.data();
            if data.len() >= 2 && data[1] >> 4 == 1 {
                self.rx.push_back(CanFrame::new(
                    CAN_ID_BASE + data[0] as u16,
                    &[(frame.id & 0xFF) as u8, 0x30, 0x00, 0x00],
                ));
            }
            Ok(())
        }

        fn recv(&mut self, _timeout: Duration) -> io::Result<Option<CanFrame>> {
            Ok(self.rx.pop_front())
        }
    }

    fn tester_frame(device: u8, payload: &[u8]) -> CanFrame {
        let mut data = vec![device, payload.len() as u8];
        data.extend_from_slice(payload);
        CanFrame::new(CAN_ID_BASE + TESTER_ADDR as u16, &data)
    }

    #[test]
    fn test_single_frame_round_trip() {
        let mut bus = MockCan::default();
        bus.rx.push_back(tester_frame(0x38, &[0x3E]));
        let mut channel = IsoTpChannel::new(bus);

        let mut sim = EcuSimulator::new(
            Profile::None,
            ConfigData::default(),
            Arc::new(Toggles::default()),
        );
        can_iteration(&mut channel, &mut sim).unwrap();

        let bus = channel.into_inner();
        assert_eq!(bus.tx.len(), 1);
        assert_eq!(bus.tx[0].id, CAN_ID_BASE + 0x38);
        assert_eq!(bus.tx[0].data(), &[TESTER_ADDR, 0x03, 0x7E, 0x00, 0x00]);
    }

    #[test]
    fn test_large_response_segmented() {
        let mut bus = MockCan::default();
        bus.rx.push_back(tester_frame(0x12, &[0x80]));
        let mut channel = IsoTpChannel::new(bus);

        let json = r#"{
            "entries": [{
                "request": "81 12 F1 80 00",
                "responses": ["8C F1 12 C0 01 02 03 04 05 06 07 08 09 0A 0B 00"]
            }]
        }"#;
        let config = ConfigData::from_json(json).unwrap();
        let mut sim =
            EcuSimulator::new(Profile::None, config, Arc::new(Toggles::default()));

        can_iteration(&mut channel, &mut sim).unwrap();

        let bus = channel.into_inner();
        // first frame plus at least one consecutive frame
        assert!(bus.tx.len() >= 2);
        assert_eq!(bus.tx[0].id, CAN_ID_BASE + 0x12);
        assert_eq!(bus.tx[0].data()[1] >> 4, 1);
        assert_eq!(bus.tx[1].data()[1], 0x21);
    }

    #[test]
    fn test_idle_loop_sends_nothing() {
        let mut channel = IsoTpChannel::new(MockCan::default());
        let mut sim = EcuSimulator::new(
            Profile::None,
            ConfigData::default(),
            Arc::new(Toggles::default()),
        );
        can_iteration(&mut channel, &mut sim).unwrap();
        assert!(channel.into_inner().tx.is_empty());
    }
}
