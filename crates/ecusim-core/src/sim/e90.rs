//! Motor-only profile: `2C 10` group reads with mixed result widths.
//!
//! Unlike the full profile this device answers items with one, two or
//! four result bytes depending on the address, so the response length
//! varies with the requested list.

use super::state::EcuState;
use super::{at, Replies};
use crate::codec::TESTER_ADDR;

pub(super) fn respond(state: &mut EcuState, t: &[u8]) -> Option<Replies> {
    if at(t, 0) & 0xC0 != 0x80
        || at(t, 1) != 0x12
        || at(t, 2) != TESTER_ADDR
        || at(t, 3) != 0x2C
        || at(t, 4) != 0x10
    {
        return None;
    }

    let mut req = t.to_vec();
    let mut items = ((at(&req, 0) & 0x3F) as i32 - 2) / 2;
    if items == 0 {
        if state.motor_backup.get(1) == Some(&0x12) {
            req = state.motor_backup.clone();
            items = ((at(&req, 0) & 0x3F) as i32 - 2) / 2;
        }
    } else {
        state.motor_backup = req.clone();
    }

    let mut out = vec![0x82, TESTER_ADDR, 0x12, 0x6C, 0x10];
    for j in 0..items.max(0) as usize {
        let item_addr = ((at(&req, 5 + j * 2) as u16) << 8) | at(&req, 6 + j * 2) as u16;
        let mut result_bytes = 2;
        let value: i64 = match item_addr {
            // refrigerant temp at the sensor, offset -40
            0x0005 => {
                result_bytes = 1;
                (50.0 + 40.0) as i64
            }
            // air mass from the flow meter, 0.01 kg/h steps
            0x0010 => (355.0 / 0.01) as i64,
            // battery voltage in mV
            0x0042 => (state.battery_voltage as f64 / 100.0 / 0.001) as i64,
            // corrected battery voltage, 0.389105 mV steps
            0x012C => (state.battery_voltage as f64 * 10.0 / 0.389_105) as i64,
            // boost pressure setpoint, 0.091554 mbar steps
            0x01F4 => (1938.0 / 0.091_554) as i64,
            // fuel temp, 0.01 C steps, offset -50
            0x0385 => ((40.3 + 50.0) / 0.01) as i64,
            // particle filter distance since regeneration, meters
            0x03EB => {
                result_bytes = 4;
                145_678
            }
            // particle filter regeneration lock, 0 released
            0x03EE => {
                result_bytes = 1;
                0
            }
            // particle filter regeneration request, 4 to 6 requested
            0x0404 => {
                result_bytes = 1;
                4
            }
            // exhaust temps, 0.031281 C steps, offset -50
            0x041B => ((165.3 + 50.0) / 0.031_281) as i64,
            0x041E => ((175.3 + 50.0) / 0.031_281) as i64,
            // exhaust back pressure in mbar
            0x0424 => 2943,
            // oil temp, 0.01 C steps, offset -100
            0x0458 => ((60.0 + 100.0) / 0.01) as i64,
            // refrigerant temp, 0.01 C steps, offset -100
            0x0547 => ((50.0 + 100.0) / 0.01) as i64,
            // particle filter regeneration state, bit 1 active
            0x05AA => {
                result_bytes = 4;
                0x02
            }
            // rail pressure setpoint and actual, 0.045777 mbar steps
            0x0641 => (1024.0 / 0.045_777) as i64,
            0x0672 => (1027.0 / 0.045_777) as i64,
            // air mass, 0.1 kg/h steps
            0x0708 => (350.0 / 0.1) as i64,
            // actual air mass, 0.024414 mg steps
            0x0709 => (527.0 / 0.024_414) as i64,
            // boost pressure actual, 0.091554 mbar steps
            0x076D => (1935.0 / 0.091_554) as i64,
            // charge air temp, 0.01 C steps, offset -100
            0x076F => ((60.1 + 100.0) / 0.01) as i64,
            // intake air temp in 0.1 K
            0x0772 => ((80.0 + 273.14) / 0.1) as i64,
            // air mass setpoint, 0.030518 mg steps
            0x079E => (523.0 / 0.030_518) as i64,
            // oil pressure switch
            0x0ABE => 0x0001,
            // motor temp in 0.1 K
            0x0AF1 => ((50.0 + 273.14) / 0.1) as i64,
            // particle filter remaining distance, 10 m steps
            0x0BA4 => (100_000.0 / 10.0) as i64,
            // ambient pressure, 0.030518 mbar steps
            0x0C1C => (935.0 / 0.030_518) as i64,
            // ambient temp in 0.1 K
            0x0FD2 => ((35.4 + 273.14) / 0.1) as i64,
            // motor rpm in half revolutions
            0x1881 => (400.0 / 0.5) as i64,
            _ => 0x0000,
        };
        if result_bytes >= 4 {
            out.push((value >> 24) as u8);
        }
        if result_bytes >= 3 {
            out.push((value >> 16) as u8);
        }
        if result_bytes >= 2 {
            out.push((value >> 8) as u8);
        }
        out.push(value as u8);
    }
    out[0] = 0x80 | (out.len() as u8 - 3);

    let mut replies = Replies::new();
    replies.push_raw(&out);
    Some(replies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_bmw_fast, Frame};
    use pretty_assertions::assert_eq;

    fn request(payload: &[u8]) -> Vec<u8> {
        encode_bmw_fast(&Frame::new(0x12, TESTER_ADDR, payload.to_vec())).unwrap()
    }

    #[test]
    fn test_mixed_result_widths() {
        let mut state = EcuState::new();
        // one-byte temp, four-byte distance, two-byte rpm
        let replies = respond(
            &mut state,
            &request(&[0x2C, 0x10, 0x00, 0x05, 0x03, 0xEB, 0x18, 0x81]),
        )
        .expect("handler should match")
        .0;
        let payload = &replies[0].frame.payload;
        assert_eq!(
            payload,
            &vec![0x6C, 0x10, 90, 0x00, 0x02, 0x39, 0x0E, 0x03, 0x20]
        );
    }

    #[test]
    fn test_battery_items_follow_state() {
        let mut state = EcuState::new();
        state.battery_voltage = 1250;
        let replies = respond(&mut state, &request(&[0x2C, 0x10, 0x00, 0x42, 0x01, 0x2C]))
            .expect("handler should match")
            .0;
        let payload = &replies[0].frame.payload;
        assert_eq!(&payload[2..4], &12500u16.to_be_bytes());
        let corrected = (1250.0 * 10.0 / 0.389_105) as u16;
        assert_eq!(&payload[4..6], &corrected.to_be_bytes());
    }

    #[test]
    fn test_empty_list_replays_backup() {
        let mut state = EcuState::new();
        respond(&mut state, &request(&[0x2C, 0x10, 0x18, 0x81]))
            .expect("handler should match");
        let replies = respond(&mut state, &request(&[0x2C, 0x10]))
            .expect("handler should match")
            .0;
        assert_eq!(replies[0].frame.payload, vec![0x6C, 0x10, 0x03, 0x20]);
    }

    #[test]
    fn test_other_services_fall_through() {
        let mut state = EcuState::new();
        assert!(respond(&mut state, &request(&[0x1A, 0x80])).is_none());
        assert!(respond(&mut state, &request(&[0x18, 0x02, 0xFF, 0xFF])).is_none());
    }
}
