//! Device handlers for the full multi-device vehicle profile.
//!
//! One handler per device address, matched on the raw request telegram.
//! Identification blocks and error logs are canned; measurement blocks
//! splice live state into a canned skeleton the way the real devices
//! lay their answers out.

use chrono::{Datelike, Timelike, Utc};

use super::state::EcuState;
use super::{at, int_to_bcd, Replies};
use crate::codec::TESTER_ADDR;

/// Full-scale milliseconds of an angular position field.
const ANGLE_FULL_SCALE_MS: i64 = 180 * 60 * 60 * 1000;

pub(super) fn respond(
    state: &mut EcuState,
    t: &[u8],
    variable_values: bool,
) -> Option<Replies> {
    if at(t, 2) != TESTER_ADDR {
        return None;
    }
    match at(t, 1) {
        0x38 => axis_unit(state, t),
        0x12 => motor_unit(state, t),
        0xA0 => nav_unit(t, variable_values),
        0x40 => car_access(t),
        0x60 => device_60(t),
        0x70 => device_70(t),
        0x73 => central_display(t),
        0x78 => climate_unit(t),
        0x64 => park_distance(t),
        0x65 => switch_center(t),
        _ => None,
    }
}

// 0x38: ride height control

const RESP_38_1802FFFF: [u8; 8] = [0x85, 0xF1, 0x38, 0x58, 0x01, 0x5F, 0xB4, 0x60];

const RESP_38_175FB4: [u8; 18] = [
    0x8F, 0xF1, 0x38, 0x57, 0x01, 0x5F, 0xB4, 0x60, 0x01, 0x28, 0x44, 0x53, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00,
];

const RESP_38_1A80: [u8; 34] = [
    0x9F, 0xF1, 0x38, 0x5A, 0x80, 0x00, 0x00, 0x06, 0x78, 0x43, 0x14, 0x04, 0x11, 0x02, 0xB0,
    0x4E, 0x4C, 0x20, 0x07, 0x04, 0x23, 0x66, 0x00, 0x10, 0x72, 0x06, 0x3F, 0x01, 0x03, 0x01,
    0x04, 0x00, 0x00, 0x00,
];

const RESP_38_21C2: [u8; 20] = [
    0x90, 0xF1, 0x38, 0x61, 0xC2, 0x03, 0xA1, 0x04, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01,
    0x01, 0x01, 0x00, 0x00, 0x8A,
];

const RESP_38_2230: [u8; 171] = [
    0x80, 0xF1, 0x38, 0xA7, 0x62, 0x30, 0x00, 0x07, 0x11, 0x00, 0x01, 0xF4, 0x01, 0xF4, 0x01,
    0xF4, 0x01, 0xAC, 0x03, 0x72, 0x06, 0xC2, 0x01, 0x26, 0x02, 0x04, 0xFF, 0xBC, 0x00, 0xBC,
    0x00, 0x52, 0x02, 0xAE, 0x01, 0xFF, 0xFF, 0x28, 0x00, 0xB8, 0x03, 0xFF, 0xFF, 0xFF, 0xAA,
    0xE0, 0x10, 0xE0, 0x0B, 0x32, 0x04, 0x11, 0x13, 0x84, 0x03, 0xB0, 0x04, 0x10, 0x0E, 0x84,
    0x03, 0x78, 0x05, 0x0E, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x06, 0x00, 0x0A, 0x00,
    0xD0, 0x20, 0x1A, 0x23, 0x32, 0xFF, 0x3C, 0x05, 0x32, 0xFF, 0x19, 0x03, 0x18, 0x1C, 0x1E,
    0xFF, 0x40, 0x9C, 0xF7, 0x09, 0xF9, 0x07, 0xD9, 0x00, 0xD0, 0x07, 0xFA, 0x06, 0xFC, 0x04,
    0xFF, 0xFF, 0xF7, 0x09, 0xF9, 0x07, 0xF7, 0x09, 0xF9, 0x07, 0x00, 0x00, 0x1E, 0x1E, 0xFF,
    0xFF, 0xF1, 0xFF, 0x0F, 0x00, 0x91, 0xE6, 0x6F, 0x19, 0x91, 0xE6, 0x6F, 0x19, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0x0A, 0xC8, 0x00, 0x64, 0x00, 0xFD, 0xFF, 0x64, 0x00, 0x0A, 0x01, 0x12,
    0x05, 0x12, 0x0A, 0x03, 0x64, 0x08, 0x64, 0x08, 0x64, 0x01, 0xB4, 0x00, 0xFC, 0x04, 0xFC,
    0x04, 0x01, 0xFF, 0x64, 0xDE, 0x42,
];

fn axis_unit(state: &mut EcuState, t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0xC1 {
        // axis position: raw and filtered, fast and slow channel
        let pos_filt = state.axis_pos_filt.round() as i32;
        replies.push_raw(&[
            0x8A,
            TESTER_ADDR,
            0x38,
            0x61,
            0xC1,
            state.axis_pos_raw as u8,
            (state.axis_pos_raw + 2) as u8,
            pos_filt as u8,
            (pos_filt + 2) as u8,
            0x00,
            0x00,
            0x00,
            0x00,
        ]);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0xC0 {
        // supply and sensor voltages, battery in 10 mV little-endian
        replies.push_raw(&[
            0x8D,
            TESTER_ADDR,
            0x38,
            0x61,
            0xC0,
            0x0E,
            0x00,
            0x17,
            0x00,
            state.battery_voltage as u8,
            (state.battery_voltage >> 8) as u8,
            0xF9,
            0x01,
            0xF7,
            0x01,
            0x4E,
        ]);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0xC2 {
        // digital status with door contact and speed
        let mut out = RESP_38_21C2.to_vec();
        out[11] = if state.speed < 10 { 0x00 } else { 0x01 };
        out[12] = state.speed as u8;
        replies.push_raw(&out);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0xAC {
        replies.push_raw(&[
            0x85,
            TESTER_ADDR,
            0x38,
            0x61,
            0xAC,
            state.compressor_running_time as u8,
            (state.compressor_running_time >> 8) as u8,
            0x00,
        ]);
    } else if at(t, 0) == 0x86 && at(t, 3) == 0x30 && at(t, 4) == 0x41 && at(t, 5) == 0x01 {
        replies.push_raw(&[
            0x85, TESTER_ADDR, 0x38, 0x70, 0x41, 0x01, 0x00, state.mode,
        ]);
    } else if at(t, 0) >= 0x83
        && at(t, 3) == 0x30
        && (0x11..=0x14).contains(&at(t, 4))
        && at(t, 5) == 0x01
    {
        let channel = (at(t, 4) - 0x11) as usize;
        let active = if state.outputs & (1 << channel) != 0 {
            0x01
        } else {
            0x00
        };
        replies.push_raw(&[
            0x85,
            TESTER_ADDR,
            0x38,
            0x70,
            at(t, 4),
            0x01,
            0x00,
            active,
        ]);
    } else if at(t, 0) == 0x86
        && at(t, 3) == 0x30
        && (0x11..=0x14).contains(&at(t, 4))
        && at(t, 5) == 0x07
    {
        // valve write, reverted by the actuation timer
        let channel = (at(t, 4) - 0x11) as usize;
        replies.push_raw(&[
            0x86,
            TESTER_ADDR,
            0x38,
            0x70,
            at(t, 4),
            0x07,
            0x00,
            at(t, 7),
            at(t, 8),
        ]);
        state.start_valve_timer(channel);
        if at(t, 7) & 0x01 != 0 {
            state.outputs |= 1 << channel;
        } else {
            state.outputs &= !(1 << channel);
        }
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x31 && at(t, 4) == 0x0C {
        replies.push_raw(&[0x83, TESTER_ADDR, 0x38, 0x71, 0x0C, at(t, 5)]);
        // the first response after a mode change is swallowed
        let new_mode = match at(t, 5) {
            0x00 => Some(0x00),
            0x01 => Some(0x02),
            0x02 => Some(0x04),
            0x04 => Some(0x40),
            _ => None,
        };
        if let Some(new_mode) = new_mode {
            if state.mode != new_mode {
                state.no_response_count = 1;
            }
            state.mode = new_mode;
        }
    } else if error_read(t) {
        replies.push_raw(&RESP_38_1802FFFF);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x17 && at(t, 4) == 0x5F && at(t, 5) == 0xB4 {
        let mut out = RESP_38_175FB4.to_vec();
        out[8] = 3; // occurrence counter
        out[9] = 20; // logistic counter
        put_u16(&mut out, 10, (123456 >> 3) as u16); // odometer, 8 km steps
        put_u16(&mut out, 12, 0x1234);
        put_u16(&mut out, 14, 0x2345);
        put_u16(&mut out, 16, 0x3456);
        replies.push_raw(&out);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_38_1A80);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x30 {
        replies.push_raw(&RESP_38_2230);
    } else {
        return None;
    }
    Some(replies)
}

// 0x12: diesel motor unit

const RESP_12_1A80: [u8; 63] = [
    0xBC, 0xF1, 0x12, 0x5A, 0x80, 0x00, 0x00, 0x07, 0x80, 0x81, 0x25, 0x00, 0x00, 0x00, 0x12,
    0x4C, 0x50, 0x20, 0x08, 0x02, 0x15, 0x08, 0x08, 0x02, 0x30, 0x39, 0x34, 0x37, 0x03, 0x03,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x79, 0x51, 0x46, 0x31, 0x65, 0x57, 0x28, 0x30,
    0x30, 0x38, 0x39, 0x51, 0x39, 0x30, 0x30, 0x30, 0x38, 0x39, 0x51, 0x39, 0x30, 0x41, 0x39,
    0x34, 0x37, 0x42,
];

const RESP_12_1A94: [u8; 15] = [
    0x8C, 0xF1, 0x12, 0x5A, 0x94, 0x31, 0x30, 0x33, 0x37, 0x33, 0x38, 0x39, 0x38, 0x38, 0x32,
];

const RESP_12_2120: [u8; 15] = [
    0x8C, 0xF1, 0x12, 0x61, 0x20, 0x4F, 0x5F, 0x46, 0x31, 0x52, 0x39, 0x34, 0x37, 0x20, 0x20,
];

const RESP_12_224021: [u8; 26] = [
    0x97, 0xF1, 0x12, 0x62, 0x40, 0x21, 0x39, 0x31, 0x33, 0x32, 0x32, 0x35, 0x30, 0x06, 0x39,
    0xB9, 0x20, 0x04, 0x3C, 0x39, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const RESP_12_224022: [u8; 81] = [
    0x80, 0xF1, 0x12, 0x4D, 0x62, 0x40, 0x22, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    0x00, 0x36, 0x02, 0x35, 0xF7, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x36, 0x02,
    0x33, 0x47, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x88, 0x4B, 0xFF,
    0x00, 0x0E, 0x00, 0xF5, 0x00, 0x00,
];

const RESP_12_224023: [u8; 35] = [
    0xA0, 0xF1, 0x12, 0x62, 0x40, 0x23, 0x5B, 0x00, 0xAA, 0x00, 0x00, 0x01, 0x01, 0xFF, 0xFF,
    0xFF, 0xFF, 0x4D, 0x4F, 0xFF, 0xFF, 0xFF, 0xFF, 0xAA, 0xB3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x00, 0x15, 0x00, 0x00, 0x00,
];

const RESP_12_23_000740: [u8; 69] = [
    0x80, 0xF1, 0x12, 0x41, 0x63, 0x40, 0x43, 0x5A, 0x34, 0x38, 0x39, 0x36, 0x38, 0x20, 0x09,
    0x01, 0x12, 0x00, 0x00, 0x07, 0x81, 0x17, 0x42, 0x00, 0x00, 0x07, 0x81, 0x17, 0x48, 0x00,
    0x00, 0x07, 0x79, 0x67, 0x25, 0x01, 0x11, 0x11, 0x31, 0x32, 0x33, 0x34, 0x35, 0x4C, 0x30,
    0x30, 0x38, 0x39, 0x51, 0x39, 0x30, 0x41, 0x39, 0x34, 0x37, 0x42, 0x57, 0x42, 0x41, 0x50,
    0x58, 0x31, 0x31, 0x30, 0x35, 0x30, 0xFF, 0xFF, 0xFF,
];

const RESP_12_23_400740: [u8; 69] = [
    0x80, 0xF1, 0x12, 0x41, 0x63, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const RESP_12_174232: [u8; 37] = [
    0xA2, 0xF1, 0x12, 0x57, 0x01, 0x42, 0x32, 0x24, 0x06, 0x00, 0x00, 0x21, 0x28, 0x42, 0x3F,
    0x1F, 0x43, 0x36, 0x2F, 0x51, 0x64, 0x00, 0x58, 0x00, 0x93, 0x43, 0xD0, 0x1F, 0x43, 0x37,
    0x31, 0x51, 0x64, 0x00, 0x57, 0x00, 0x93,
];

const RESP_12_222000: [u8; 7] = [0x84, 0xF1, 0x12, 0x62, 0x20, 0x00, 0x00];

fn motor_unit(state: &mut EcuState, t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x83 && at(t, 3) == 0x31 && at(t, 4) == 0x85 {
        // idle speed controller write, reverted by the actuation timer
        state.idle_speed_control = at(t, 5);
        state.start_idle_speed_timer();
        replies.push_raw(&[
            0x83,
            TESTER_ADDR,
            0x12,
            0x71,
            0x85,
            state.idle_speed_control,
        ]);
    } else if at(t, 0) & 0xC0 == 0x80 && at(t, 3) == 0x2C && at(t, 4) == 0x10 {
        replies.push_raw(&motor_telemetry(state, t));
    } else if error_read(t) {
        // summary with one stored error, code 4222
        replies.push_raw(&[
            0x88, 0xF1, 0x12, 0x58, 0x02, 0x42, 0x32, 0x24, 0x42, 0x22, 0x24,
        ]);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x17 && at(t, 4) == 0x42 && at(t, 5) == 0x32 {
        replies.push_raw(&RESP_12_174232);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x17 && at(t, 4) == 0x42 && at(t, 5) == 0x22 {
        replies.push_raw(&error_detail_4222());
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x20 && at(t, 5) == 0x00 {
        replies.push_raw(&RESP_12_222000);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_12_1A80);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x94 {
        replies.push_raw(&RESP_12_1A94);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0x20 {
        replies.push_raw(&RESP_12_2120);
    } else if at(t, 0) == 0x86
        && at(t, 3) == 0x23
        && at(t, 4) == 0x00
        && at(t, 5) == 0x00
        && at(t, 6) == 0x00
        && at(t, 7) == 0x07
        && at(t, 8) == 0x40
    {
        replies.push_raw(&RESP_12_23_000740);
    } else if at(t, 0) == 0x86
        && at(t, 3) == 0x23
        && at(t, 4) == 0x00
        && at(t, 5) == 0x00
        && at(t, 6) == 0x40
        && at(t, 7) == 0x07
        && at(t, 8) == 0x40
    {
        replies.push_raw(&RESP_12_23_400740);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x40 && at(t, 5) == 0x21 {
        replies.push_raw(&RESP_12_224021);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x40 && at(t, 5) == 0x22 {
        replies.push_raw(&power_management_info());
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x40 && at(t, 5) == 0x23 {
        replies.push_raw(&battery_health_info());
    } else {
        return None;
    }
    Some(replies)
}

/// `2C 10` group read: two bytes per requested address, big-endian.
///
/// An empty address list re-reads the previous one, which lets testers
/// poll with a short telegram once the list is set up.
fn motor_telemetry(state: &mut EcuState, t: &[u8]) -> Vec<u8> {
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
        let item_addr =
            ((at(&req, 5 + j * 2) as u16) << 8) | at(&req, 6 + j * 2) as u16;
        let idle_active = state.idle_speed_active();
        let value: i64 = match item_addr {
            // temp [C] + 41.08
            0x0005 => (50.0 + 41.08) as i64,
            // air mass, 0x7FFF centered, 3200 full scale
            0x0080 => 350 * 0xFFFF / 3200 + 0x7FFF,
            0x0081 => (527 + 1600) * 0xFFFF / 3200,
            // pedal sensors, 0x1FFF == 5 V
            0x0089 => (3.5 * 0x1FFF as f64 / 5.0) as i64,
            0x008A => (1.3 * 0x1FFF as f64 / 5.0) as i64,
            // pressures, 0x8000 == 4096 mbar
            0x008B => 935 * 0x8000 / 4096,
            0x008D => (523 + 1600) * 0xFFFF / 3200,
            0x0091 => 1935 * 0x8000 / 4096,
            // battery, 0x7F3C == 80.00 V
            0x0093 => state.battery_voltage as i64 * 0x7F3C / 8000,
            // temps, (t + 50.1) * 0x8000 / 550.0
            0x0095 => ((50.0 + 50.1) * 0x8000 as f64 / 550.0) as i64,
            0x009B => 0x0002,
            0x009E => 400 * 8,
            0x00A0 => ((40.3 + 50.1) * 0x8000 as f64 / 550.0) as i64,
            0x00AD => ((80.0 + 50.1) * 0x8000 as f64 / 550.0) as i64,
            0x00AE => ((60.1 + 50.1) * 0x8000 as f64 / 550.0) as i64,
            0x00C6 => 1938 * 0x8000 / 4096,
            0x00BF => 0x0001,
            // exhaust temps, (t + 51.1) * 0x8000 / 32776.0
            0x00C2 => ((175.3 + 51.1) * 0x8000 as f64 / 32776.0) as i64,
            0x00CA => ((165.3 + 51.1) * 0x8000 as f64 / 32776.0) as i64,
            // particle filter distance, 128 m steps
            0x00D1 => 145678 >> 7,
            0x00D8 => 2943 * 0x8000 / 4096,
            0x00DD => 0x0000,
            // rail pressure, 0x8000 == 1000 mbar
            0x00DF => 1027 * 0x8000 / 1000,
            0x00E1 => 1024 * 0x8000 / 1000,
            0x13EC => 0x0001,
            0x13ED => 0x0001,
            0x146E => 0x0001,
            0x1482 => 0x006F,
            0x15E4 => 0x0001,
            0x15E5 => ((35.4 + 50.1) * 0x8000 as f64 / 550.0) as i64,
            0x1645 => 0x0000,
            // cylinder speeds, only while the idle controller runs
            0x1770 if idle_active && state.idle_speed_control == 0x01 => {
                (123.4 * 0xFFFF as f64 / 8192.0) as i64
            }
            0x1771 if idle_active && state.idle_speed_control == 0x01 => {
                (234.5 * 0xFFFF as f64 / 8192.0) as i64
            }
            0x1772 if idle_active && state.idle_speed_control == 0x01 => {
                (345.6 * 0xFFFF as f64 / 8192.0) as i64
            }
            0x1773 if idle_active && state.idle_speed_control == 0x01 => {
                (456.7 * 0xFFFF as f64 / 8192.0) as i64
            }
            // quantity corrections, only with the controller off
            0x177A if idle_active && state.idle_speed_control == 0x00 => {
                ((3.45 + 100.0) * 0xFFFF as f64 / 200.0) as i64
            }
            0x177B if idle_active && state.idle_speed_control == 0x00 => {
                ((1.23 + 100.0) * 0xFFFF as f64 / 200.0) as i64
            }
            0x177C if idle_active && state.idle_speed_control == 0x00 => {
                ((-4.56 + 100.0) * 0xFFFF as f64 / 200.0) as i64
            }
            0x177D if idle_active && state.idle_speed_control == 0x00 => {
                ((-1.45 + 100.0) * 0xFFFF as f64 / 200.0) as i64
            }
            0x1952 => 0x0000,
            _ => 0x0000,
        };
        out.push((value >> 8) as u8);
        out.push(value as u8);
    }
    out[0] = 0x80 | (out.len() as u8 - 3);
    out
}

/// `17 42 22` error detail: the canned 4232 block rewritten for error
/// 4222 with environment data filled in.
fn error_detail_4222() -> Vec<u8> {
    let mut out = RESP_12_174232.to_vec();
    out[6] = 0x22;
    out[7] = 0x24; // error type: below threshold, stored
    out[8] = 0x07; // both freeze frames valid
    put_u16(&mut out, 9, 0x1234);
    out[11] = 10; // occurrence counter
    out[12] = 50; // logistic counter
    // freeze frame 1
    put_u16(&mut out, 13, (123456 >> 3) as u16); // odometer, 8 km steps
    out[15] = (1000.0 * 0xFF as f64 / 7033.54) as u8; // rpm
    out[16] = (100.0 + 50.27) as u8; // coolant temp
    out[17] = (1500.0 * 0xFF as f64 / 2008.62) as u8; // rail pressure
    out[18] = (50.0 * 0xFF as f64 / 100.43) as u8; // injection quantity
    out[19] = (1000.0 * 0xFF as f64 / 1606.89) as u8; // air mass per cylinder
    out[20] = (2000.0 * 0xFF as f64 / 2510.77) as u8; // boost pressure
    out[21] = (80.0 * 0xFF as f64 / 200.79) as u8; // pedal sensor
    out[22] = (12000.0 * 0xFF as f64 / 41546.17) as u8; // battery
    out[23] = (100.0 * 0xFF as f64 / 251.68) as u8; // speed
    out[24] = 210; // glow indicator state
    // freeze frame 2
    put_u16(&mut out, 25, (234567 >> 3) as u16);
    out
}

/// `22 40 22` power management statistics.
fn power_management_info() -> Vec<u8> {
    let mut out = RESP_12_224022.to_vec();
    // charge counters, 0xFFFF == 19088.16 Ah
    put_u16(&mut out, 7, (1345.6 * 0xFFFF as f64 / 19088.16) as u16);
    put_u16(&mut out, 9, (1456.7 * 0xFFFF as f64 / 19088.16) as u16);
    // hours per charge band
    put_u16(&mut out, 11, 4567);
    put_u16(&mut out, 13, 5678);
    put_u16(&mut out, 15, 6789);
    put_u16(&mut out, 17, 7890);
    put_u16(&mut out, 19, 8901);
    // minutes per temperature band, 0xFFFF == 327675
    put_u16(&mut out, 21, (1485 * 0xFFFF / 327675) as u16);
    put_u16(&mut out, 23, (1357 * 0xFFFF / 327675) as u16);
    put_u16(&mut out, 25, (3579 * 0xFFFF / 327675) as u16);
    put_u16(&mut out, 27, (5791 * 0xFFFF / 327675) as u16);
    put_u16(&mut out, 29, (7913 * 0xFFFF / 327675) as u16);
    // daily odometer history
    put_u16(&mut out, 31, 123);
    put_u16(&mut out, 33, 1234);
    put_u16(&mut out, 35, 12345);
    put_u16(&mut out, 37, 234);
    put_u16(&mut out, 39, 2345);
    put_u16(&mut out, 41, 23456);
    // last battery replacements
    put_u16(&mut out, 43, 18346);
    put_u16(&mut out, 45, 17346);
    put_u16(&mut out, 47, 16346);
    put_u16(&mut out, 49, 15346);
    // discharge while the motor runs
    put_u16(&mut out, 51, (4796.5 * 0xFFFF as f64 / 19088.16) as u16);
    // closed-circuit current violations
    out[54] = 0x01;
    out[53] = 0x23;
    out[56] = 0x48 | 0x11;
    out[55] = 0xC0 | 0x11;
    out[58] = 0x48 | 0x22;
    out[57] = 0xC0 | 0x22;
    out[66] = 0x48 | 0x33;
    out[65] = 0xC0 | 0x33;
    // battery sensor error counters
    put_u16(&mut out, 69, 10045);
    put_u16(&mut out, 71, 10046);
    put_u16(&mut out, 73, 10047);
    put_u16(&mut out, 75, 20031);
    put_u16(&mut out, 77, 20032);
    put_u16(&mut out, 79, 20033);
    out
}

/// `22 40 23` battery health block.
fn battery_health_info() -> Vec<u8> {
    let mut out = RESP_12_224023.to_vec();
    out[6] = 95; // capacity in Ah
    // state of health, sign in bit 7
    let soh = -45.0f64;
    out[7] = (soh.abs() * 0x7F as f64 / 50.0 + if soh < 0.0 { 128.0 } else { 0.0 }) as u8;
    out[8] = (90.0 * 0xFF as f64 / 100.0) as u8; // state of charge fit
    let season_temp = 23.0f64;
    out[9] =
        (season_temp.abs() * 0x7F as f64 / 127.0 + if season_temp < 0.0 { 128.0 } else { 0.0 })
            as u8;
    out[10] = 5; // calibration events
    // charge throughput history, 0xFF == 1188.3 Ah
    for (i, q) in [300.0, 400.0, 500.0, 600.0, 700.0, 800.0].iter().enumerate() {
        out[11 + i] = (q * 0xFF as f64 / 1188.3) as u8;
    }
    // start capability history, percent
    for (i, p) in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0].iter().enumerate() {
        out[17 + i] = (p * 0xFF as f64 / 100.0) as u8;
    }
    // charge state history, percent
    for (i, p) in [20.0, 30.0, 40.0, 50.0, 60.0, 70.0].iter().enumerate() {
        out[23 + i] = (p * 0xFF as f64 / 100.0) as u8;
    }
    // battery sensor self-test error counters
    out[29] = 35;
    out[30] = 8;
    out[31] = 9;
    out[32] = 16;
    out[33] = 1;
    out[34] = 2;
    out
}

// 0xA0: navigation unit

const RESP_A0_1802FFFF: [u8; 5] = [0x82, 0xF1, 0xA0, 0x58, 0x00];

const RESP_A0_BUSY_1A: [u8; 6] = [0x83, 0xF1, 0xA0, 0x7F, 0x1A, 0x78];

const RESP_A0_BUSY_22: [u8; 6] = [0x83, 0xF1, 0xA0, 0x7F, 0x22, 0x78];

const RESP_A0_1A80: [u8; 34] = [
    0x9F, 0xF1, 0xA0, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x19, 0x38, 0x71, 0xC4, 0x0C, 0x09, 0x30,
    0x4B, 0x49, 0x20, 0x07, 0x05, 0x28, 0x10, 0x00, 0x0A, 0x94, 0x08, 0x6A, 0x01, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

const RESP_A0_222000: [u8; 7] = [0x84, 0xF1, 0xA0, 0x62, 0x20, 0x00, 0x00];

const RESP_A0_22F121: [u8; 12] = [
    0x89, 0xF1, 0xA0, 0x62, 0xF1, 0x21, 0x00, 0x01, 0x00, 0x00, 0x07, 0xF3,
];

const RESP_A0_22F120: [u8; 9] = [0x86, 0xF1, 0xA0, 0x62, 0xF1, 0x20, 0x00, 0x03, 0x01];

const RESP_A0_22F122: [u8; 8] = [0x85, 0xF1, 0xA0, 0x62, 0xF1, 0x22, 0x00, 0x00];

const RESP_A0_22F123: [u8; 26] = [
    0x97, 0xF1, 0xA0, 0x62, 0xF1, 0x23, 0x00, 0x23, 0x29, 0xC3, 0x3F, 0x06, 0x12, 0x7E, 0xFE,
    0x00, 0x00, 0x00, 0x66, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01,
];

const RESP_A0_22F124: [u8; 26] = [
    0x97, 0xF1, 0xA0, 0x62, 0xF1, 0x24, 0x00, 0x23, 0x29, 0xFA, 0x97, 0x06, 0x0F, 0xC8, 0x3B,
    0x00, 0x00, 0x00, 0x5C, 0x01, 0x00, 0x00, 0x01, 0x7E, 0xFF, 0x01,
];

const RESP_A0_22F125: [u8; 13] = [
    0x8A, 0xF1, 0xA0, 0x62, 0xF1, 0x25, 0x00, 0x00, 0xD6, 0x00, 0x84, 0x00, 0xFB,
];

const RESP_A0_22F127: [u8; 16] = [
    0x8D, 0xF1, 0xA0, 0x62, 0xF1, 0x27, 0x00, 0xC6, 0xA4, 0x06, 0x17, 0x20, 0x56, 0x46, 0x01,
    0x01,
];

const RESP_A0_22F128: [u8; 130] = [
    0x80, 0xF1, 0xA0, 0x7E, 0x62, 0xF1, 0x28, 0x00, 0x0A, 0x0B, 0x01, 0x11, 0x58, 0xBE, 0x93,
    0x10, 0x5B, 0x01, 0x01, 0x01, 0x03, 0x10, 0xF4, 0x84, 0x44, 0x31, 0x11, 0x01, 0x01, 0x01,
    0x0B, 0x12, 0x34, 0xC7, 0x1C, 0x1D, 0xDD, 0x01, 0x01, 0x01, 0x0E, 0x0E, 0xD8, 0x4F, 0xA4,
    0x11, 0x11, 0x01, 0x01, 0x01, 0x12, 0x0F, 0x8C, 0x23, 0x8E, 0x0C, 0xCC, 0x01, 0x01, 0x01,
    0x13, 0x10, 0xF4, 0xA6, 0x66, 0x3B, 0x05, 0x01, 0x01, 0x01, 0x16, 0x11, 0xBC, 0x30, 0x5B,
    0x25, 0xB0, 0x01, 0x01, 0x01, 0x1B, 0x11, 0x08, 0x67, 0xD2, 0x27, 0x1C, 0x01, 0x01, 0x01,
    0x00, 0x11, 0xF8, 0x91, 0x11, 0x12, 0x7D, 0x01, 0x01, 0x01, 0x10, 0x00, 0x00, 0x85, 0xB0,
    0x04, 0xFA, 0x01, 0x00, 0x01, 0x1C, 0x0F, 0x8C, 0xE7, 0xD2, 0x09, 0xF4, 0x01, 0x01, 0x01,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Fixed test position: 45°32'56.764" north, 42°24'53.876" west.
fn put_position(out: &mut [u8]) {
    let lat_ms: i64 = 45 * 3_600_000 + 32 * 60_000 + 56 * 1000 + 764;
    let lat = (lat_ms * 0x7FFF_FFFF / ANGLE_FULL_SCALE_MS) as i32;
    out[7..11].copy_from_slice(&lat.to_be_bytes());

    let long_ms: i64 = -(42 * 3_600_000 + 24 * 60_000 + 53 * 1000 + 876);
    let long = (long_ms * 0x7FFF_FFFF / ANGLE_FULL_SCALE_MS) as i32;
    out[11..15].copy_from_slice(&long.to_be_bytes());

    let height: i32 = 350;
    out[15..19].copy_from_slice(&height.to_be_bytes());
}

fn nav_unit(t: &[u8], variable_values: bool) -> Option<Replies> {
    let mut replies = Replies::new();
    if error_read(t) {
        replies.push_raw(&RESP_A0_1802FFFF);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        // busy first, then the identification block
        replies.push_raw(&RESP_A0_BUSY_1A);
        replies.push_raw(&RESP_A0_1A80);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x20 && at(t, 5) == 0x00 {
        replies.push_raw(&RESP_A0_222000);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x21 {
        let mut out = RESP_A0_22F121.to_vec();
        out[6] = 0; // gyro ok
        put_u16(&mut out, 8, 312); // tacho pulses
        put_u16(&mut out, 10, (7.854 * 0x4000 as f64 / 20.0) as u16); // yaw rate, 0x4000 == 20 V
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x20 {
        replies.push_raw(&RESP_A0_BUSY_22);
        let mut out = RESP_A0_22F120.to_vec();
        out[6] = 0; // receiver driver ok
        out[7] = 3; // 3D fix
        out[8] = 1; // almanac ok
        replies.push_raw_delayed(&out, 300);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x22 {
        replies.push_raw(&RESP_A0_BUSY_22);
        let mut out = RESP_A0_22F122.to_vec();
        put_u16(&mut out, 6, 0); // antenna self test ok
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x23 {
        let mut out = RESP_A0_22F123.to_vec();
        out[6] = 0; // position valid
        put_position(&mut out);
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x24 {
        let mut out = RESP_A0_22F124.to_vec();
        put_position(&mut out);
        out[19] = 1; // position status ok
        put_u16(&mut out, 20, (100.0 * 0xFFFF as f64 / 2359.212_336_0) as u16);
        out[22] = 1; // speed status ok
        let direction_s: i64 = 57 * 3600 + 48 * 60 + 53;
        put_u16(&mut out, 23, (direction_s * 0x7FF8 / (180 * 3600)) as u16);
        out[25] = 1; // direction status ok
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x25 {
        let mut out = RESP_A0_22F125.to_vec();
        put_u16(&mut out, 7, 1234); // vertical dilution
        put_u16(&mut out, 9, 2345); // horizontal dilution
        put_u16(&mut out, 11, 3456); // position dilution
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x27 {
        let mut out = RESP_A0_22F127.to_vec();
        if variable_values {
            let now = Utc::now();
            let year = now.year() as u32;
            out[7] = int_to_bcd(year / 100);
            out[8] = int_to_bcd(year % 100);
            out[9] = int_to_bcd(now.month());
            out[10] = int_to_bcd(now.day());
            out[11] = int_to_bcd(now.hour());
            out[12] = int_to_bcd(now.minute());
            out[13] = int_to_bcd(now.second());
        }
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0xF1 && at(t, 5) == 0x28 {
        let mut out = RESP_A0_22F128.to_vec();
        out[8] = 20; // trackable satellites
        out[9] = 22; // receivable satellites
        replies.push_raw(&out);
    } else {
        return None;
    }
    Some(replies)
}

// 0x40: car access system

const RESP_40_1A90: [u8; 12] = [
    0x89, 0xF1, 0x40, 0x5A, 0x90, 0x43, 0x5A, 0x34, 0x38, 0x39, 0x36, 0x38,
];

const RESP_40_1802FFFF: [u8; 8] = [0x85, 0xF1, 0x40, 0x58, 0x01, 0xA1, 0x17, 0x21];

fn car_access(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x90 {
        replies.push_raw(&RESP_40_1A90);
    } else if error_read(t) {
        let mut out = RESP_40_1802FFFF.to_vec();
        out[0] = 0x82;
        out[4] = 0x00;
        replies.push_raw(&out);
    } else {
        return None;
    }
    Some(replies)
}

// 0x60

const RESP_60_1A80: [u8; 34] = [
    0x9F, 0xF1, 0x60, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x19, 0x61, 0x08, 0x03, 0x07, 0x06, 0xE0,
    0x53, 0x59, 0x20, 0x07, 0x05, 0x31, 0x10, 0x00, 0x15, 0xB1, 0x89, 0x51, 0x00, 0x03, 0x10,
    0x01, 0x00, 0x00, 0x00,
];

const RESP_60_210B: [u8; 9] = [0x86, 0xF1, 0x60, 0x61, 0x0B, 0x00, 0x02, 0x1F, 0x7E];

const RESP_60_2117: [u8; 6] = [0x83, 0xF1, 0x60, 0x61, 0x17, 0x0C];

fn device_60(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_60_1A80);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0x0B {
        replies.push_raw(&RESP_60_210B);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x21 && at(t, 4) == 0x17 {
        replies.push_raw(&RESP_60_2117);
    } else {
        return None;
    }
    Some(replies)
}

// 0x70

const RESP_70_221000: [u8; 9] = [0x86, 0xF1, 0x70, 0x62, 0x10, 0x00, 0xAD, 0xE8, 0xD2];

const RESP_70_1A80: [u8; 63] = [
    0xBC, 0xF1, 0x70, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x20, 0x30, 0x82, 0x08, 0x35, 0x0D, 0x60,
    0x53, 0x52, 0x20, 0x07, 0x05, 0x29, 0x09, 0x00, 0x10, 0x70, 0x04, 0x3C, 0x00, 0x04, 0x00,
    0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x12, 0x94, 0x78, 0x00, 0x05, 0x21, 0x67, 0x30,
    0x30, 0x39, 0x31, 0x42, 0x35, 0x30, 0x30, 0x30, 0x39, 0x31, 0x42, 0x35, 0x30, 0x46, 0x34,
    0x35, 0x30, 0x41,
];

const RESP_70_1A90: [u8; 12] = [
    0x89, 0xF1, 0x70, 0x5A, 0x90, 0x43, 0x5A, 0x34, 0x38, 0x39, 0x36, 0x38,
];

const RESP_70_23_000712: [u8; 22] = [
    0x93, 0xF1, 0x70, 0x63, 0x12, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x20, 0x07, 0x05,
    0x29, 0x00, 0x00, 0x09, 0x15, 0x32, 0x73,
];

const RESP_70_23_120712: [u8; 22] = [
    0x93, 0xF1, 0x70, 0x63, 0x01, 0x43, 0x5A, 0x34, 0x38, 0x39, 0x36, 0x38, 0x20, 0x13, 0x03,
    0x05, 0x00, 0x00, 0x09, 0x20, 0x30, 0x82,
];

fn device_70(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x83 && at(t, 3) == 0x22 && at(t, 4) == 0x10 && at(t, 5) == 0x00 {
        replies.push_raw(&RESP_70_221000);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_70_1A80);
    } else if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x90 {
        replies.push_raw(&RESP_70_1A90);
    } else if at(t, 0) == 0x86
        && at(t, 3) == 0x23
        && at(t, 4) == 0x00
        && at(t, 5) == 0x00
        && at(t, 6) == 0x00
        && at(t, 7) == 0x07
        && at(t, 8) == 0x12
    {
        replies.push_raw(&RESP_70_23_000712);
    } else if at(t, 0) == 0x86
        && at(t, 3) == 0x23
        && at(t, 4) == 0x00
        && at(t, 5) == 0x00
        && at(t, 6) == 0x12
        && at(t, 7) == 0x07
        && at(t, 8) == 0x12
    {
        replies.push_raw(&RESP_70_23_120712);
    } else {
        return None;
    }
    Some(replies)
}

// 0x73: central display

const RESP_73_1A80: [u8; 34] = [
    0x9F, 0xF1, 0x73, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x15, 0x19, 0x79, 0x17, 0x02, 0x0A, 0x30,
    0x49, 0x41, 0x20, 0x07, 0x05, 0x25, 0x17, 0x00, 0x0B, 0xF5, 0x06, 0x09, 0x00, 0x03, 0x03,
    0x00, 0x00, 0x00, 0x00,
];

const RESP_73_1802FFFF: [u8; 5] = [0x82, 0xF1, 0x73, 0x58, 0x00];

fn central_display(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_73_1A80);
    } else if error_read(t) {
        replies.push_raw(&RESP_73_1802FFFF);
    } else {
        return None;
    }
    Some(replies)
}

// 0x78: climate unit

const RESP_78_1A80: [u8; 34] = [
    0x9F, 0xF1, 0x78, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x24, 0x87, 0x02, 0x15, 0x0D, 0x07, 0x92,
    0x47, 0x4C, 0x20, 0x07, 0x05, 0x25, 0x21, 0x00, 0x15, 0x06, 0x05, 0x3D, 0xFF, 0x03, 0x03,
    0x3C, 0x00, 0x00, 0x00,
];

const RESP_78_1802FFFF: [u8; 5] = [0x82, 0xF1, 0x78, 0x58, 0x00];

const RESP_78_300201: [u8; 34] = [
    0x9F, 0xF1, 0x78, 0x70, 0x02, 0x01, 0xC3, 0x28, 0x50, 0x64, 0x69, 0x65, 0x3F, 0xFF, 0xFF,
    0x0E, 0x10, 0x0E, 0x10, 0x59, 0x53, 0x00, 0xAA, 0xAA, 0xC8, 0x00, 0x00, 0x00, 0xFF, 0xFB,
    0x00, 0x00, 0x00, 0x0F,
];

const RESP_78_300601: [u8; 9] = [0x86, 0xF1, 0x78, 0x70, 0x06, 0x01, 0x00, 0x00, 0x00];

fn climate_unit(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_78_1A80);
    } else if error_read(t) {
        replies.push_raw(&RESP_78_1802FFFF);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x30 && at(t, 4) == 0x02 && at(t, 5) == 0x01 {
        replies.push_raw(&climate_controller_status());
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x30 && at(t, 4) == 0x06 && at(t, 5) == 0x01 {
        replies.push_raw(&RESP_78_300601);
    } else {
        return None;
    }
    Some(replies)
}

/// `30 02 01` controller status with all analog channels filled in.
fn climate_controller_status() -> Vec<u8> {
    let mut out = RESP_78_300201.to_vec();
    out[7] = (15.0 * 0xFF as f64 / 127.5) as u8; // base setpoint
    out[8] = ((35.0 + 40.0) * 0xFF as f64 / 127.5) as u8; // outside temp
    out[10] = ((90.0 - 5.0) * 0xFF as f64 / 127.5) as u8; // heat exchanger, right
    out[11] = ((20.0 - 10.0) * 0xFF as f64 / 42.5) as u8; // inside temp
    out[12] = 45; // blower output
    out[14] = ((90.0 + 27.0) * 0xFF as f64 / 127.0) as u8; // main actuator, right
    put_u16(&mut out, 17, 1234); // water valve opening time, right
    out[19] = ((22.0 - 10.0) * 0xFF as f64 / 42.5) as u8; // delayed inside temp
    out[20] = ((30.0 - 10.0) * 0xFF as f64 / 42.5) as u8; // setpoint, left
    out[23] = ((100.0 - 5.0) * 0xFF as f64 / 127.5) as u8; // heat exchanger setpoint
    out[25] = (50.0 * 0xFF as f64 / 127.0) as u8; // heat exchanger actuator
    put_u16(&mut out, 28, 30); // reference value, left
    out[32] = 150; // speed
    out[33] = (1000.0 * 0xFF as f64 / 12750.0) as u8; // motor rpm
    out
}

// 0x64: park distance control

const RESP_64_1A80: [u8; 35] = [
    0x9F, 0xF1, 0x64, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x18, 0x51, 0x39, 0x01, 0x02, 0x04, 0x21,
    0x4C, 0x57, 0x20, 0x07, 0x05, 0x31, 0x11, 0x00, 0x0C, 0x5F, 0x09, 0x0F, 0x00, 0x03, 0x03,
    0x1E, 0x00, 0x00, 0x00, 0x59,
];

const RESP_64_1802FFFF: [u8; 8] = [0x85, 0xF1, 0x64, 0x58, 0x01, 0xE2, 0x05, 0x24];

const RESP_64_17E205: [u8; 15] = [
    0x8C, 0xF1, 0x64, 0x57, 0x01, 0xE2, 0x05, 0x24, 0x01, 0x44, 0x4A, 0x7B, 0x00, 0x00, 0x00,
];

fn park_distance(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_64_1A80);
    } else if error_read(t) {
        replies.push_raw(&RESP_64_1802FFFF);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x17 && at(t, 4) == 0xE2 && at(t, 5) == 0x05 {
        let mut out = RESP_64_17E205.to_vec();
        out[8] = 5; // occurrence counter
        put_u16(&mut out, 9, (123456 >> 3) as u16); // odometer, 8 km steps
        out[11] = ((30.0 + 40.0) * 0xFF as f64 / 127.5) as u8; // temp, frame 1
        put_u16(&mut out, 12, (234567 >> 3) as u16);
        out[14] = ((80.0 + 40.0) * 0xFF as f64 / 127.5) as u8; // temp, frame 2
        replies.push_raw(&out);
    } else {
        return None;
    }
    Some(replies)
}

// 0x65: switch center

const RESP_65_1A80: [u8; 34] = [
    0x9F, 0xF1, 0x65, 0x5A, 0x80, 0x00, 0x00, 0x09, 0x18, 0x32, 0x33, 0x03, 0x04, 0x07, 0x18,
    0x44, 0x55, 0x20, 0x06, 0x08, 0x15, 0x05, 0x00, 0x15, 0x1A, 0x02, 0x05, 0x01, 0x03, 0x03,
    0x3C, 0x00, 0x00, 0x00,
];

const RESP_65_1802FFFF: [u8; 8] = [0x85, 0xF1, 0x65, 0x58, 0x01, 0x9F, 0xF1, 0x24];

const RESP_65_179FF1: [u8; 12] = [
    0x89, 0xF1, 0x65, 0x57, 0x01, 0x9F, 0xF1, 0x24, 0x00, 0x00, 0x44, 0x0E,
];

const RESP_65_21F907: [u8; 8] = [0x85, 0xF1, 0x65, 0x61, 0xF9, 0x07, 0x00, 0x00];

fn switch_center(t: &[u8]) -> Option<Replies> {
    let mut replies = Replies::new();
    if at(t, 0) == 0x82 && at(t, 3) == 0x1A && at(t, 4) == 0x80 {
        replies.push_raw(&RESP_65_1A80);
    } else if error_read(t) {
        replies.push_raw(&RESP_65_1802FFFF);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x17 && at(t, 4) == 0x9F && at(t, 5) == 0xF1 {
        let mut out = RESP_65_179FF1.to_vec();
        out[7] = 0xA4; // implausible signal, stored, warning lamp
        put_u16(&mut out, 8, (123456 >> 3) as u16);
        put_u16(&mut out, 10, (234567 >> 3) as u16);
        replies.push_raw(&out);
    } else if at(t, 0) == 0x83 && at(t, 3) == 0x21 && at(t, 4) == 0xF9 && at(t, 5) == 0x07 {
        let mut out = RESP_65_21F907.to_vec();
        out[6] = 0x04; // PDC key pressed
        out[7] = 0x00;
        replies.push_raw(&out);
    } else {
        return None;
    }
    Some(replies)
}

/// `18 02 FF FF` error memory read against this profile.
fn error_read(t: &[u8]) -> bool {
    at(t, 0) == 0x84 && at(t, 3) == 0x18 && at(t, 4) == 0x02 && at(t, 5) == 0xFF && at(t, 6) == 0xFF
}

fn put_u16(buf: &mut [u8], index: usize, value: u16) {
    buf[index] = (value >> 8) as u8;
    buf[index + 1] = value as u8;
}
