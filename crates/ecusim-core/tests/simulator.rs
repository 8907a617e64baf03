//! Simulator behavior through the public API: profiles, error memory
//! lifecycle and response tables loaded from disk.

use std::io::Write;
use std::sync::Arc;

use ecusim_core::codec::{encode_bmw_fast, Frame, TESTER_ADDR};
use ecusim_core::config::{ConfigData, Profile};
use ecusim_core::sim::{EcuSimulator, Toggles};

fn simulator(profile: Profile, config: ConfigData) -> EcuSimulator {
    EcuSimulator::new(profile, config, Arc::new(Toggles::default()))
}

fn request(device: u8, payload: &[u8]) -> Vec<u8> {
    encode_bmw_fast(&Frame::new(device, TESTER_ADDR, payload.to_vec())).unwrap()
}

#[test]
fn test_error_scan_across_devices() {
    let mut sim = simulator(Profile::E61, ConfigData::default());
    // profile devices answer with their stored errors, everything else
    // reports an empty memory so a bus-wide scan completes
    let populated = sim.process(&request(0x12, &[0x18, 0x02, 0xFF, 0xFF]));
    assert_eq!(populated[0].frame.payload[..2], [0x58, 0x02]);

    let empty = sim.process(&request(0x77, &[0x18, 0x02, 0xFF, 0xFF]));
    assert_eq!(empty[0].frame.payload, vec![0x58, 0x00]);
}

#[test]
fn test_error_clear_and_restore_cycle() {
    let mut sim = simulator(Profile::E61, ConfigData::default());
    sim.process(&request(0x12, &[0x14, 0xFF, 0xFF]));
    let cleared = sim.process(&request(0x12, &[0x18, 0x02, 0xFF, 0xFF]));
    assert_eq!(cleared[0].frame.payload, vec![0x58, 0x00]);

    sim.toggles().restore_errors();
    sim.tick();
    let restored = sim.process(&request(0x12, &[0x18, 0x02, 0xFF, 0xFF]));
    assert_eq!(restored[0].frame.payload[..2], [0x58, 0x02]);
}

#[test]
fn test_e90_telemetry_tracks_battery() {
    let mut sim = simulator(Profile::E90, ConfigData::default());
    // one tick settles the battery at its fixed 12.50 V level
    sim.tick();
    // battery voltage raw and charge-corrected, items 0x0042 and 0x012C
    let replies = sim.process(&request(0x12, &[0x2C, 0x10, 0x00, 0x42, 0x01, 0x2C]));
    let payload = &replies[0].frame.payload;
    assert_eq!(payload[..2], [0x6C, 0x10]);
    assert_eq!(&payload[2..4], &12500u16.to_be_bytes());
    let corrected = (1250.0 * 10.0 / 0.389_105) as u16;
    assert_eq!(&payload[4..6], &corrected.to_be_bytes());
}

#[test]
fn test_axis_mode_write_changes_reads() {
    let mut sim = simulator(Profile::E61, ConfigData::default());
    // transport mode request on the axis unit
    let replies = sim.process(&request(0x38, &[0x31, 0x0C, 0x02]));
    assert_eq!(replies[0].frame.payload, vec![0x71, 0x0C, 0x02]);
    assert_eq!(sim.state().mode, 0x04);

    // the request right after a mode change is swallowed
    assert!(sim.process(&request(0x38, &[0x3E])).is_empty());
}

#[test]
fn test_table_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "entries": [{{
                "request": "82 55 F1 21 07 00",
                "responses": ["84 F1 55 61 07 AB CD 00"]
            }}]
        }}"#
    )
    .unwrap();

    let config = ConfigData::from_file(file.path()).unwrap();
    let mut sim = simulator(Profile::None, config);
    let replies = sim.process(&request(0x55, &[0x21, 0x07]));
    assert_eq!(replies[0].frame.payload, vec![0x61, 0x07, 0xAB, 0xCD]);
}

#[test]
fn test_variable_values_drift_battery() {
    let sim_toggles = Arc::new(Toggles::default());
    sim_toggles.set_variable_values(true);
    let mut sim = EcuSimulator::new(Profile::E90, ConfigData::default(), sim_toggles);
    let before = sim.state().battery_voltage;
    for _ in 0..200 {
        sim.tick();
    }
    assert_ne!(sim.state().battery_voltage, before);
}
