//! Mutable vehicle state behind the simulated devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Axis position low-pass filter constant.
const FILTER_CONST: f64 = 0.95;

/// Valve and idle-speed actuations expire after this many milliseconds.
const ACTUATION_TIMEOUT_MS: u128 = 500;

/// Live switches shared between the session thread and its owner.
///
/// All flags are plain atomics; the session thread samples them once per
/// loop iteration.
#[derive(Debug)]
pub struct Toggles {
    ignition_on: AtomicBool,
    moving: AtomicBool,
    variable_values: AtomicBool,
    error_default: AtomicBool,
}

impl Default for Toggles {
    fn default() -> Self {
        Toggles {
            ignition_on: AtomicBool::new(true),
            moving: AtomicBool::new(false),
            variable_values: AtomicBool::new(false),
            error_default: AtomicBool::new(false),
        }
    }
}

impl Toggles {
    /// Ignition state reported on the control channel and the status line.
    pub fn ignition_on(&self) -> bool {
        self.ignition_on.load(Ordering::Relaxed)
    }

    /// Switches the simulated ignition.
    pub fn set_ignition_on(&self, on: bool) {
        self.ignition_on.store(on, Ordering::Relaxed);
    }

    /// True while the vehicle speed ramps up.
    pub fn moving(&self) -> bool {
        self.moving.load(Ordering::Relaxed)
    }

    /// Starts or stops the simulated drive.
    pub fn set_moving(&self, moving: bool) {
        self.moving.store(moving, Ordering::Relaxed);
    }

    /// True when measurement values drift instead of staying fixed.
    pub fn variable_values(&self) -> bool {
        self.variable_values.load(Ordering::Relaxed)
    }

    /// Enables or disables drifting measurement values.
    pub fn set_variable_values(&self, variable: bool) {
        self.variable_values.store(variable, Ordering::Relaxed);
    }

    /// Requests that cleared error memories report errors again.
    pub fn restore_errors(&self) {
        self.error_default.store(true, Ordering::Relaxed);
    }

    /// One-shot consume of the error restore request.
    pub(crate) fn take_error_restore(&self) -> bool {
        self.error_default.swap(false, Ordering::Relaxed)
    }
}

/// Per-connection vehicle state.
///
/// Holds everything the device handlers read and write: axis position,
/// operating mode, valve outputs, drifting measurement values and the
/// actuation timers that let written values decay back to normal.
#[derive(Debug)]
pub struct EcuState {
    /// Operating mode of the axis unit (0x02 conveyor, 0x04 transport,
    /// 0x40 garage).
    pub mode: u8,
    /// Valve output bits: 0 left, 1 right, 2 down, 3 compressor.
    pub outputs: u8,
    /// Unfiltered axis position.
    pub axis_pos_raw: i32,
    /// Low-pass filtered axis position.
    pub axis_pos_filt: f64,
    /// Battery voltage in hundredths of a volt.
    pub battery_voltage: i32,
    /// Vehicle speed in km/h.
    pub speed: i32,
    /// Compressor running time counter.
    pub compressor_running_time: i32,
    /// Last value written to the idle speed controller.
    pub idle_speed_control: u8,
    /// Suppresses this many responses after their request echo.
    pub no_response_count: u32,
    /// Devices whose error memory has been cleared.
    pub error_reset_list: Vec<u8>,
    /// Last non-empty motor telemetry request, replayed on empty polls.
    pub motor_backup: Vec<u8>,
    axis_pos_prescaler: u32,
    valve_write: [Option<Instant>; 4],
    idle_speed_write: Option<Instant>,
}

impl Default for EcuState {
    fn default() -> Self {
        EcuState {
            mode: 0x00,
            outputs: 0x00,
            axis_pos_raw: 0,
            axis_pos_filt: 0.0,
            battery_voltage: 1445,
            speed: 0,
            compressor_running_time: 0,
            idle_speed_control: 0x00,
            no_response_count: 0,
            error_reset_list: Vec::new(),
            motor_backup: Vec::new(),
            axis_pos_prescaler: 0,
            valve_write: [None; 4],
            idle_speed_write: None,
        }
    }
}

impl EcuState {
    /// Fresh state for a new session.
    pub fn new() -> Self {
        EcuState::default()
    }

    /// Re-arms the actuation timer of a valve channel.
    pub fn start_valve_timer(&mut self, channel: usize) {
        if channel < self.valve_write.len() {
            self.valve_write[channel] = Some(Instant::now());
        }
    }

    /// Re-arms the idle speed actuation timer.
    pub fn start_idle_speed_timer(&mut self) {
        self.idle_speed_write = Some(Instant::now());
    }

    /// True while an idle speed write is still in effect.
    pub fn idle_speed_active(&self) -> bool {
        self.idle_speed_write.is_some()
    }

    /// Clears the per-connection state a tester expects to find reset:
    /// outputs, response suppression, error resets and running timers.
    pub fn reset_connection(&mut self) {
        self.outputs = 0x00;
        self.no_response_count = 0;
        self.error_reset_list.clear();
        self.valve_write = [None; 4];
    }

    /// Advances the simulated vehicle by one loop iteration.
    pub fn tick(&mut self, variable_values: bool, moving: bool) {
        let mut manual_mode = false;
        for channel in 0..self.valve_write.len() {
            if let Some(started) = self.valve_write[channel] {
                manual_mode = true;
                if started.elapsed().as_millis() > ACTUATION_TIMEOUT_MS {
                    self.outputs &= !(1 << channel);
                    self.valve_write[channel] = None;
                }
            }
        }
        if let Some(started) = self.idle_speed_write {
            if started.elapsed().as_millis() > ACTUATION_TIMEOUT_MS {
                self.idle_speed_write = None;
            }
        }

        self.axis_pos_prescaler += 1;
        if self.axis_pos_prescaler > 5 {
            self.axis_pos_prescaler = 0;
            if !manual_mode && self.mode == 0x00 {
                // drift back to the neutral position
                if self.axis_pos_raw > 0 {
                    self.axis_pos_raw -= 1;
                }
                if self.axis_pos_raw < 0 {
                    self.axis_pos_raw += 1;
                }
            }
            if self.outputs == 0x07 && self.axis_pos_raw > -80 {
                self.axis_pos_raw -= 1;
            }
            if self.outputs == 0x0B && self.axis_pos_raw < 80 {
                self.axis_pos_raw += 1;
            }
            self.axis_pos_filt =
                self.axis_pos_filt * FILTER_CONST + self.axis_pos_raw as f64 * (1.0 - FILTER_CONST);
        }

        if variable_values {
            if self.battery_voltage > 1200 {
                self.battery_voltage -= 1;
            } else {
                self.battery_voltage = 1500;
            }
        } else {
            self.battery_voltage = 1250;
        }

        if moving && self.speed < 250 {
            self.speed += 1;
        } else {
            self.speed = 0;
        }

        if self.compressor_running_time < 4000 {
            self.compressor_running_time += 1;
        } else {
            self.compressor_running_time = 0;
        }
    }
}
