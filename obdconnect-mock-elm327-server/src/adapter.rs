//! Simulated vehicle and the adapter's answer to each command

use obdconnect_elm327_lib::{normalize_command, NO_DATA};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MIN_RPM: u32 = 2000;
pub const MAX_RPM: u32 = 4000;
/// Largest RPM change between two RPM queries, in either direction
pub const RPM_STEP: i32 = 150;
pub const MIN_COOLANT: u8 = 85;
pub const MAX_COOLANT: u8 = 95;

/// Identification printed in reply to `ATZ`
pub const DEVICE_ID: &str = "ELM327 v2.1";

/// Simulated engine: RPM wanders within bounds, speed follows RPM
/// (a fixed gear ratio), coolant jitters around operating temperature.
#[derive(Debug)]
pub struct VehicleState<R = StdRng> {
    rpm: u32,
    coolant: u8,
    rng: R,
}

impl VehicleState<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for VehicleState<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> VehicleState<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rpm: MIN_RPM,
            coolant: 90,
            rng,
        }
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    /// Speed in km/h, derived from the current RPM
    pub fn speed(&self) -> u32 {
        self.rpm / 60
    }

    pub fn coolant(&self) -> u8 {
        self.coolant
    }

    /// Random walk step, clamped to `MIN_RPM..=MAX_RPM`
    fn step_rpm(&mut self) -> u32 {
        let step = self.rng.gen_range(-RPM_STEP..=RPM_STEP);
        let rpm = self.rpm.saturating_add_signed(step);
        self.rpm = rpm.clamp(MIN_RPM, MAX_RPM);
        self.rpm
    }

    fn resample_coolant(&mut self) -> u8 {
        self.coolant = self.rng.gen_range(MIN_COOLANT..=MAX_COOLANT);
        self.coolant
    }
}

/// Per-connection adapter state
///
/// All vehicle mutation goes through [`AdapterState::handle_command`].
#[derive(Debug)]
pub struct AdapterState<R = StdRng> {
    vehicle: VehicleState<R>,
    /// Mode 01 queries answered with `SEARCHING...` after a reset
    searching_replies: u32,
    searching_remaining: u32,
}

impl AdapterState<StdRng> {
    pub fn new(searching_replies: u32) -> Self {
        Self::with_vehicle(VehicleState::new(), searching_replies)
    }
}

impl<R: Rng> AdapterState<R> {
    pub fn with_vehicle(vehicle: VehicleState<R>, searching_replies: u32) -> Self {
        Self {
            vehicle,
            searching_replies,
            searching_remaining: searching_replies,
        }
    }

    pub fn vehicle(&self) -> &VehicleState<R> {
        &self.vehicle
    }

    /// Answer one received command. Returns `None` for an empty command,
    /// which a real adapter ignores. The answer is unframed.
    pub fn handle_command(&mut self, raw: &str) -> Option<String> {
        let cmd = normalize_command(raw);
        if cmd.is_empty() {
            return None;
        }

        if cmd == "ATZ" {
            // A reset makes the adapter search for the bus protocol again
            self.searching_remaining = self.searching_replies;
            return Some(DEVICE_ID.to_string());
        }
        if cmd.starts_with("AT") {
            return Some("OK".to_string());
        }

        if cmd.starts_with("01") && self.searching_remaining > 0 {
            self.searching_remaining -= 1;
            return Some("SEARCHING...".to_string());
        }

        let answer = match cmd.as_str() {
            "010C" => {
                // Formula: (A*256 + B) / 4 = RPM, so the raw value is RPM * 4
                let raw = u16::try_from(self.vehicle.step_rpm() * 4).unwrap_or(u16::MAX);
                let [a, b] = raw.to_be_bytes();
                format!("41 0C {a:02X} {b:02X}")
            }
            "010D" => format!("41 0D {:02X}", self.vehicle.speed()),
            "0105" => {
                let temp = self.vehicle.resample_coolant();
                format!("41 05 {:02X}", u32::from(temp) + 40)
            }
            _ => NO_DATA.to_string(),
        };
        Some(answer)
    }
}
