//! Mode 01 PID definitions and reply decoding
//!
//! A reply to a mode `01` request echoes the mode plus `0x40` and the PID,
//! followed by one or two data bytes: `010C` is answered by `41 0C A B`.
//! Decoding is all-or-nothing; anything that does not match the request
//! exactly is rejected rather than partially parsed.

use crate::{Command, NO_DATA, PROMPT, SEARCHING};
use derive_more::{Display, Error};
use std::fmt;

/// Offset added to the request mode in a positive reply
const RESPONSE_MODE_OFFSET: u8 = 0x40;

/// Definition of a decodable PID
#[derive(Debug)]
pub struct PidSpec {
    /// OBD2 service, `0x01` for current data
    pub mode: u8,
    pub pid: u8,
    pub name: &'static str,
    pub unit: &'static str,
    /// Number of data bytes following the header (`A`, or `A` and `B`)
    pub data_bytes: usize,
    /// Physical value from exactly `data_bytes` bytes
    pub formula: fn(&[u8]) -> f64,
}

impl PidSpec {
    /// Request code, e.g. `010C`
    pub fn code(&self) -> String {
        format!("{:02X}{:02X}", self.mode, self.pid)
    }
}

/// Engine RPM: ((A * 256) + B) / 4
pub static ENGINE_RPM: PidSpec = PidSpec {
    mode: 0x01,
    pid: 0x0C,
    name: "RPM",
    unit: "rpm",
    data_bytes: 2,
    formula: rpm_formula,
};

/// Vehicle speed: A
pub static VEHICLE_SPEED: PidSpec = PidSpec {
    mode: 0x01,
    pid: 0x0D,
    name: "SPEED",
    unit: "km/h",
    data_bytes: 1,
    formula: speed_formula,
};

/// Engine coolant temperature: A - 40
pub static COOLANT_TEMP: PidSpec = PidSpec {
    mode: 0x01,
    pid: 0x05,
    name: "COOLANT",
    unit: "°C",
    data_bytes: 1,
    formula: coolant_formula,
};

fn rpm_formula(data: &[u8]) -> f64 {
    f64::from(u16::from_be_bytes([data[0], data[1]])) / 4.0
}

fn speed_formula(data: &[u8]) -> f64 {
    f64::from(data[0])
}

fn coolant_formula(data: &[u8]) -> f64 {
    f64::from(data[0]) - 40.0
}

/// PIDs known to [`PidRequest::from_code`]
pub static SUPPORTED_PIDS: [&PidSpec; 3] = [&ENGINE_RPM, &VEHICLE_SPEED, &COOLANT_TEMP];

/// A PID to query, and what a valid answer must look like
#[derive(Debug, Clone, Copy)]
pub struct PidRequest {
    spec: &'static PidSpec,
}

impl PidRequest {
    pub const fn new(spec: &'static PidSpec) -> Self {
        Self { spec }
    }

    /// Look up a supported PID by its request code (case-insensitive, spaces ignored)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = crate::normalize_command(code);
        if code.len() != 4 || !code.is_ascii() {
            return None;
        }
        let mode = u8::from_str_radix(&code[..2], 16).ok()?;
        let pid = u8::from_str_radix(&code[2..], 16).ok()?;

        SUPPORTED_PIDS
            .iter()
            .copied()
            .find(|spec| spec.mode == mode && spec.pid == pid)
            .map(Self::new)
    }

    pub fn spec(&self) -> &'static PidSpec {
        self.spec
    }

    pub fn command(&self) -> Command {
        Command::new(self.spec.code())
    }

    /// Header a matching reply starts with, e.g. `410C` for `010C`
    pub fn response_header(&self) -> String {
        format!(
            "{:02X}{:02X}",
            self.spec.mode.wrapping_add(RESPONSE_MODE_OFFSET),
            self.spec.pid
        )
    }
}

/// A decoded physical value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedValue {
    pub pid: u8,
    pub name: &'static str,
    pub unit: &'static str,
    pub value: f64,
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.name, self.value, self.unit)
    }
}

/// Why a response did not decode
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DecodeError {
    #[display("adapter is still searching for a protocol")]
    Searching,
    #[display("adapter reported NO DATA")]
    NoData,
    #[display("expected header {expected}, got {response:?}")]
    HeaderMismatch { expected: String, response: String },
    #[display("unexpected length {len} in {response:?}")]
    Length { len: usize, response: String },
    #[display("invalid hex in {response:?}")]
    InvalidHex { response: String },
}

/// Decode a cleaned response to `request`.
///
/// Accepts `41 0C 1A F8`, `410C1AF8` and lowercase forms. The normalized
/// reply must be exactly 6 or 8 hex digits and carry exactly the number of
/// data bytes the PID defines.
pub fn decode(response: &str, request: PidRequest) -> Result<DecodedValue, DecodeError> {
    let prompt = char::from(PROMPT);
    let normalized: String = response
        .chars()
        .filter(|c| !c.is_whitespace() && *c != prompt)
        .collect::<String>()
        .to_uppercase();

    if normalized.contains(SEARCHING) {
        return Err(DecodeError::Searching);
    }
    let no_data: String = NO_DATA.split_whitespace().collect();
    if normalized.contains(&no_data) {
        return Err(DecodeError::NoData);
    }

    let expected = request.response_header();
    let Some(payload) = normalized.strip_prefix(expected.as_str()) else {
        return Err(DecodeError::HeaderMismatch {
            expected,
            response: normalized,
        });
    };

    if !matches!(normalized.len(), 6 | 8) {
        return Err(DecodeError::Length {
            len: normalized.len(),
            response: normalized,
        });
    }

    let data = match hex::decode(payload) {
        Ok(data) => data,
        Err(_) => return Err(DecodeError::InvalidHex { response: normalized }),
    };

    let spec = request.spec();
    if data.len() != spec.data_bytes {
        return Err(DecodeError::Length {
            len: normalized.len(),
            response: normalized,
        });
    }

    Ok(DecodedValue {
        pid: spec.pid,
        name: spec.name,
        unit: spec.unit,
        value: (spec.formula)(&data),
    })
}
