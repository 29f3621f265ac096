//! ELM327 protocol implementation for OBD2 communication
//!
//! This library provides the pieces shared by ELM327 clients and simulated
//! adapters: command framing, cleaning of raw adapter output, and decoding of
//! mode 01 PID replies into physical values.

use smallvec::SmallVec;
use std::fmt;

pub mod pid;
pub mod response;

pub use pid::{decode, DecodeError, DecodedValue, PidRequest, PidSpec, SUPPORTED_PIDS};
pub use response::clean;

/// Type alias for small OBD2 command/response buffers
pub type Obd2Buffer = SmallVec<[u8; 12]>;

/// Terminates every command sent to the adapter
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Printed by the adapter once it is ready for the next command
pub const PROMPT: u8 = b'>';

/// Prefix of the transient line printed while the adapter scans for a bus protocol
pub const SEARCHING: &str = "SEARCHING";

/// Printed when no ECU answered a query
pub const NO_DATA: &str = "NO DATA";

/// Adapter initialization sequence, sent in order
pub const INIT_COMMANDS: [&str; 6] = [
    "ATZ",   // Reset
    "ATE0",  // Echo off
    "ATL0",  // Linefeeds off
    "ATS0",  // Spaces off
    "ATH0",  // Headers off
    "ATSP0", // Protocol auto
];

/// Mode 04: clear diagnostic trouble codes
pub const CLEAR_TROUBLE_CODES: &str = "04";

/// A command as sent to the adapter, without its terminator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire form of the command: the code followed by a single carriage return
    pub fn framed(&self) -> Obd2Buffer {
        let mut framed: Obd2Buffer = self.0.as_bytes().into();
        framed.push(COMMAND_TERMINATOR);
        framed
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a received command the way an adapter reads it:
/// surrounding whitespace and inner spaces removed, upper-cased.
pub fn normalize_command(raw: &str) -> String {
    raw.trim().replace(' ', "").to_uppercase()
}

/// Frame an adapter reply: the answer text, a carriage return, then the prompt
pub fn frame_reply(answer: &str) -> Vec<u8> {
    let mut reply = Vec::with_capacity(answer.len() + 2);
    reply.extend_from_slice(answer.as_bytes());
    reply.push(COMMAND_TERMINATOR);
    reply.push(PROMPT);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framed_command() {
        let cmd = Command::new("010C");
        assert_eq!(cmd.framed().as_slice(), b"010C\r");
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command(" 01 0c \r"), "010C");
        assert_eq!(normalize_command("at sp 0"), "ATSP0");
        assert_eq!(normalize_command("\r\n"), "");
    }

    #[test]
    fn test_frame_reply() {
        assert_eq!(frame_reply("OK"), b"OK\r>");
        assert_eq!(frame_reply("41 0C 1A F8"), b"41 0C 1A F8\r>");
    }

    #[test]
    fn test_init_sequence_order() {
        assert_eq!(INIT_COMMANDS, ["ATZ", "ATE0", "ATL0", "ATS0", "ATH0", "ATSP0"]);
    }
}
