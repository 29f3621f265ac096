use crate::session::SessionState;
use obdconnect_elm327_lib::DecodeError;
use std::io;

/// Errors from an adapter session
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    /// The TCP connection could not be established
    #[display("failed to connect to {addr}: {source}")]
    Connection { addr: String, source: io::Error },

    /// Send or receive failed mid-session; the session is closed
    #[display("adapter I/O error: {_0}")]
    #[from]
    Io(io::Error),

    /// No cleaned response within the retry bound
    #[display("no valid response to {command} after {attempts} attempts")]
    Timeout { command: String, attempts: u32 },

    /// Responses kept arriving but none answered the PID
    #[display("no decodable answer to {command} after {attempts} attempts, last was {response:?}: {source}")]
    DecodeFailure {
        command: String,
        attempts: u32,
        response: String,
        source: DecodeError,
    },

    /// An initialization command was not acknowledged
    #[display("adapter initialization failed at {command}: {source}")]
    Handshake { command: String, source: Box<Error> },

    /// Operation not allowed in the current session state
    #[display("session is {state}, expected ready")]
    NotReady { state: SessionState },
}

impl Error {
    /// Whether the session survives this error and the call may simply be repeated
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::DecodeFailure { .. } => true,
            Self::Handshake { source, .. } => source.is_recoverable(),
            Self::Connection { .. } | Self::Io(_) | Self::NotReady { .. } => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
