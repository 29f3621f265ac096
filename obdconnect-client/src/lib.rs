//! Client for ELM327 OBD2 adapters reachable over TCP
//!
//! A [`Session`] connects through a [`Transport`], runs the adapter
//! handshake, and then answers PID queries with decoded values. Every
//! command goes through the retry loop in [`retry`], which re-sends until
//! the adapter gives a usable reply or the [`RetryPolicy`] runs out.

pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use config::{ClientConfig, LogLevel};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use session::{Session, SessionState};
pub use transport::Transport;
