//! Send a command until the adapter gives a usable answer
//!
//! Right after a reset or protocol change the adapter may answer with only
//! `SEARCHING...`, a bare prompt, or nothing within the read window. Those
//! replies clean to nothing and the command is sent again after a pause,
//! up to the bound set by the [`RetryPolicy`].

use crate::error::{Error, Result};
use crate::transport::Transport;
use log::{debug, warn};
use obdconnect_elm327_lib::{clean, Command};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Pacing and bound for repeated sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Attempts before giving up; `None` means no limit
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
    /// Time ceiling across all attempts
    #[serde(default)]
    pub max_elapsed_ms: Option<u64>,
}

const fn default_retry_delay_ms() -> u64 {
    500
}

#[allow(clippy::unnecessary_wraps)] // serde default must match the field type
const fn default_max_attempts() -> Option<u32> {
    Some(10)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            max_attempts: default_max_attempts(),
            max_elapsed_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Retry forever. Only suitable when the caller can close the connection
    /// to abort a hung adapter.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..self
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Whether another attempt is out of bounds after `attempts` have been made
    pub fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = self
            .max_elapsed_ms
            .is_some_and(|max| elapsed >= Duration::from_millis(max));
        out_of_attempts || out_of_time
    }
}

/// Send `command` until a reply survives cleaning.
///
/// I/O errors end the loop at once; running out of attempts or time yields
/// [`Error::Timeout`].
pub fn send_until_valid(
    transport: &mut Transport,
    command: &Command,
    policy: &RetryPolicy,
) -> Result<String> {
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        if let Some(response) = send_once(transport, command)? {
            debug!("{command} -> {response:?} (attempt {attempts})");
            return Ok(response);
        }

        if policy.exhausted(attempts, start.elapsed()) {
            warn!("Giving up on {command} after {attempts} attempts");
            return Err(Error::Timeout {
                command: command.to_string(),
                attempts,
            });
        }

        std::thread::sleep(policy.retry_delay());
    }
}

/// One attempt: drop stale input, send, read once and clean.
///
/// `None` means the adapter gave nothing usable this time.
pub fn send_once(transport: &mut Transport, command: &Command) -> Result<Option<String>> {
    transport.discard_pending()?;
    transport.send(command)?;
    let frame = transport.receive()?;

    let response = clean(&frame);
    if response.is_none() {
        debug!(
            "No usable reply to {command} yet: {:?}",
            String::from_utf8_lossy(&frame)
        );
    }
    Ok(response)
}
