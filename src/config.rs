//! Startup configuration for both session roles.
//!
//! Everything here arrives from the CLI (or a test harness) before a session
//! starts; nothing is negotiated on the wire.  The asymmetry between the
//! fail-fast handshake (bounded retries) and the persistent in-window
//! retransmission loop (bounded only by `max_retransmits`) is deliberate.

use std::time::Duration;

use crate::packet::MAX_DATA;
use crate::window::MAX_WINDOW;

/// Tunable parameters shared by sender and receiver sessions.
#[derive(Debug, Clone)]
pub struct Config {
    /// Max in-flight (sender) or bufferable-out-of-order (receiver) packets.
    /// Must be in `1..=128` so mod-256 window arithmetic stays unambiguous.
    pub window_size: u8,
    /// File bytes per DATA packet; at most [`MAX_DATA`].
    pub chunk_size: usize,
    /// Interval between retransmissions of an unacknowledged packet.
    pub retransmit_interval: Duration,
    /// Transmissions per packet before the sender gives the session up.
    pub max_retransmits: u32,
    /// Bound on each synchronous handshake step (META / metadata-ACK wait).
    pub handshake_timeout: Duration,
    /// Receiver-side silence budget; no packet for this long is fatal.
    pub receive_timeout: Duration,
    /// How many times the receiver re-sends its initial GET before giving up.
    pub request_retries: u32,
    /// Simulated inbound loss probability in `[0.0, 1.0]`; 0 disables the hook.
    pub loss_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: 5,
            chunk_size: 1000,
            retransmit_interval: Duration::from_millis(200),
            max_retransmits: 50,
            handshake_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(10),
            request_retries: 3,
            loss_rate: 0.0,
        }
    }
}

impl Config {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW {
            return Err(ConfigError::WindowOutOfRange(self.window_size));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_DATA {
            return Err(ConfigError::ChunkOutOfRange(self.chunk_size));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::LossRateOutOfRange(self.loss_rate));
        }
        Ok(())
    }
}

/// A configuration field outside its documented range.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Window size must be in `1..=128`.
    WindowOutOfRange(u8),
    /// Chunk size must be in `1..=MAX_DATA`.
    ChunkOutOfRange(usize),
    /// Loss rate must be a probability.
    LossRateOutOfRange(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::WindowOutOfRange(w) => {
                write!(f, "window size {w} not in 1..={MAX_WINDOW}")
            }
            ConfigError::ChunkOutOfRange(c) => write!(f, "chunk size {c} not in 1..={MAX_DATA}"),
            ConfigError::LossRateOutOfRange(r) => write!(f, "loss rate {r} not in 0.0..=1.0"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn oversized_window_rejected() {
        let cfg = Config {
            window_size: 129,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::WindowOutOfRange(129)));
    }

    #[test]
    fn chunk_capped_at_max_payload() {
        let cfg = Config {
            chunk_size: MAX_DATA + 1,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            chunk_size: MAX_DATA,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn loss_rate_must_be_probability() {
        let cfg = Config {
            loss_rate: 1.5,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
