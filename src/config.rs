//! Protocol configuration.
//!
//! Window size, sequence-space size, and the retransmission timeout are
//! fixed at endpoint construction time, not negotiated at runtime. The one
//! behavioral knob is [`CorruptReply`], which selects what the receiver does
//! when a data packet fails its integrity check.

use std::time::Duration;

use thiserror::Error;

use crate::seq::SeqSpace;

/// Receiver behavior on a corrupted data arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptReply {
    /// Drop the packet without acknowledging anything.
    #[default]
    Silent,
    /// Reply with an acknowledgment for the last in-order sequence number,
    /// so the sender still gets feedback on every arrival.
    AckLastInOrder,
}

/// Fixed per-session protocol parameters.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum number of outstanding (sent but unacknowledged) packets, W.
    pub window_size: u16,
    /// Number of distinct sequence numbers. Must be at least `2 * W` so the
    /// receiver can always tell a new packet from a retransmission of one it
    /// already delivered.
    pub seq_space: u16,
    /// Retransmission timeout.
    pub timeout: Duration,
    /// Receiver policy for corrupted data arrivals.
    pub corrupt_reply: CorruptReply,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 12,
            timeout: Duration::from_secs(16),
            corrupt_reply: CorruptReply::Silent,
        }
    }
}

impl ProtocolConfig {
    /// Check the window/sequence-space sizing rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 1 {
            return Err(ConfigError::WindowTooSmall);
        }
        if self.seq_space < self.window_size.saturating_mul(2) {
            return Err(ConfigError::SeqSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        Ok(())
    }

    /// The sequence space the endpoints operate in.
    pub fn space(&self) -> SeqSpace {
        SeqSpace::new(self.seq_space)
    }
}

/// Rejected protocol parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    WindowTooSmall,
    #[error(
        "sequence space {seq_space} is too small for window {window_size}: \
         per-packet acknowledgments need at least twice the window"
    )]
    SeqSpaceTooSmall { window_size: u16, seq_space: u16 },
}
