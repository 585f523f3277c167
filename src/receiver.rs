//! Receive-side window state machine.
//!
//! [`ReceiveWindow`] buffers out-of-order arrivals and releases contiguous
//! runs to the application.
//!
//! # Protocol contract
//!
//! - Packets inside the acceptance window `[expected, expected + W)` are
//!   buffered (idempotently) and individually acknowledged.
//! - Packets in `[expected - W, expected)` were already delivered; they are
//!   acknowledged again but never re-delivered, so a lost acknowledgment
//!   cannot stall the sender.
//! - Delivery happens only for the contiguous run starting at
//!   `expected_seq`, which keeps the application's view strictly in order
//!   and duplicate-free.
//!
//! This module only manages state; sending acknowledgments and handing
//! payloads to the application is the caller's responsibility (see
//! [`crate::endpoint`]).

use crate::config::CorruptReply;
use crate::packet::Message;
use crate::seq::SeqSpace;

/// What processing one data arrival did to the window.
#[derive(Debug, PartialEq, Eq)]
pub struct RecvOutcome {
    /// `true` when the payload was newly buffered (not a duplicate).
    pub accepted: bool,
    /// Sequence number to acknowledge, or `None` to stay silent.
    pub ack: Option<u16>,
    /// Contiguous run of payloads released for the application, in order.
    pub delivered: Vec<Message>,
}

// ---------------------------------------------------------------------------
// ReceiveWindow
// ---------------------------------------------------------------------------

/// Receive-side state for one endpoint.
#[derive(Debug)]
pub struct ReceiveWindow {
    /// Buffered payloads indexed by sequence number across the whole space.
    /// `Some` only for sequence numbers in the acceptance window that have
    /// arrived but not yet been delivered.
    buffered: Vec<Option<Message>>,
    /// Smallest sequence number not yet delivered to the application.
    expected: u16,
    window_size: u16,
    space: SeqSpace,
    corrupt_reply: CorruptReply,
}

impl ReceiveWindow {
    /// Create an empty window of `window_size` over `space`.
    pub fn new(space: SeqSpace, window_size: u16, corrupt_reply: CorruptReply) -> Self {
        Self {
            buffered: vec![None; space.size() as usize],
            expected: 0,
            window_size,
            space,
            corrupt_reply,
        }
    }

    /// Return to the initial state: nothing buffered, expecting sequence 0.
    pub fn reset(&mut self) {
        self.buffered.fill(None);
        self.expected = 0;
    }

    /// Smallest sequence number not yet delivered.
    pub fn expected_seq(&self) -> u16 {
        self.expected
    }

    /// Highest contiguously delivered sequence number, `expected - 1`.
    pub fn last_in_order(&self) -> u16 {
        self.space.prev(self.expected)
    }

    /// Acknowledgment to emit for a corrupted arrival, per policy.
    pub fn corrupt_reply(&self) -> Option<u16> {
        match self.corrupt_reply {
            CorruptReply::Silent => None,
            CorruptReply::AckLastInOrder => Some(self.last_in_order()),
        }
    }

    /// Process one (already integrity-checked) data arrival.
    pub fn on_data(&mut self, seq: u16, payload: Message) -> RecvOutcome {
        if usize::from(seq) >= self.buffered.len() {
            // A sequence number outside the configured space is not ours.
            return RecvOutcome {
                accepted: false,
                ack: None,
                delivered: Vec::new(),
            };
        }

        let in_window = self.space.contains(self.expected, self.window_size, seq);
        let already_delivered = self.space.contains(
            self.space.sub(self.expected, self.window_size),
            self.window_size,
            seq,
        );

        if !in_window && !already_delivered {
            // Neither new nor a retransmission of something delivered.
            // Unreachable for a well-behaved sender when S >= 2*W; stay
            // silent rather than acknowledge a number we know nothing about.
            return RecvOutcome {
                accepted: false,
                ack: None,
                delivered: Vec::new(),
            };
        }

        let mut accepted = false;
        if in_window {
            let slot = &mut self.buffered[seq as usize];
            if slot.is_none() {
                *slot = Some(payload);
                accepted = true;
            }
        }

        // Release the contiguous run starting at `expected`.
        let mut delivered = Vec::new();
        while let Some(message) = self.buffered[self.expected as usize].take() {
            delivered.push(message);
            self.expected = self.space.next(self.expected);
        }

        RecvOutcome {
            accepted,
            ack: Some(seq),
            delivered,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
