//! Send-side window state machine.
//!
//! [`SendWindow`] maintains a sliding window of up to `W` in-flight packets
//! with a per-packet acknowledged flag.
//!
//! # Protocol contract
//!
//! - At most `W` packets may be outstanding at once; further submissions are
//!   refused until an acknowledgment frees a slot.
//! - Acknowledgments are **per-packet**: each one marks a single sequence
//!   number. The window base slides forward only through a contiguous run of
//!   acknowledged packets.
//! - On timeout, only the packets still unacknowledged are retransmitted,
//!   in ascending sequence order.
//! - Sequence numbers wrap inside a small configured space; all comparisons
//!   go through [`SeqSpace`].
//!
//! This module only manages state; transmitting packets and driving the
//! retransmission timer is the caller's responsibility (see
//! [`crate::endpoint`]).

use thiserror::Error;

use crate::packet::{Message, Packet};
use crate::seq::SeqSpace;

/// A submission the window had to refuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// All `W` slots hold unacknowledged packets; try again after the window
    /// base advances.
    #[error("send window is full ({in_flight} packets awaiting acknowledgment)")]
    WindowFull { in_flight: usize },
}

/// What processing one acknowledgment number did to the window.
#[derive(Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// A previously unacknowledged packet was marked; `slid` slots were
    /// freed by advancing the base through the acknowledged run.
    Acked { slid: usize },
    /// Out-of-window or already-acknowledged number; no state change.
    Stale,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// One buffered packet occupying a window slot.
#[derive(Debug, Clone)]
struct Slot {
    packet: Packet,
    acked: bool,
}

/// Send-side state for one endpoint.
///
/// # Sequence-number layout
///
/// ```text
///       base              next_seq
///        │                    │
///  ──────┼────────────────────┼──────────────▶ seq space (mod S)
///        │ ◀── outstanding ──▶│ ◀─ sendable ─▶
///              (count ≤ W)
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// Arena of `W` slots; the slot for the packet at forward distance `d`
    /// from `base` is `(head + d) % W`.
    slots: Vec<Option<Slot>>,
    /// Arena index of the slot holding `base`.
    head: usize,
    /// Sequence number of the oldest still-relevant packet.
    base: u16,
    /// Number of currently buffered packets.
    count: usize,
    /// Sequence number for the next new packet.
    next_seq: u16,
    space: SeqSpace,
}

impl SendWindow {
    /// Create an empty window of `window_size` slots over `space`.
    pub fn new(space: SeqSpace, window_size: u16) -> Self {
        Self {
            slots: vec![None; window_size as usize],
            head: 0,
            base: 0,
            count: 0,
            next_seq: 0,
            space,
        }
    }

    /// Return to the initial state: empty window, sequence numbers at zero.
    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.head = 0;
        self.base = 0;
        self.count = 0;
        self.next_seq = 0;
    }

    /// `true` when there is room for one more outstanding packet.
    pub fn can_send(&self) -> bool {
        self.count < self.slots.len()
    }

    /// Number of packets currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.count
    }

    /// `true` when at least one packet is awaiting acknowledgment.
    ///
    /// The base packet is unacknowledged whenever the window is non-empty,
    /// because the base slides past acknowledged packets immediately.
    pub fn has_unacked(&self) -> bool {
        self.count > 0
    }

    /// Sequence number of the window base.
    pub fn base(&self) -> u16 {
        self.base
    }

    /// Sequence number the next submission will use.
    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    /// Accept one message: build its packet, buffer it unacknowledged, and
    /// return it for transmission.
    ///
    /// Fails with [`SubmitError::WindowFull`] when all slots are taken; the
    /// message is not buffered and nothing is sent.
    pub fn submit(&mut self, message: Message) -> Result<Packet, SubmitError> {
        if !self.can_send() {
            return Err(SubmitError::WindowFull {
                in_flight: self.count,
            });
        }

        let packet = Packet::data(self.next_seq, message);
        let tail = (self.head + self.count) % self.slots.len();
        self.slots[tail] = Some(Slot {
            packet,
            acked: false,
        });
        self.count += 1;
        self.next_seq = self.space.next(self.next_seq);
        Ok(packet)
    }

    /// Process one (already integrity-checked) acknowledgment number.
    ///
    /// In-window, not-yet-acknowledged numbers are marked; if the base is or
    /// becomes acknowledged, the window slides through every contiguously
    /// acknowledged slot. Everything else is [`AckOutcome::Stale`].
    pub fn on_ack(&mut self, acknum: u16) -> AckOutcome {
        let d = usize::from(self.space.distance(self.base, acknum));
        if d >= self.count {
            return AckOutcome::Stale;
        }

        let idx = (self.head + d) % self.slots.len();
        match self.slots[idx].as_mut() {
            Some(slot) if !slot.acked => slot.acked = true,
            _ => return AckOutcome::Stale,
        }

        let mut slid = 0;
        while self.count > 0 {
            match self.slots[self.head].as_ref() {
                Some(slot) if slot.acked => {
                    self.slots[self.head] = None;
                    self.head = (self.head + 1) % self.slots.len();
                    self.base = self.space.next(self.base);
                    self.count -= 1;
                    slid += 1;
                }
                _ => break,
            }
        }
        AckOutcome::Acked { slid }
    }

    /// Iterate over the buffered packets not yet acknowledged, in ascending
    /// sequence order starting from the base.
    pub fn unacked(&self) -> impl Iterator<Item = &Packet> + '_ {
        (0..self.count).filter_map(move |d| {
            let slot = self.slots[(self.head + d) % self.slots.len()].as_ref()?;
            (!slot.acked).then_some(&slot.packet)
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
