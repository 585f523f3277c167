//! Packet and message definitions plus the integrity checksum.
//!
//! Every unit exchanged between the two endpoints is a [`Packet`]: either a
//! data packet carrying one fixed-size application [`Message`], or an
//! acknowledgment. This module is responsible for:
//! - Defining the packet fields (sequence number, acknowledgment number,
//!   payload, checksum).
//! - Computing the checksum at construction time.
//! - Verifying the checksum on arrival, so channel corruption is detected.
//!
//! No protocol state lives here — this is pure data transformation.
//!
//! The checksum covers the sequence number, the acknowledgment number, and
//! every payload byte. It is computed once when the packet is built, so the
//! only thing [`Packet::is_corrupted`] can detect is damage introduced by
//! the channel between send and receive.

/// Byte length of an application message and of every packet payload.
pub const PAYLOAD_LEN: usize = 20;

/// Sentinel acknowledgment number carried by data packets.
///
/// Far outside any valid sequence space, so it can never be mistaken for a
/// real acknowledgment.
pub const ACK_NONE: u16 = u16::MAX;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A fixed-size unit of application data.
///
/// The application hands these down to the sender; the receiver hands them
/// back up, in submission order, exactly once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub data: [u8; PAYLOAD_LEN],
}

impl Message {
    /// Build a message from arbitrary bytes, truncating or zero-padding to
    /// [`PAYLOAD_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_LEN];
        let n = bytes.len().min(PAYLOAD_LEN);
        data[..n].copy_from_slice(&bytes[..n]);
        Self { data }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A single protocol datagram.
///
/// Immutable once constructed: corruption is detected via the checksum,
/// never repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of this packet (data) or of the acknowledging
    /// endpoint's own counter (ACK).
    pub seq: u16,
    /// Acknowledged sequence number, or [`ACK_NONE`] on data packets.
    pub ack: u16,
    /// Application payload; all zeroes on acknowledgments.
    pub payload: [u8; PAYLOAD_LEN],
    /// Integrity code over `seq`, `ack`, and `payload`.
    pub checksum: u32,
}

impl Packet {
    /// Build a data packet carrying `message` under sequence number `seq`.
    pub fn data(seq: u16, message: Message) -> Self {
        let payload = message.data;
        Self {
            seq,
            ack: ACK_NONE,
            payload,
            checksum: checksum(seq, ACK_NONE, &payload),
        }
    }

    /// Build an acknowledgment for sequence number `acknum`.
    ///
    /// `seq` is the acknowledging endpoint's own sequence counter; the data
    /// sender does not track it.
    pub fn ack(seq: u16, acknum: u16) -> Self {
        let payload = [0u8; PAYLOAD_LEN];
        Self {
            seq,
            ack: acknum,
            payload,
            checksum: checksum(seq, acknum, &payload),
        }
    }

    /// `true` when this packet carries an acknowledgment.
    ///
    /// Only meaningful after [`is_corrupted`](Self::is_corrupted) has been
    /// checked — a mangled `ack` field is caught by the checksum first.
    pub fn is_ack(&self) -> bool {
        self.ack != ACK_NONE
    }

    /// Recompute the checksum and compare against the stored one.
    ///
    /// Returns `false` (uncorrupted) only on an exact match.
    pub fn is_corrupted(&self) -> bool {
        self.checksum != checksum(self.seq, self.ack, &self.payload)
    }
}

/// Compute the integrity code over a packet's fields.
///
/// A wrapping sum of the two numeric fields and every payload byte. Any
/// single-field perturbation changes the sum, which is all the simulated
/// channel's corruption model requires.
pub fn checksum(seq: u16, ack: u16, payload: &[u8; PAYLOAD_LEN]) -> u32 {
    payload
        .iter()
        .fold(u32::from(seq).wrapping_add(u32::from(ack)), |sum, &b| {
            sum.wrapping_add(u32::from(b))
        })
}
