//! Endpoint entry points and the environment they drive.
//!
//! This layer owns the pure state machines ([`crate::sender::SendWindow`],
//! [`crate::receiver::ReceiveWindow`]) and turns their outcomes into calls
//! on the environment: transmitting packets, arming the retransmission
//! timer, delivering payloads upward. The environment is expressed as
//! traits implemented by the caller (the simulation harness in this crate,
//! or any other driver) and passed `&mut` into each entry point, so endpoint
//! state stays an explicit struct owned by the caller.
//!
//! Entry points run to completion and are invoked one at a time by the
//! driver; no locking is needed because there is no parallelism.

use std::time::Duration;

use crate::config::{ConfigError, ProtocolConfig};
use crate::packet::{Message, Packet};
use crate::receiver::ReceiveWindow;
use crate::sender::{AckOutcome, SendWindow, SubmitError};

// ---------------------------------------------------------------------------
// Environment traits
// ---------------------------------------------------------------------------

/// Capabilities the sender endpoint consumes from its surroundings.
pub trait SenderEnv {
    /// Hand a packet to the data channel. The channel may lose, corrupt, or
    /// delay it, but never reorders packets from the same endpoint.
    fn send_on_channel(&mut self, packet: Packet);
    /// Arm the single retransmission timer. Starting a running timer resets
    /// its deadline; there is never more than one outstanding expiry.
    fn start_timer(&mut self, timeout: Duration);
    /// Disarm the timer. Stopping a stopped timer is a no-op.
    fn stop_timer(&mut self);
}

/// Capabilities the receiver endpoint consumes from its surroundings.
pub trait ReceiverEnv {
    /// Hand a packet to the acknowledgment channel.
    fn send_on_channel(&mut self, packet: Packet);
    /// Hand a reassembled, in-order payload to the application.
    fn deliver_to_application(&mut self, message: Message);
}

// ---------------------------------------------------------------------------
// Sender endpoint
// ---------------------------------------------------------------------------

/// Send-side counters. Nothing here is fatal; anomalies are absorbed by the
/// protocol and only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Messages accepted into the window and transmitted.
    pub submitted: u64,
    /// Submissions refused because the window was full.
    pub window_full: u64,
    /// Uncorrupted acknowledgment packets processed.
    pub acks_received: u64,
    /// Acknowledgments that marked a previously unacknowledged packet.
    pub new_acks: u64,
    /// Duplicate or out-of-window acknowledgments, ignored.
    pub stale_acks: u64,
    /// Acknowledgments dropped by the integrity check.
    pub corrupt_acks: u64,
    /// Packets retransmitted after a timeout.
    pub retransmitted: u64,
}

/// The data-originating endpoint.
#[derive(Debug)]
pub struct SenderEndpoint {
    window: SendWindow,
    timeout: Duration,
    stats: SenderStats,
}

impl SenderEndpoint {
    /// Build a sender over a validated configuration.
    pub fn new(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: SendWindow::new(config.space(), config.window_size),
            timeout: config.timeout,
            stats: SenderStats::default(),
        })
    }

    /// Reset all window state and counters. Called once before any other
    /// entry point; may be called again to reuse the endpoint.
    pub fn init(&mut self) {
        self.window.reset();
        self.stats = SenderStats::default();
    }

    /// Entry point for the application: originate one message.
    ///
    /// On success the packet is transmitted and, if it is the only
    /// outstanding one, the retransmission timer is started. When the window
    /// is full the submission is refused and nothing is sent — the refusal
    /// is the backpressure signal.
    pub fn submit<E: SenderEnv>(
        &mut self,
        env: &mut E,
        message: Message,
    ) -> Result<(), SubmitError> {
        let was_idle = !self.window.has_unacked();
        match self.window.submit(message) {
            Ok(packet) => {
                self.stats.submitted += 1;
                log::debug!(
                    "[snd] → data seq={} in_flight={}",
                    packet.seq,
                    self.window.in_flight()
                );
                env.send_on_channel(packet);
                if was_idle {
                    env.start_timer(self.timeout);
                }
                Ok(())
            }
            Err(e) => {
                self.stats.window_full += 1;
                log::debug!("[snd] window full, submission refused");
                Err(e)
            }
        }
    }

    /// Entry point for the channel: an acknowledgment packet arrived.
    pub fn on_packet_arrival<E: SenderEnv>(&mut self, env: &mut E, packet: &Packet) {
        if packet.is_corrupted() {
            self.stats.corrupt_acks += 1;
            log::debug!("[snd] ← corrupt ack, dropped");
            return;
        }
        if !packet.is_ack() {
            // Only the receiver originates data; nothing to do with this.
            log::warn!("[snd] ← unexpected data packet seq={}", packet.seq);
            return;
        }

        self.stats.acks_received += 1;
        match self.window.on_ack(packet.ack) {
            AckOutcome::Acked { slid } => {
                self.stats.new_acks += 1;
                log::debug!(
                    "[snd] ← ack {} (slid {}, in_flight={})",
                    packet.ack,
                    slid,
                    self.window.in_flight()
                );
                if slid > 0 {
                    if self.window.has_unacked() {
                        env.start_timer(self.timeout);
                    } else {
                        env.stop_timer();
                    }
                }
            }
            AckOutcome::Stale => {
                self.stats.stale_acks += 1;
                log::debug!("[snd] ← stale ack {}, ignored", packet.ack);
            }
        }
    }

    /// Entry point for the timer facility: the retransmission timer expired.
    ///
    /// Retransmits every buffered unacknowledged packet in ascending
    /// sequence order and restarts the timer unconditionally.
    pub fn on_timeout<E: SenderEnv>(&mut self, env: &mut E) {
        log::debug!(
            "[snd] timeout, resending unacked (in_flight={})",
            self.window.in_flight()
        );
        for packet in self.window.unacked() {
            log::debug!("[snd] ↻ resend seq={}", packet.seq);
            env.send_on_channel(*packet);
            self.stats.retransmitted += 1;
        }
        env.start_timer(self.timeout);
    }

    /// Counters accumulated since the last [`init`](Self::init).
    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Read-only view of the underlying window state.
    pub fn window(&self) -> &SendWindow {
        &self.window
    }
}

// ---------------------------------------------------------------------------
// Receiver endpoint
// ---------------------------------------------------------------------------

/// Receive-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Uncorrupted data packets processed.
    pub received: u64,
    /// Packets newly buffered (first arrival of their sequence number).
    pub accepted: u64,
    /// Duplicate arrivals, re-acknowledged but not re-buffered.
    pub duplicates: u64,
    /// Payloads delivered to the application.
    pub delivered: u64,
    /// Data packets dropped by the integrity check.
    pub corrupt: u64,
    /// Acknowledgments transmitted.
    pub acks_sent: u64,
}

/// The acknowledgment-originating endpoint.
#[derive(Debug)]
pub struct ReceiverEndpoint {
    window: ReceiveWindow,
    /// Sequence counter stamped on outgoing acknowledgments. The sender
    /// never tracks it, so it only alternates between 0 and 1.
    ack_seq: u16,
    stats: ReceiverStats,
}

impl ReceiverEndpoint {
    /// Build a receiver over a validated configuration.
    pub fn new(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: ReceiveWindow::new(config.space(), config.window_size, config.corrupt_reply),
            ack_seq: 1,
            stats: ReceiverStats::default(),
        })
    }

    /// Reset all window state and counters.
    pub fn init(&mut self) {
        self.window.reset();
        self.ack_seq = 1;
        self.stats = ReceiverStats::default();
    }

    /// Entry point for the channel: a data packet arrived.
    pub fn on_packet_arrival<E: ReceiverEnv>(&mut self, env: &mut E, packet: &Packet) {
        if packet.is_corrupted() {
            self.stats.corrupt += 1;
            match self.window.corrupt_reply() {
                Some(acknum) => {
                    log::debug!("[rcv] ← corrupt packet, re-acking {acknum}");
                    self.send_ack(env, acknum);
                }
                None => log::debug!("[rcv] ← corrupt packet, dropped"),
            }
            return;
        }
        if packet.is_ack() {
            // Only this endpoint originates acknowledgments.
            log::warn!("[rcv] ← unexpected ack {}", packet.ack);
            return;
        }

        self.stats.received += 1;
        let payload = Message {
            data: packet.payload,
        };
        let outcome = self.window.on_data(packet.seq, payload);

        if outcome.accepted {
            self.stats.accepted += 1;
        } else if outcome.ack.is_some() {
            self.stats.duplicates += 1;
        }
        log::debug!(
            "[rcv] ← data seq={} accepted={} expected={}",
            packet.seq,
            outcome.accepted,
            self.window.expected_seq()
        );

        for message in outcome.delivered {
            self.stats.delivered += 1;
            env.deliver_to_application(message);
        }
        if let Some(acknum) = outcome.ack {
            self.send_ack(env, acknum);
        }
    }

    /// Counters accumulated since the last [`init`](Self::init).
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Read-only view of the underlying window state.
    pub fn window(&self) -> &ReceiveWindow {
        &self.window
    }

    fn send_ack<E: ReceiverEnv>(&mut self, env: &mut E, acknum: u16) {
        let ack = Packet::ack(self.ack_seq, acknum);
        self.ack_seq = (self.ack_seq + 1) % 2;
        self.stats.acks_sent += 1;
        log::debug!("[rcv] → ack {acknum}");
        env.send_on_channel(ack);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
