//! Deterministic network simulation for testing the protocol end to end.
//!
//! Real channels drop, corrupt, and delay packets. To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! this module provides a [`Harness`] that owns one sender and one receiver
//! endpoint and plays the environment between them, applying a configurable
//! fault model:
//!
//! | Fault       | Description                                             |
//! |-------------|---------------------------------------------------------|
//! | Packet loss | Drop a packet with probability `loss_rate`.             |
//! | Corruption  | Perturb one field (seq, ack, or a payload byte) with    |
//! |             | probability `corrupt_rate`.                             |
//! | Delay       | Randomized propagation delay around `mean_delay`.       |
//!
//! Both directions preserve order: a packet never overtakes one sent before
//! it on the same channel. Time is simulated, so runs finish instantly, and
//! the RNG is seeded so any failure reproduces exactly.
//!
//! The harness also plays the timer facility (one resettable timer for the
//! sender; stale expirations are invalidated by a generation counter) and
//! the application (messages arrive on a fixed interval; a refused
//! submission waits in a FIFO backlog that drains as acknowledgments open
//! the window, so backpressure resolves without reordering submissions).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ConfigError, ProtocolConfig};
use crate::endpoint::{
    ReceiverEndpoint, ReceiverEnv, ReceiverStats, SenderEndpoint, SenderEnv, SenderStats,
};
use crate::packet::{Message, Packet, PAYLOAD_LEN};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fault-model and scheduling parameters. Probabilities are in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Probability that any given packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that a packet is corrupted in transit.
    pub corrupt_rate: f64,
    /// Mean one-way propagation delay.
    pub mean_delay: Duration,
    /// Interval between application message arrivals at the sender.
    pub send_interval: Duration,
    /// RNG seed; equal seeds reproduce runs exactly.
    pub seed: u64,
    /// Simulated time after which the run is abandoned as incomplete.
    pub deadline: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        // A transparent channel by default; tests opt into faults.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            mean_delay: Duration::from_secs(5),
            send_interval: Duration::from_secs(20),
            seed: 1,
            deadline: Duration::from_secs(200_000),
        }
    }
}

/// Summary of one simulated transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Payloads the receiver's application observed, in arrival order.
    pub delivered: Vec<Message>,
    /// Simulated time at which the run ended.
    pub elapsed: Duration,
    /// `true` when every submitted message was delivered before the
    /// deadline.
    pub completed: bool,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    /// Packets the channel dropped.
    pub lost: u64,
    /// Packets the channel corrupted.
    pub corrupted: u64,
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum EventKind {
    /// The application hands the sender a new message.
    AppArrival(Message),
    /// A data packet reaches the receiver.
    DataArrival(Packet),
    /// An acknowledgment reaches the sender.
    AckArrival(Packet),
    /// The sender's retransmission timer expires.
    Timeout { generation: u64 },
}

#[derive(Debug)]
struct Event {
    at: Duration,
    /// Insertion order; breaks ties so equal-time events stay FIFO.
    id: u64,
    kind: EventKind,
}

// Reversed ordering turns std's max-heap into an earliest-first queue.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.id == other.id
    }
}

impl Eq for Event {}

// ---------------------------------------------------------------------------
// Environment buffer
// ---------------------------------------------------------------------------

/// Buffers the environment calls one entry point makes, so the harness can
/// apply them to the event queue after the endpoint borrow ends.
#[derive(Default)]
struct Actions {
    sent: Vec<Packet>,
    timer: Vec<TimerCmd>,
    delivered: Vec<Message>,
}

enum TimerCmd {
    Start(Duration),
    Stop,
}

impl SenderEnv for Actions {
    fn send_on_channel(&mut self, packet: Packet) {
        self.sent.push(packet);
    }
    fn start_timer(&mut self, timeout: Duration) {
        self.timer.push(TimerCmd::Start(timeout));
    }
    fn stop_timer(&mut self) {
        self.timer.push(TimerCmd::Stop);
    }
}

impl ReceiverEnv for Actions {
    fn send_on_channel(&mut self, packet: Packet) {
        self.sent.push(packet);
    }
    fn deliver_to_application(&mut self, message: Message) {
        self.delivered.push(message);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A sender, a receiver, and the simulated world between them.
pub struct Harness {
    sender: SenderEndpoint,
    receiver: ReceiverEndpoint,
    sim: SimConfig,
    rng: StdRng,

    queue: BinaryHeap<Event>,
    next_id: u64,
    now: Duration,

    /// Latest scheduled arrival per direction; later sends never arrive
    /// earlier (the channel preserves order).
    last_data_arrival: Duration,
    last_ack_arrival: Duration,

    timer_generation: u64,
    timer_armed: bool,

    /// Messages refused by a full window, waiting in submission order.
    backlog: VecDeque<Message>,

    delivered: Vec<Message>,
    lost: u64,
    corrupted: u64,
}

impl Harness {
    pub fn new(protocol: &ProtocolConfig, sim: SimConfig) -> Result<Self, ConfigError> {
        let seed = sim.seed;
        Ok(Self {
            sender: SenderEndpoint::new(protocol)?,
            receiver: ReceiverEndpoint::new(protocol)?,
            sim,
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            next_id: 0,
            now: Duration::ZERO,
            last_data_arrival: Duration::ZERO,
            last_ack_arrival: Duration::ZERO,
            timer_generation: 0,
            timer_armed: false,
            backlog: VecDeque::new(),
            delivered: Vec::new(),
            lost: 0,
            corrupted: 0,
        })
    }

    /// Transfer `messages` from sender to receiver and report the outcome.
    ///
    /// Runs until every message is delivered or simulated time passes the
    /// configured deadline. Calling `run` again replays from a fresh state
    /// with the same seed, so two runs of one harness are identical.
    pub fn run(&mut self, messages: &[Message]) -> TransferReport {
        self.reset();

        for (i, message) in messages.iter().enumerate() {
            self.schedule(
                self.sim.send_interval * i as u32,
                EventKind::AppArrival(*message),
            );
        }

        while let Some(event) = self.queue.pop() {
            if event.at > self.sim.deadline {
                log::warn!("[sim] deadline passed with events pending, giving up");
                break;
            }
            self.now = event.at;
            self.dispatch(event.kind);
            if self.delivered.len() >= messages.len() {
                break;
            }
        }

        let completed = self.delivered.len() >= messages.len();
        TransferReport {
            delivered: std::mem::take(&mut self.delivered),
            elapsed: self.now,
            completed,
            sender: self.sender.stats().clone(),
            receiver: self.receiver.stats().clone(),
            lost: self.lost,
            corrupted: self.corrupted,
        }
    }

    fn reset(&mut self) {
        self.sender.init();
        self.receiver.init();
        self.rng = StdRng::seed_from_u64(self.sim.seed);
        self.queue.clear();
        self.next_id = 0;
        self.now = Duration::ZERO;
        self.last_data_arrival = Duration::ZERO;
        self.last_ack_arrival = Duration::ZERO;
        self.timer_generation = 0;
        self.timer_armed = false;
        self.backlog.clear();
        self.delivered.clear();
        self.lost = 0;
        self.corrupted = 0;
    }

    fn dispatch(&mut self, kind: EventKind) {
        match kind {
            EventKind::AppArrival(message) => {
                if !self.backlog.is_empty() {
                    // Earlier messages are still waiting; keep their order.
                    self.backlog.push_back(message);
                    return;
                }
                let mut acts = Actions::default();
                if self.sender.submit(&mut acts, message).is_err() {
                    // Backpressure: park it until the window opens.
                    self.backlog.push_back(message);
                }
                self.apply_sender_actions(acts);
            }
            EventKind::AckArrival(packet) => {
                let mut acts = Actions::default();
                self.sender.on_packet_arrival(&mut acts, &packet);
                self.apply_sender_actions(acts);
                self.pump_backlog();
            }
            EventKind::Timeout { generation } => {
                // A reset or stopped timer leaves its old expiry in the
                // queue; the generation check discards it.
                if self.timer_armed && generation == self.timer_generation {
                    self.timer_armed = false;
                    let mut acts = Actions::default();
                    self.sender.on_timeout(&mut acts);
                    self.apply_sender_actions(acts);
                }
            }
            EventKind::DataArrival(packet) => {
                let mut acts = Actions::default();
                self.receiver.on_packet_arrival(&mut acts, &packet);
                self.delivered.append(&mut acts.delivered);
                for packet in acts.sent {
                    self.transmit(packet, false);
                }
            }
        }
    }

    /// Submit parked messages while the window has room.
    fn pump_backlog(&mut self) {
        while let Some(&message) = self.backlog.front() {
            if !self.sender.window().can_send() {
                break;
            }
            self.backlog.pop_front();
            let mut acts = Actions::default();
            if self.sender.submit(&mut acts, message).is_err() {
                self.backlog.push_front(message);
                break;
            }
            self.apply_sender_actions(acts);
        }
    }

    fn apply_sender_actions(&mut self, acts: Actions) {
        for packet in acts.sent {
            self.transmit(packet, true);
        }
        for cmd in acts.timer {
            match cmd {
                TimerCmd::Start(timeout) => {
                    self.timer_generation += 1;
                    self.timer_armed = true;
                    let generation = self.timer_generation;
                    self.schedule(self.now + timeout, EventKind::Timeout { generation });
                }
                TimerCmd::Stop => {
                    self.timer_generation += 1;
                    self.timer_armed = false;
                }
            }
        }
    }

    /// Push a packet into one direction of the channel, applying the fault
    /// model and the order-preserving delay.
    fn transmit(&mut self, packet: Packet, to_receiver: bool) {
        if self.rng.random::<f64>() < self.sim.loss_rate {
            self.lost += 1;
            log::trace!("[net] lost seq={} ack={}", packet.seq, packet.ack);
            return;
        }

        let mut packet = packet;
        if self.rng.random::<f64>() < self.sim.corrupt_rate {
            self.mangle(&mut packet);
            self.corrupted += 1;
        }

        let delay = self.sim.mean_delay.mul_f64(0.5 + self.rng.random::<f64>());
        let mut at = self.now + delay;
        let last = if to_receiver {
            &mut self.last_data_arrival
        } else {
            &mut self.last_ack_arrival
        };
        // Arrivals in one direction never reorder.
        if at <= *last {
            at = *last + Duration::from_nanos(1);
        }
        *last = at;

        let kind = if to_receiver {
            EventKind::DataArrival(packet)
        } else {
            EventKind::AckArrival(packet)
        };
        self.schedule(at, kind);
    }

    /// Damage one field of the packet, leaving the stored checksum behind.
    fn mangle(&mut self, packet: &mut Packet) {
        match self.rng.random_range(0..8u32) {
            0 => packet.seq = packet.seq.wrapping_add(1),
            1 => packet.ack = packet.ack.wrapping_add(1),
            _ => {
                let i = self.rng.random_range(0..PAYLOAD_LEN);
                packet.payload[i] ^= 0x20;
            }
        }
        log::trace!("[net] corrupted seq={} ack={}", packet.seq, packet.ack);
    }

    fn schedule(&mut self, at: Duration, kind: EventKind) {
        self.next_id += 1;
        self.queue.push(Event {
            at,
            id: self.next_id,
            kind,
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
