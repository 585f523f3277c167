//! Integration tests for the selective-repeat transfer core.
//!
//! End-to-end scenarios run two endpoints through the deterministic
//! simulation harness; entry-point-level scenarios drive a single endpoint
//! with a recording environment so every channel send and timer command can
//! be asserted on exactly.

use std::time::Duration;

use sr_arq::config::{CorruptReply, ProtocolConfig};
use sr_arq::endpoint::{ReceiverEndpoint, ReceiverEnv, SenderEndpoint, SenderEnv};
use sr_arq::packet::{Message, Packet};
use sr_arq::sim::{Harness, SimConfig};

/// Environment stub that records every call.
#[derive(Default)]
struct Recorder {
    sent: Vec<Packet>,
    timer_starts: u32,
    timer_stops: u32,
    delivered: Vec<Message>,
}

impl SenderEnv for Recorder {
    fn send_on_channel(&mut self, packet: Packet) {
        self.sent.push(packet);
    }
    fn start_timer(&mut self, _timeout: Duration) {
        self.timer_starts += 1;
    }
    fn stop_timer(&mut self) {
        self.timer_stops += 1;
    }
}

impl ReceiverEnv for Recorder {
    fn send_on_channel(&mut self, packet: Packet) {
        self.sent.push(packet);
    }
    fn deliver_to_application(&mut self, message: Message) {
        self.delivered.push(message);
    }
}

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message::from_slice(format!("payload {i:05}").as_bytes()))
        .collect()
}

fn msg(tag: u8) -> Message {
    Message::from_slice(&[tag; 8])
}

// ---------------------------------------------------------------------------
// Test 1: clean channel — everything arrives in order, nothing resent
// ---------------------------------------------------------------------------

#[test]
fn test_clean_channel_in_order() {
    let mut harness = Harness::new(&ProtocolConfig::default(), SimConfig::default()).unwrap();
    let msgs = messages(25);
    let report = harness.run(&msgs);

    assert!(report.completed);
    assert_eq!(report.delivered, msgs);
    assert_eq!(report.sender.retransmitted, 0);
    assert_eq!(report.receiver.duplicates, 0);
}

// ---------------------------------------------------------------------------
// Test 2: lossy channel — loss is masked, delivery stays exact
// ---------------------------------------------------------------------------

#[test]
fn test_lossy_channel_delivers_exactly_once() {
    for seed in [3, 17, 1999] {
        let sim = SimConfig {
            loss_rate: 0.25,
            seed,
            ..Default::default()
        };
        let mut harness = Harness::new(&ProtocolConfig::default(), sim).unwrap();
        let msgs = messages(30);
        let report = harness.run(&msgs);

        assert!(report.completed, "seed {seed}: transfer did not finish");
        assert_eq!(report.delivered, msgs, "seed {seed}: wrong delivery");
    }
}

// ---------------------------------------------------------------------------
// Test 3: corrupting channel — damage is detected, never delivered
// ---------------------------------------------------------------------------

#[test]
fn test_corrupting_channel_delivers_exactly_once() {
    for seed in [5, 42, 4242] {
        let sim = SimConfig {
            corrupt_rate: 0.25,
            seed,
            ..Default::default()
        };
        let mut harness = Harness::new(&ProtocolConfig::default(), sim).unwrap();
        let msgs = messages(30);
        let report = harness.run(&msgs);

        assert!(report.completed, "seed {seed}: transfer did not finish");
        assert_eq!(report.delivered, msgs, "seed {seed}: wrong delivery");
        if report.corrupted > 0 {
            assert!(
                report.sender.corrupt_acks + report.receiver.corrupt > 0,
                "seed {seed}: corruption happened but nothing was detected"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Test 4: both fault types, both corrupt-reply policies
// ---------------------------------------------------------------------------

#[test]
fn test_hostile_channel_under_both_corrupt_policies() {
    for corrupt_reply in [CorruptReply::Silent, CorruptReply::AckLastInOrder] {
        let protocol = ProtocolConfig {
            corrupt_reply,
            ..Default::default()
        };
        let sim = SimConfig {
            loss_rate: 0.15,
            corrupt_rate: 0.15,
            seed: 77,
            ..Default::default()
        };
        let mut harness = Harness::new(&protocol, sim).unwrap();
        let msgs = messages(40);
        let report = harness.run(&msgs);

        assert!(report.completed, "{corrupt_reply:?}: transfer did not finish");
        assert_eq!(report.delivered, msgs, "{corrupt_reply:?}: wrong delivery");
    }
}

// ---------------------------------------------------------------------------
// Test 5: sequence numbers wrap many times without misdelivery
// ---------------------------------------------------------------------------

#[test]
fn test_wraparound_survives_loss() {
    // 90 messages through a 12-number space: seven-plus trips around.
    let sim = SimConfig {
        loss_rate: 0.2,
        seed: 11,
        ..Default::default()
    };
    let mut harness = Harness::new(&ProtocolConfig::default(), sim).unwrap();
    let msgs = messages(90);
    let report = harness.run(&msgs);

    assert!(report.completed);
    assert_eq!(report.delivered, msgs);
}

// ---------------------------------------------------------------------------
// Test 6: stop-and-wait degenerate case (W = 1, S = 2)
// ---------------------------------------------------------------------------

#[test]
fn test_minimal_window_and_space() {
    let protocol = ProtocolConfig {
        window_size: 1,
        seq_space: 2,
        ..Default::default()
    };
    let sim = SimConfig {
        loss_rate: 0.2,
        seed: 23,
        ..Default::default()
    };
    let mut harness = Harness::new(&protocol, sim).unwrap();
    let msgs = messages(15);
    let report = harness.run(&msgs);

    assert!(report.completed);
    assert_eq!(report.delivered, msgs);
}

// ---------------------------------------------------------------------------
// Test 7: application outruns the window — backpressure, then full delivery
// ---------------------------------------------------------------------------

#[test]
fn test_saturated_sender_stays_in_order() {
    let sim = SimConfig {
        send_interval: Duration::from_secs(1),
        seed: 9,
        ..Default::default()
    };
    let mut harness = Harness::new(&ProtocolConfig::default(), sim).unwrap();
    let msgs = messages(30);
    let report = harness.run(&msgs);

    assert!(report.completed);
    assert_eq!(report.delivered, msgs);
    assert!(
        report.sender.window_full > 0,
        "a 1-second arrival interval must saturate the window at least once"
    );
}

// ---------------------------------------------------------------------------
// Test 8: window saturation blocks submission at exactly W
// ---------------------------------------------------------------------------

#[test]
fn test_window_saturation_blocks_submission() {
    let mut sender = SenderEndpoint::new(&ProtocolConfig::default()).unwrap();
    let mut env = Recorder::default();

    // Exactly W submissions succeed with no acknowledgments.
    for i in 0..6 {
        assert!(sender.submit(&mut env, msg(i)).is_ok(), "submission {i}");
    }
    // The next one is refused and nothing goes on the wire.
    assert!(sender.submit(&mut env, msg(6)).is_err());
    assert_eq!(env.sent.len(), 6);

    // One acknowledgment advances the base; the next submission succeeds.
    sender.on_packet_arrival(&mut env, &Packet::ack(0, 0));
    assert!(sender.submit(&mut env, msg(6)).is_ok());
    assert_eq!(env.sent.len(), 7);
}

// ---------------------------------------------------------------------------
// Test 9: timeout retransmits exactly the unacknowledged packets, in order
// ---------------------------------------------------------------------------

#[test]
fn test_timeout_retransmits_only_unacked() {
    let mut sender = SenderEndpoint::new(&ProtocolConfig::default()).unwrap();
    let mut env = Recorder::default();

    // Packets 0..4 sent; 1 and 3 acknowledged.
    for i in 0..5 {
        sender.submit(&mut env, msg(i)).unwrap();
    }
    sender.on_packet_arrival(&mut env, &Packet::ack(0, 1));
    sender.on_packet_arrival(&mut env, &Packet::ack(1, 3));

    let mut env = Recorder::default();
    sender.on_timeout(&mut env);

    let resent: Vec<u16> = env.sent.iter().map(|p| p.seq).collect();
    assert_eq!(resent, vec![0, 2, 4]);
    assert_eq!(env.timer_starts, 1, "the timer restarts after the timeout");
}

// ---------------------------------------------------------------------------
// Test 10: duplicate receipt is idempotent but still acknowledged
// ---------------------------------------------------------------------------

#[test]
fn test_duplicate_receipt_is_idempotent() {
    let mut receiver = ReceiverEndpoint::new(&ProtocolConfig::default()).unwrap();
    let mut env = Recorder::default();

    let pkt = Packet::data(0, msg(0));
    receiver.on_packet_arrival(&mut env, &pkt);
    assert_eq!(env.delivered.len(), 1);
    assert_eq!(env.sent.len(), 1);

    // The same packet again: no second delivery, but a fresh acknowledgment.
    receiver.on_packet_arrival(&mut env, &pkt);
    assert_eq!(env.delivered.len(), 1);
    assert_eq!(env.sent.len(), 2);
    assert_eq!(env.sent[1].ack, 0);
}

// ---------------------------------------------------------------------------
// Test 11: statistics add up on a clean run
// ---------------------------------------------------------------------------

#[test]
fn test_clean_run_statistics_balance() {
    let mut harness = Harness::new(&ProtocolConfig::default(), SimConfig::default()).unwrap();
    let msgs = messages(12);
    let report = harness.run(&msgs);

    assert_eq!(report.sender.submitted, 12);
    assert_eq!(report.receiver.delivered, 12);
    assert_eq!(report.receiver.accepted, 12);
    assert_eq!(report.receiver.acks_sent, report.receiver.received);
    assert_eq!(report.sender.corrupt_acks, 0);
    assert_eq!(report.sender.stale_acks, 0);
}
