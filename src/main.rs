//! Entry point for `sr-arq`.
//!
//! Parses CLI arguments, runs one simulated transfer through the lossy
//! channel, and reports what happened. All protocol work is delegated to
//! library modules; `main.rs` owns only process setup (logging, argument
//! parsing) and reporting.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use sr_arq::config::{CorruptReply, ProtocolConfig};
use sr_arq::packet::Message;
use sr_arq::sim::{Harness, SimConfig};

/// Simulate a reliable transfer over a lossy, corrupting channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Number of messages to transfer.
    #[arg(short = 'n', long, default_value_t = 50)]
    count: usize,

    /// Probability that the channel drops any given packet.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    /// Probability that the channel corrupts any given packet.
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,

    /// Sender window size (W).
    #[arg(short, long, default_value_t = 6)]
    window: u16,

    /// Sequence-number space; must be at least twice the window.
    #[arg(long, default_value_t = 12)]
    seq_space: u16,

    /// Retransmission timeout in simulated seconds.
    #[arg(long, default_value_t = 16.0)]
    timeout: f64,

    /// Mean one-way channel delay in simulated seconds.
    #[arg(long, default_value_t = 5.0)]
    delay: f64,

    /// Interval between application messages in simulated seconds.
    #[arg(long, default_value_t = 20.0)]
    interval: f64,

    /// RNG seed; equal seeds reproduce runs exactly.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Acknowledge corrupted arrivals with the last in-order sequence
    /// number instead of dropping them silently.
    #[arg(long)]
    ack_corrupt: bool,
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let protocol = ProtocolConfig {
        window_size: cli.window,
        seq_space: cli.seq_space,
        timeout: Duration::from_secs_f64(cli.timeout),
        corrupt_reply: if cli.ack_corrupt {
            CorruptReply::AckLastInOrder
        } else {
            CorruptReply::Silent
        },
    };
    let sim = SimConfig {
        loss_rate: cli.loss,
        corrupt_rate: cli.corrupt,
        mean_delay: Duration::from_secs_f64(cli.delay),
        send_interval: Duration::from_secs_f64(cli.interval),
        seed: cli.seed,
        ..Default::default()
    };

    let messages: Vec<Message> = (0..cli.count)
        .map(|i| Message::from_slice(format!("message {i:06}").as_bytes()))
        .collect();

    log::info!(
        "transferring {} messages (window={}, seq_space={}, loss={}, corrupt={}, seed={})",
        cli.count,
        cli.window,
        cli.seq_space,
        cli.loss,
        cli.corrupt,
        cli.seed
    );

    let mut harness = Harness::new(&protocol, sim)?;
    let report = harness.run(&messages);

    println!(
        "delivered {}/{} messages in {:.1} simulated seconds",
        report.delivered.len(),
        cli.count,
        report.elapsed.as_secs_f64()
    );
    println!(
        "channel:  {} packets lost, {} corrupted",
        report.lost, report.corrupted
    );
    println!(
        "sender:   {} sent, {} retransmitted, {} refused (window full), \
         {} acks ({} new, {} stale, {} corrupt)",
        report.sender.submitted,
        report.sender.retransmitted,
        report.sender.window_full,
        report.sender.acks_received,
        report.sender.new_acks,
        report.sender.stale_acks,
        report.sender.corrupt_acks
    );
    println!(
        "receiver: {} received ({} new, {} duplicate, {} corrupt), {} delivered, {} acks sent",
        report.receiver.received,
        report.receiver.accepted,
        report.receiver.duplicates,
        report.receiver.corrupt,
        report.receiver.delivered,
        report.receiver.acks_sent
    );

    if !report.completed {
        anyhow::bail!(
            "transfer incomplete: {}/{} messages delivered before the deadline",
            report.delivered.len(),
            cli.count
        );
    }
    Ok(())
}
