//! tickbook - replay driver
//!
//! Pushes a deterministic synthetic feed through the book, refreshes the
//! analytics periodically and logs a trading record at every refresh.
//!
//! ```text
//! RUST_LOG=debug tickbook --messages 1000000 --log-file run.csv
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tickbook::logging::{AsyncLogger, TcpLineSink};
use tickbook::orderbook::{Applied, Orderbook};
use tickbook::{EngineConfig, Message, Side};

#[derive(Parser, Debug)]
#[command(name = "tickbook", about = "Replay a synthetic order feed through the book")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trading log path (overrides the config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Number of feed messages to replay
    #[arg(short = 'n', long, default_value_t = 100_000)]
    messages: u64,

    /// Refresh analytics and log every N messages
    #[arg(long, default_value_t = 1_000)]
    every: u64,

    /// Mirror trading records to stdout
    #[arg(long)]
    console: bool,

    /// Forward line-protocol records to this TCP address
    #[arg(long)]
    forward: Option<SocketAddr>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = args.log_file {
        config.logger.path = path;
    }
    config.logger.console |= args.console;

    let mut book = Orderbook::with_config(&config.book);
    let mut logger = match args.forward {
        Some(addr) => AsyncLogger::with_forwarder(&config.logger, TcpLineSink::new(addr)),
        None => AsyncLogger::new(&config.logger),
    }
    .context("starting trading logger")?;

    info!(messages = args.messages, every = args.every, "replay starting");

    let every = args.every.max(1);
    let mut feed = SyntheticFeed::new(1_700_000_000_000_000_000);
    let mut strategy = ImbalanceTracker::default();
    let mut rejected = 0u64;
    let start = Instant::now();

    for seq in 0..args.messages {
        let msg = feed.next_message(&book);

        match book.process_msg(&msg) {
            Ok(Applied::Traded(summary)) => strategy.trades += u64::from(summary.orders_filled),
            Ok(_) => {}
            Err(err) if err.is_fatal() => {
                return Err(err).with_context(|| format!("message {seq} corrupted the book"));
            }
            Err(_) => rejected += 1,
        }

        if (seq + 1) % every == 0 {
            book.calculate_vols();
            let imbalance = book.calculate_imbalance();
            book.calculate_skew();
            book.calculate_voi();
            let mid = book.record_mid_price();
            strategy.update(imbalance, mid);

            logger.log(
                book.current_time(),
                book.best_bid_price().unwrap_or(0),
                book.best_ask_price().unwrap_or(0),
                strategy.position,
                strategy.trades,
                strategy.pnl,
            );
        }
    }

    let elapsed = start.elapsed();
    let stats = logger.shutdown().context("stopping trading logger")?;

    if rejected > 0 {
        warn!(rejected, "feed messages rejected");
    }

    let throughput = args.messages as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("=== Replay Summary ===");
    println!("Messages:          {}", book.messages_processed());
    println!("Elapsed:           {:.2} ms", elapsed.as_secs_f64() * 1_000.0);
    println!("Throughput:        {:.0} msgs/sec", throughput);
    println!("Book time:         {}", book.formatted_time());
    println!("Resting orders:    {} bids, {} asks", book.bid_count(), book.ask_count());
    println!("Levels:            {} bids, {} asks", book.bid_levels(), book.ask_levels());
    if let (Some(bid), Some(ask)) = (book.best_bid_price(), book.best_ask_price()) {
        println!("Best bid/ask:      {bid} / {ask}");
    }
    if let Some(vwap) = book.vwap() {
        println!("VWAP:              {vwap:.4}");
    }
    println!("Imbalance:         {:.4}", book.imbalance());
    println!("Skew:              {:.4}", book.skew());
    println!("Log lines:         {} (dropped {})", stats.file_lines, stats.dropped);
    println!("State root:        {}", hex::encode(book.state_root()));

    Ok(())
}

// ============================================================================
// Synthetic feed
// ============================================================================

/// Deterministic add/cancel/modify/trade mix around a slowly drifting mid.
struct SyntheticFeed {
    seq: u64,
    next_id: u64,
    time: u64,
    live: VecDeque<(u64, i32, Side, u32)>,
}

impl SyntheticFeed {
    fn new(start_ns: u64) -> Self {
        Self {
            seq: 0,
            next_id: 1,
            time: start_ns,
            live: VecDeque::new(),
        }
    }

    fn mid(&self) -> i32 {
        10_000 + ((self.seq / 500) % 40) as i32 - 20
    }

    fn next_message(&mut self, book: &Orderbook) -> Message {
        self.seq += 1;
        self.time += 1_000 + (self.seq % 13) * 100;

        // Trades and cancels can remove orders the feed still remembers
        while let Some(&(id, ..)) = self.live.front() {
            if book.contains_order(id) {
                break;
            }
            self.live.pop_front();
        }

        match self.seq % 10 {
            5 | 6 if self.live.len() > 64 => {
                let (id, price, side, size) = self.live.pop_front().unwrap_or_default();
                Message::cancel(id, price, size, side, self.time)
            }
            7 if !self.live.is_empty() => {
                let (id, price, side, size) = self.live[0];
                let size = if self.seq % 20 == 7 { size / 2 + 1 } else { size + 5 };
                self.live[0].3 = size;
                Message::modify(id, price, size, side, self.time)
            }
            8 => match (book.best_bid_price(), book.best_ask_price()) {
                (_, Some(ask)) if self.seq % 3 == 0 => {
                    Message::trade(self.fresh_id(), ask, 15, Side::Bid, self.time)
                }
                (Some(bid), _) => Message::trade(self.fresh_id(), bid, 15, Side::Ask, self.time),
                _ => self.add(),
            },
            _ => self.add(),
        }
    }

    fn add(&mut self) -> Message {
        let id = self.fresh_id();
        let offset = 1 + (self.seq % 5) as i32;
        let size = 1 + (self.seq % 7) as u32 * 10;
        let (side, price) = if self.seq % 2 == 0 {
            (Side::Bid, self.mid() - offset)
        } else {
            (Side::Ask, self.mid() + offset)
        };
        self.live.push_back((id, price, side, size));
        Message::add(id, price, size, side, self.time)
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

// ============================================================================
// Toy strategy
// ============================================================================

/// Holds one lot in the direction of the book imbalance, marked to mid.
#[derive(Default)]
struct ImbalanceTracker {
    position: i64,
    trades: u64,
    pnl: f64,
    last_mid: Option<i32>,
}

impl ImbalanceTracker {
    fn update(&mut self, imbalance: f64, mid: Option<i32>) {
        if let (Some(prev), Some(mid)) = (self.last_mid, mid) {
            self.pnl += self.position as f64 * f64::from(mid - prev);
        }
        self.position = if imbalance > 0.2 {
            1
        } else if imbalance < -0.2 {
            -1
        } else {
            0
        };
        if mid.is_some() {
            self.last_mid = mid;
        }
    }
}
