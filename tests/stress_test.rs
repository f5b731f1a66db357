//! Stress tests for the replay book.
//!
//! These tests verify:
//! 1. Structural invariants hold after every message of a random feed
//! 2. Throughput stays well above replay rates
//! 3. Determinism: same feed, same state root
//! 4. Order and level slots are recycled, not leaked
//!
//! ## Running Stress Tests
//!
//! ```bash
//! # Run all stress tests (release mode recommended)
//! cargo test --release --test stress_test -- --nocapture
//!
//! # Run specific test
//! cargo test --release --test stress_test stress_throughput -- --nocapture
//! ```

use std::time::Instant;

use tickbook::orderbook::Applied;
use tickbook::{Message, Orderbook, Side};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

/// Messages replayed by the throughput test
const STRESS_MESSAGE_COUNT: usize = 500_000;

/// Lower bound on messages per second (holds in debug builds too)
const TARGET_THROUGHPUT: f64 = 20_000.0;

/// Centre of the synthetic price range (ticks)
const BASE_PRICE: i32 = 10_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Generate a deterministic add/cancel/modify/trade feed.
///
/// Uses a seeded RNG for reproducibility. Same seed = same feed. Sides are
/// remembered per id so the feed never asks for a side switch.
fn generate_feed(count: usize, seed: u64) -> Vec<Message> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut feed = Vec::with_capacity(count);
    let mut live: Vec<(u64, Side)> = Vec::new();
    let mut next_id = 1u64;

    for i in 0..count {
        let time = 1_700_000_000_000_000_000 + i as u64 * 1_000;
        let roll = rng.gen_range(0..100);

        let msg = if roll < 45 || live.is_empty() {
            let side = Side::from_is_bid(rng.gen_bool(0.5));
            let offset = rng.gen_range(0..20);
            let price = match side {
                Side::Bid => BASE_PRICE - offset,
                Side::Ask => BASE_PRICE + offset,
            };
            let id = next_id;
            next_id += 1;
            live.push((id, side));
            Message::add(id, price, rng.gen_range(1..=500), side, time)
        } else if roll < 70 {
            let (id, side) = live.swap_remove(rng.gen_range(0..live.len()));
            Message::cancel(id, 0, 0, side, time)
        } else if roll < 85 {
            let (id, side) = live[rng.gen_range(0..live.len())];
            let offset = rng.gen_range(0..20);
            let price = match side {
                Side::Bid => BASE_PRICE - offset,
                Side::Ask => BASE_PRICE + offset,
            };
            Message::modify(id, price, rng.gen_range(1..=500), side, time)
        } else if roll < 88 {
            // Modify for an id the book has never seen
            let side = Side::from_is_bid(rng.gen_bool(0.5));
            let id = next_id;
            next_id += 1;
            live.push((id, side));
            Message::modify(id, BASE_PRICE, rng.gen_range(1..=500), side, time)
        } else {
            let aggressor = Side::from_is_bid(rng.gen_bool(0.5));
            let price = BASE_PRICE + rng.gen_range(-20..20);
            let id = next_id;
            next_id += 1;
            Message::trade(id, price, rng.gen_range(1..=1_500), aggressor, time)
        };

        feed.push(msg);
    }

    feed
}

/// Replay a feed, failing on any fatal error. Returns the number of
/// non-fatal rejections (cancels of filled orders).
fn replay(book: &mut Orderbook, feed: &[Message]) -> usize {
    let mut rejected = 0;
    for msg in feed {
        match book.process_msg(msg) {
            Ok(_) => {}
            Err(err) => {
                assert!(!err.is_fatal(), "fatal error on {msg:?}: {err}");
                rejected += 1;
            }
        }
    }
    rejected
}

/// Run a deterministic feed and return the final state root.
fn run_deterministic_sequence(seed: u64, count: usize) -> [u8; 32] {
    let feed = generate_feed(count, seed);
    let mut book = Orderbook::with_capacity(count);
    replay(&mut book, &feed);
    book.state_root()
}

// ============================================================================
// STRESS TESTS
// ============================================================================

/// Check the full invariant audit after every single message.
#[test]
fn stress_invariants_every_message() {
    const COUNT: usize = 20_000;

    let feed = generate_feed(COUNT, 7);
    let mut book = Orderbook::with_capacity(COUNT);
    let mut trades = 0u32;

    for (i, msg) in feed.iter().enumerate() {
        match book.process_msg(msg) {
            Ok(Applied::Traded(summary)) => {
                trades += summary.orders_filled + summary.orders_reduced;
                assert_eq!(summary.traded + summary.unmatched, msg.size);
            }
            Ok(_) => {}
            Err(err) => assert!(!err.is_fatal(), "message {i}: {err}"),
        }

        if let Err(err) = book.check_invariants() {
            panic!("invariant broken after message {i} ({msg:?}): {err}");
        }
    }

    // Id index size equals the per-level counts
    let linked: u64 = [Side::Bid, Side::Ask]
        .into_iter()
        .flat_map(|side| book.levels(side))
        .map(|level| u64::from(level.order_count))
        .sum();
    assert_eq!(linked, book.get_count());

    assert!(trades > 0, "expected some resting orders to trade");
    assert_eq!(book.messages_processed(), COUNT as u64);
}

/// Throughput test: replay half a million messages.
#[test]
fn stress_throughput() {
    println!("\n=== STRESS TEST: {} Messages ===\n", STRESS_MESSAGE_COUNT);

    let feed = generate_feed(STRESS_MESSAGE_COUNT, 42);
    let mut book = Orderbook::with_capacity(STRESS_MESSAGE_COUNT);

    let start = Instant::now();
    let rejected = replay(&mut book, &feed);
    let elapsed = start.elapsed();

    let throughput = STRESS_MESSAGE_COUNT as f64 / elapsed.as_secs_f64();

    println!("  Messages:          {:>12}", STRESS_MESSAGE_COUNT);
    println!("  Rejected:          {:>12}", rejected);
    println!("  Resting orders:    {:>12}", book.get_count());
    println!("  Bid levels:        {:>12}", book.bid_levels());
    println!("  Ask levels:        {:>12}", book.ask_levels());
    println!("  Elapsed time:      {:>12.2?}", elapsed);
    println!("  Throughput:        {:>12.0} msgs/sec", throughput);
    println!("  State root:        {}", hex::encode(book.state_root()));

    assert!(
        throughput >= TARGET_THROUGHPUT,
        "Throughput {:.0} msgs/sec below target {:.0}",
        throughput,
        TARGET_THROUGHPUT
    );
    book.check_invariants().unwrap();
}

/// Verify determinism: same feed produces an identical state root.
#[test]
fn verify_determinism() {
    const TEST_COUNT: usize = 10_000;
    const SEED: u64 = 12345;

    let root1 = run_deterministic_sequence(SEED, TEST_COUNT);
    let root2 = run_deterministic_sequence(SEED, TEST_COUNT);

    println!("  Run 1 state root: {}", hex::encode(root1));
    println!("  Run 2 state root: {}", hex::encode(root2));
    assert_eq!(root1, root2, "State roots must match for determinism");

    let root3 = run_deterministic_sequence(SEED + 1, TEST_COUNT);
    assert_ne!(root1, root3, "Different seeds should produce different roots");
}

/// Analytics refreshed periodically over a live feed stay well-defined.
#[test]
fn stress_periodic_analytics() {
    let feed = generate_feed(50_000, 99);
    let mut book = Orderbook::with_capacity(50_000);

    for (i, msg) in feed.iter().enumerate() {
        let _ = book.process_msg(msg);

        if i % 1_000 == 999 {
            book.calculate_vols();
            let imbalance = book.calculate_imbalance();
            assert!((-1.0..=1.0).contains(&imbalance));

            if let Some(skew) = book.calculate_skew() {
                assert!(skew.is_finite());
            }
            book.calculate_voi();
            book.record_mid_price();
        }
    }

    assert!(!book.voi_history().is_empty());
    assert!(book.indexed_mid_price(0).is_some());
    assert!(book.vwap().is_some());
}

/// Slots freed by cancels are reused: the pool never grows past its
/// initial allocation when the resident set is bounded.
#[test]
fn stress_memory_stability() {
    const RESIDENT: u64 = 1_000;
    const ROUNDS: u64 = 50;

    let mut book = Orderbook::with_capacity(RESIDENT as usize);
    let initial = book.capacity();

    for round in 0..ROUNDS {
        let base = round * RESIDENT;
        for i in 0..RESIDENT {
            let side = Side::from_is_bid(i % 2 == 0);
            let price = BASE_PRICE + (i % 50) as i32 - 25;
            book.add_limit_order(base + i, price, 10, side, i).unwrap();
        }
        for i in 0..RESIDENT {
            book.remove_order(base + i).unwrap();
        }
        assert!(book.is_empty());
        assert_eq!(book.bid_levels() + book.ask_levels(), 0);
    }

    assert_eq!(book.capacity(), initial, "pool grew despite bounded book");
}
