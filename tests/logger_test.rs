//! End-to-end tests for the async trading logger.

use std::fs;
use std::thread;
use std::time::Duration;

use tickbook::logging::{AsyncLogger, CSV_HEADER, QUEUE_SLOTS};
use tickbook::LoggerConfig;

fn config(dir: &tempfile::TempDir) -> LoggerConfig {
    LoggerConfig {
        buffer_size: 4096,
        poll_interval_us: 50,
        ..LoggerConfig::new(dir.path().join("trading_log.csv"))
    }
}

#[test]
fn test_every_record_persisted_once() {
    const RECORDS: u64 = 20_000;

    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let mut logger = AsyncLogger::new(&config).unwrap();

    for i in 0..RECORDS {
        assert!(logger.log(1_700_000_000_000_000_000 + i, 100, 101, 0, i, 0.0));
    }
    let stats = logger.shutdown().unwrap();

    assert_eq!(stats.file_lines, RECORDS);
    assert_eq!(stats.dropped, 0);

    let text = fs::read_to_string(&config.path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len() as u64, RECORDS + 1);
    assert_eq!(format!("{}\n", lines[0]), CSV_HEADER);

    // In order, no duplicates
    for (i, line) in lines[1..].iter().enumerate() {
        let trade_count: u64 = line.split(',').nth(4).unwrap().parse().unwrap();
        assert_eq!(trade_count, i as u64);
    }
}

#[test]
fn test_file_truncated_to_written_length() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let mut logger = AsyncLogger::new(&config).unwrap();

    logger.log(0, -1, 2, -7, 3, -1.25);
    logger.shutdown().unwrap();

    let text = fs::read_to_string(&config.path).unwrap();
    assert_eq!(
        text,
        format!("{CSV_HEADER}1970-01-01 00:00:00.000,-1,2,-7,3,-1.250000\n")
    );
}

#[test]
fn test_drop_drains_queue() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);

    {
        let mut logger = AsyncLogger::new(&config).unwrap();
        for i in 0..500 {
            logger.log(i, 1, 2, 0, i, 0.5);
        }
    }

    let text = fs::read_to_string(&config.path).unwrap();
    assert_eq!(text.lines().count(), 501);
}

#[test]
fn test_forwarder_receives_line_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let (tx, rx) = crossbeam::channel::unbounded::<String>();

    let mut logger = AsyncLogger::with_forwarder(&config, tx).unwrap();
    for i in 0..100 {
        logger.log(1_000 + i, 10_025, 10_026, 2, i, 1.5);
    }
    let stats = logger.shutdown().unwrap();

    assert_eq!(stats.file_lines, 100);
    assert_eq!(stats.forwarded_lines, 100);

    let lines: Vec<String> = rx.try_iter().collect();
    assert_eq!(lines.len(), 100);
    assert_eq!(
        lines[0],
        "trading_log bid=10025i,ask=10026i,position=2i,trade_count=0i,pnl=1.500000 1000\n"
    );
    assert!(lines[99].ends_with(" 1099\n"));
}

#[test]
fn test_full_queue_drops_records() {
    let calls = 2 * QUEUE_SLOTS as u64;

    let dir = tempfile::tempdir().unwrap();
    let config = LoggerConfig {
        poll_interval_us: 2_000_000,
        ..config(&dir)
    };
    let mut logger = AsyncLogger::new(&config).unwrap();

    // Let the worker find the queue empty and go to sleep
    thread::sleep(Duration::from_millis(100));

    let mut accepted = 0;
    for i in 0..calls {
        if logger.log(i, 100, 101, 0, i, 0.0) {
            accepted += 1;
        }
    }
    assert!(accepted < calls);
    assert_eq!(logger.dropped(), calls - accepted);

    let stats = logger.shutdown().unwrap();
    assert_eq!(accepted + stats.dropped, calls);
    assert_eq!(stats.file_lines, accepted);

    let text = fs::read_to_string(&config.path).unwrap();
    assert_eq!(text.lines().count() as u64, accepted + 1);
}

#[test]
fn test_unwritable_path_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggerConfig::new(dir.path().join("missing").join("log.csv"));

    assert!(AsyncLogger::new(&config).is_err());
}
