//! Asynchronous trading logger.
//!
//! ## Lanes
//!
//! Every sink gets its own SPSC queue and its own worker thread:
//!
//! ```text
//!             ┌─> [queue] ─> log-file    ─> MmapLog (CSV)
//! log(..) ────┼─> [queue] ─> log-console ─> stdout (CSV)
//!             └─> [queue] ─> log-forward ─> LineSink (line protocol)
//! ```
//!
//! The console and forward lanes are optional. `log` only copies a record
//! into each queue; formatting and I/O happen on the workers.
//!
//! ## Back-pressure
//!
//! A full queue drops the record for that lane and `log` reports `false`.
//! Drops are counted, never retried.
//!
//! ## Shutdown
//!
//! Clear the running flag, let each worker drain its queue, join, then
//! flush and truncate the log file.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::config::LoggerConfig;
use crate::error::LoggerError;
use crate::logging::{LineSink, LogRecord, MmapLog, CSV_HEADER};
use crate::queue::{self, Consumer, Producer};

/// Slots per lane queue
pub const QUEUE_SLOTS: usize = 1 << 16;

type RecordTx = Producer<LogRecord, QUEUE_SLOTS>;
type RecordRx = Consumer<LogRecord, QUEUE_SLOTS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    File,
    Console,
    Forward,
}

impl Sink {
    fn name(self) -> &'static str {
        match self {
            Sink::File => "file",
            Sink::Console => "console",
            Sink::Forward => "forward",
        }
    }
}

/// Lines written per sink, plus records dropped on full queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    pub file_lines: u64,
    pub console_lines: u64,
    pub forwarded_lines: u64,
    pub dropped: u64,
}

struct Lane {
    sink: Sink,
    tx: RecordTx,
    worker: Option<JoinHandle<io::Result<u64>>>,
}

/// Non-blocking trading logger backed by per-sink worker threads.
pub struct AsyncLogger {
    running: Arc<AtomicBool>,
    lanes: Vec<Lane>,
}

impl AsyncLogger {
    /// Open the log file and start the file (and optional console) workers.
    ///
    /// # Errors
    ///
    /// Fails if the log file cannot be created or mapped, or a worker thread
    /// cannot be spawned.
    pub fn new(config: &LoggerConfig) -> Result<Self, LoggerError> {
        Self::build(config, None)
    }

    /// Like [`AsyncLogger::new`], also forwarding every record to `sink`
    /// as a `trading_log` line-protocol record.
    pub fn with_forwarder<S>(config: &LoggerConfig, sink: S) -> Result<Self, LoggerError>
    where
        S: LineSink + 'static,
    {
        Self::build(config, Some(Box::new(sink)))
    }

    fn build(
        config: &LoggerConfig,
        forwarder: Option<Box<dyn LineSink>>,
    ) -> Result<Self, LoggerError> {
        let mut log = MmapLog::create(&config.path, config.buffer_size)?;
        log.append(CSV_HEADER.as_bytes())?;

        let mut logger = Self {
            running: Arc::new(AtomicBool::new(true)),
            lanes: Vec::with_capacity(3),
        };
        let backoff = config.poll_interval();

        logger.spawn(Sink::File, backoff, move |rx, running| {
            file_worker(rx, log, &running, backoff)
        })?;

        if config.console {
            print!("{CSV_HEADER}");
            logger.spawn(Sink::Console, backoff, move |rx, running| {
                console_worker(rx, &running, backoff)
            })?;
        }

        if let Some(sink) = forwarder {
            logger.spawn(Sink::Forward, backoff, move |rx, running| {
                forward_worker(rx, sink, &running, backoff)
            })?;
        }

        info!(path = %config.path.display(), lanes = logger.lanes.len(), "async logger started");
        Ok(logger)
    }

    fn spawn<F>(&mut self, sink: Sink, backoff: Duration, work: F) -> Result<(), LoggerError>
    where
        F: FnOnce(RecordRx, Arc<AtomicBool>) -> io::Result<u64> + Send + 'static,
    {
        let (tx, rx) = queue::channel();
        let running = Arc::clone(&self.running);

        let worker = thread::Builder::new()
            .name(format!("log-{}", sink.name()))
            .spawn(move || {
                info!(
                    sink = sink.name(),
                    backoff_us = backoff.as_micros() as u64,
                    "log worker started"
                );
                let result = work(rx, running);
                if let Err(err) = &result {
                    error!(sink = sink.name(), %err, "log worker failed");
                }
                result
            })
            .map_err(|source| LoggerError::WorkerSpawn {
                sink: sink.name(),
                source,
            })?;

        self.lanes.push(Lane {
            sink,
            tx,
            worker: Some(worker),
        });
        Ok(())
    }

    /// Queue one record on every lane without blocking.
    ///
    /// # Returns
    ///
    /// `false` if any lane's queue was full and dropped the record
    pub fn log(
        &mut self,
        timestamp_ns: u64,
        bid: i32,
        ask: i32,
        position: i64,
        trade_count: u64,
        pnl: f64,
    ) -> bool {
        self.log_record(LogRecord::new(
            timestamp_ns,
            bid,
            ask,
            position,
            trade_count,
            pnl,
        ))
    }

    pub fn log_record(&mut self, record: LogRecord) -> bool {
        let mut accepted = true;
        for lane in &mut self.lanes {
            accepted &= lane.tx.enqueue(record).is_ok();
        }
        accepted
    }

    /// Records dropped across all lanes so far
    pub fn dropped(&self) -> u64 {
        self.lanes.iter().map(|lane| lane.tx.dropped()).sum()
    }

    /// Stop accepting records, drain every lane and finalize the log file.
    ///
    /// # Errors
    ///
    /// The first worker I/O failure or panic, after all workers were joined.
    pub fn shutdown(mut self) -> Result<LoggerStats, LoggerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<LoggerStats, LoggerError> {
        self.running.store(false, Ordering::Release);

        let mut stats = LoggerStats {
            dropped: self.dropped(),
            ..LoggerStats::default()
        };
        let mut first_error = None;

        for lane in &mut self.lanes {
            let Some(worker) = lane.worker.take() else {
                continue;
            };
            let name = lane.sink.name();

            match worker.join() {
                Ok(Ok(lines)) => {
                    info!(sink = name, lines, "log worker stopped");
                    match lane.sink {
                        Sink::File => stats.file_lines = lines,
                        Sink::Console => stats.console_lines = lines,
                        Sink::Forward => stats.forwarded_lines = lines,
                    }
                }
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        first_error = Some(LoggerError::Io(err));
                    }
                }
                Err(_) => {
                    error!(sink = name, "log worker panicked");
                    if first_error.is_none() {
                        first_error = Some(LoggerError::WorkerPanicked { sink: name });
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

impl Drop for AsyncLogger {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!(%err, "async logger shutdown failed");
        }
    }
}

/// Poll `rx` until shutdown is requested and the queue is empty.
///
/// Sleeps `backoff` whenever the queue is empty.
fn drain<F>(
    mut rx: RecordRx,
    running: &AtomicBool,
    backoff: Duration,
    mut handle: F,
) -> io::Result<u64>
where
    F: FnMut(&LogRecord) -> io::Result<()>,
{
    let mut lines = 0;
    loop {
        match rx.dequeue() {
            Some(record) => {
                handle(&record)?;
                lines += 1;
            }
            None => {
                if !running.load(Ordering::Acquire) && rx.is_empty() {
                    break;
                }
                thread::sleep(backoff);
            }
        }
    }
    Ok(lines)
}

fn file_worker(
    rx: RecordRx,
    mut log: MmapLog,
    running: &AtomicBool,
    backoff: Duration,
) -> io::Result<u64> {
    let lines = drain(rx, running, backoff, |record| {
        log.append(record.csv().to_string().as_bytes())
    });
    let len = log.finish()?;
    info!(bytes = len, "log file finalized");
    lines
}

fn console_worker(rx: RecordRx, running: &AtomicBool, backoff: Duration) -> io::Result<u64> {
    let stdout = io::stdout();
    drain(rx, running, backoff, |record| {
        write!(stdout.lock(), "{}", record.csv())
    })
}

fn forward_worker(
    rx: RecordRx,
    mut sink: Box<dyn LineSink>,
    running: &AtomicBool,
    backoff: Duration,
) -> io::Result<u64> {
    let lines = drain(rx, running, backoff, |record| {
        sink.send_line(&record.line_protocol().to_string())
    })?;
    sink.flush()?;
    Ok(lines)
}
