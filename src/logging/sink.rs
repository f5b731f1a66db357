//! Destinations for forwarded text lines.
//!
//! The forward lane of the [`AsyncLogger`](super::AsyncLogger) hands every
//! rendered record to a [`LineSink`]. Lines are opaque payloads here; the
//! receiving side owns the protocol.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};

use crossbeam::channel::Sender;
use tracing::{info, warn};

/// Receiver of newline-terminated text lines.
pub trait LineSink: Send {
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: LineSink + ?Sized> LineSink for Box<S> {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        (**self).send_line(line)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl LineSink for TcpStream {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// In-process sink; fails once the receiver is gone.
impl LineSink for Sender<String> {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.send(line.to_owned())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "line receiver disconnected"))
    }
}

/// TCP line sink that connects lazily and reconnects after a failed write.
///
/// A line whose write fails is lost; the next line triggers a fresh connect.
#[derive(Debug)]
pub struct TcpLineSink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpLineSink {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, stream: None }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(self.addr)?;
            stream.set_nodelay(true)?;
            info!(addr = %self.addr, "line sink connected");
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "line sink not connected"))
    }
}

impl LineSink for TcpLineSink {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let result = self.connect().and_then(|stream| stream.write_all(line.as_bytes()));
        if let Err(err) = &result {
            warn!(addr = %self.addr, %err, "line sink write failed, dropping connection");
            self.stream = None;
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => Write::flush(stream),
            None => Ok(()),
        }
    }
}
