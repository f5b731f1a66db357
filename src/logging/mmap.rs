//! Append-only memory-mapped log file.
//!
//! The file is pre-sized to the mapping length and grown by doubling when an
//! append would run past the end. On close the file is truncated back to the
//! bytes actually written, so readers never see the zero-filled tail.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, error};

/// Smallest mapping ever created
const MIN_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct MmapLog {
    file: File,
    map: Option<MmapMut>,
    capacity: usize,
    offset: usize,
}

impl MmapLog {
    /// Create (or truncate) `path` and map `capacity` bytes of it.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> io::Result<Self> {
        let capacity = capacity.max(MIN_CAPACITY);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;
        let map = Self::map(&file, capacity)?;

        Ok(Self {
            file,
            map: Some(map),
            capacity,
            offset: 0,
        })
    }

    fn map(file: &File, len: usize) -> io::Result<MmapMut> {
        // Safety: the file was created and truncated by this log, which is
        // its only writer until `finish`.
        unsafe { MmapOptions::new().len(len).map_mut(file) }
    }

    /// Copy `bytes` to the end of the log, growing the mapping if needed.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let end = self.offset + bytes.len();
        if end > self.capacity {
            self.grow(end)?;
        }

        let map = self.map.as_mut().ok_or_else(closed)?;
        map[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    fn grow(&mut self, required: usize) -> io::Result<()> {
        let mut capacity = self.capacity;
        while capacity < required {
            capacity *= 2;
        }

        let old = self.map.take().ok_or_else(closed)?;
        old.flush()?;
        drop(old);

        self.file.set_len(capacity as u64)?;
        self.map = Some(Self::map(&self.file, capacity)?);
        debug!(from = self.capacity, to = capacity, "log mapping grown");
        self.capacity = capacity;
        Ok(())
    }

    /// Bytes written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Current mapping length
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Flush, unmap and truncate the file to its written length.
    ///
    /// # Returns
    ///
    /// Final file length in bytes
    pub fn finish(mut self) -> io::Result<u64> {
        self.close()
    }

    fn close(&mut self) -> io::Result<u64> {
        if let Some(map) = self.map.take() {
            map.flush()?;
        }
        let len = self.offset as u64;
        self.file.set_len(len)?;
        self.file.sync_all()?;
        Ok(len)
    }
}

impl Drop for MmapLog {
    fn drop(&mut self) {
        if self.map.is_some() {
            if let Err(err) = self.close() {
                error!(%err, "failed to finalize log file");
            }
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "log file already closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_append_and_finish_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut log = MmapLog::create(&path, 0).unwrap();
        assert_eq!(log.capacity(), MIN_CAPACITY);
        log.append(b"hello\n").unwrap();
        log.append(b"world\n").unwrap();
        assert_eq!(log.len(), 12);

        assert_eq!(log.finish().unwrap(), 12);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_grows_past_initial_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut log = MmapLog::create(&path, MIN_CAPACITY).unwrap();
        let line = [b'x'; 1000];
        for _ in 0..10 {
            log.append(&line).unwrap();
        }
        assert!(log.capacity() >= 10_000);
        drop(log);

        assert_eq!(fs::metadata(&path).unwrap().len(), 10_000);
    }
}
