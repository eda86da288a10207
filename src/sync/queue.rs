//! Bounded byte queue
//!
//! A fixed-capacity ring buffer with blocking producers and consumers.
//! Cursor updates happen under one mutex with a condition variable per
//! direction, so any number of readers and writers may share a queue.
//! Buffered bytes never exceed the capacity and unread data is never
//! overwritten.

use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::BufferView;
use crate::config::QueueConfig;
use crate::error::SyncError;

/// Fixed storage with a read cursor and a fill count
struct Ring {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
    closed: bool,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Copy as much of `data` as fits, returning the count
    fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        let cap = self.capacity();
        let tail = (self.head + self.len) % cap;
        let first = n.min(cap - tail);

        self.storage[tail..tail + first].copy_from_slice(&data[..first]);
        self.storage[..n - first].copy_from_slice(&data[first..n]);
        self.len += n;
        n
    }

    /// Remove up to `max` bytes from the front
    fn pop(&mut self, max: usize) -> Bytes {
        let n = max.min(self.len);
        let cap = self.capacity();
        let first = n.min(cap - self.head);

        let mut out = BytesMut::with_capacity(n);
        out.extend_from_slice(&self.storage[self.head..self.head + first]);
        out.extend_from_slice(&self.storage[..n - first]);

        self.head = (self.head + n) % cap;
        self.len -= n;
        out.freeze()
    }
}

/// Blocking fixed-capacity byte queue
pub struct Queue {
    ring: Mutex<Ring>,
    readable: Condvar,
    writable: Condvar,
    /// Times a writer found the queue full
    full_waits: AtomicUsize,
    /// Times a reader found the queue empty
    empty_waits: AtomicUsize,
}

impl Queue {
    /// Create a queue holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self, SyncError> {
        if capacity == 0 {
            return Err(SyncError::InvalidCapacity(capacity));
        }

        Ok(Self {
            ring: Mutex::new(Ring {
                storage: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                len: 0,
                closed: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            full_waits: AtomicUsize::new(0),
            empty_waits: AtomicUsize::new(0),
        })
    }

    /// Create a queue sized from configuration
    pub fn with_config(config: &QueueConfig) -> Result<Self, SyncError> {
        Self::new(config.capacity)
    }

    /// Write all of `buf`, blocking while the queue is full.
    ///
    /// Buffers larger than the capacity are delivered in pieces as readers
    /// drain the queue, so they may interleave with other writers. An empty
    /// buffer is a `WriteFailed`. If the queue is closed part way, the count
    /// written so far is returned.
    pub fn write<'a>(&self, buf: impl Into<BufferView<'a>>) -> Result<usize, SyncError> {
        let buf = buf.into();
        if buf.is_empty() {
            return Err(SyncError::WriteFailed);
        }

        let mut written = 0;
        let mut ring = self.ring.lock();

        while written < buf.len() {
            if ring.closed {
                break;
            }
            if ring.free() == 0 {
                self.full_waits.fetch_add(1, Ordering::Relaxed);
                self.writable.wait(&mut ring);
                continue;
            }

            written += ring.push(&buf[written..]);
            self.readable.notify_all();
        }

        if written == 0 {
            return Err(SyncError::Closed);
        }

        tracing::trace!("Queue write {} bytes ({} buffered)", written, ring.len);
        Ok(written)
    }

    /// Write what fits without blocking; may return 0
    pub fn try_write<'a>(&self, buf: impl Into<BufferView<'a>>) -> Result<usize, SyncError> {
        let buf = buf.into();
        let mut ring = self.ring.lock();
        if ring.closed {
            return Err(SyncError::Closed);
        }

        let n = ring.push(&buf);
        if n > 0 {
            self.readable.notify_all();
        }
        Ok(n)
    }

    /// Block until at least one byte is buffered, then take up to `maxlen`.
    ///
    /// After `close`, remaining bytes can still be drained; once empty the
    /// read fails with `Closed`.
    pub fn read(&self, maxlen: usize) -> Result<Bytes, SyncError> {
        if maxlen == 0 {
            return Err(SyncError::ReadFailed);
        }

        let mut ring = self.ring.lock();
        while ring.len == 0 {
            if ring.closed {
                return Err(SyncError::Closed);
            }
            self.empty_waits.fetch_add(1, Ordering::Relaxed);
            self.readable.wait(&mut ring);
        }

        let data = ring.pop(maxlen);
        self.writable.notify_all();

        tracing::trace!("Queue read {} bytes ({} buffered)", data.len(), ring.len);
        Ok(data)
    }

    /// Take up to `maxlen` buffered bytes without blocking; may be empty
    pub fn try_read(&self, maxlen: usize) -> Result<Bytes, SyncError> {
        let mut ring = self.ring.lock();
        if ring.len == 0 && ring.closed {
            return Err(SyncError::Closed);
        }

        let data = ring.pop(maxlen);
        if !data.is_empty() {
            self.writable.notify_all();
        }
        Ok(data)
    }

    /// Currently buffered byte count
    pub fn size(&self) -> usize {
        self.ring.lock().len
    }

    /// Get ring capacity in bytes
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Free space
    pub fn available(&self) -> usize {
        self.ring.lock().free()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Check if the ring is full
    pub fn is_full(&self) -> bool {
        self.available() == 0
    }

    /// Get fill level as a fraction of capacity
    pub fn fill_level(&self) -> f32 {
        let ring = self.ring.lock();
        ring.len as f32 / ring.capacity() as f32
    }

    /// Refuse further writes and wake every waiter. Idempotent.
    pub fn close(&self) {
        let mut ring = self.ring.lock();
        if !ring.closed {
            ring.closed = true;
            self.readable.notify_all();
            self.writable.notify_all();
            tracing::debug!("Queue closed with {} bytes buffered", ring.len);
        }
    }

    /// Check if the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let ring = self.ring.lock();
        QueueStats {
            buffered: ring.len,
            capacity: ring.capacity(),
            full_waits: self.full_waits.load(Ordering::Relaxed),
            empty_waits: self.empty_waits.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Queue")
            .field("buffered", &stats.buffered)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

/// Queue statistics
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub buffered: usize,
    pub capacity: usize,
    pub full_waits: usize,
    pub empty_waits: usize,
}
