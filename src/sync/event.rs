//! Bitmask event
//!
//! A 32-bit set of independent flags. Writers OR bits in; readers block
//! until any bit they wait for is set, then take and clear those bits.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use crate::buffer::BufferView;
use crate::constants::EVENT_MASK_WIDTH;
use crate::error::SyncError;

/// Event mask type
pub type Mask = u32;

#[derive(Default)]
struct EventState {
    mask: Mask,
    closed: bool,
}

/// Blocking bitmask event
#[derive(Default)]
pub struct Event {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl Event {
    /// Create an event with no bits set
    pub fn new() -> Self {
        Self::default()
    }

    /// OR `mask` into the pending bits and wake waiting readers
    pub fn write(&self, mask: Mask) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SyncError::Closed);
        }

        state.mask |= mask;
        if state.mask != 0 {
            self.cond.notify_all();
        }

        tracing::trace!("Event write {:#010x} -> {:#010x}", mask, state.mask);
        Ok(())
    }

    /// Block until any bit is set, then return and clear all of them
    pub fn read(&self) -> Result<Mask, SyncError> {
        self.read_mask(Mask::MAX)
    }

    /// Block until any bit of `mask` is set, then return and clear only
    /// the bits of `mask` that were set. Other pending bits stay put.
    pub fn read_mask(&self, mask: Mask) -> Result<Mask, SyncError> {
        if mask == 0 {
            return Err(SyncError::ReadFailed);
        }

        let mut state = self.state.lock();
        loop {
            let ready = state.mask & mask;
            if ready != 0 {
                state.mask &= !ready;
                return Ok(ready);
            }
            if state.closed {
                return Err(SyncError::Closed);
            }
            self.cond.wait(&mut state);
        }
    }

    /// Take the bits of `mask` that are set without blocking; may be 0
    pub fn try_read_mask(&self, mask: Mask) -> Mask {
        let mut state = self.state.lock();
        let ready = state.mask & mask;
        state.mask &= !ready;
        ready
    }

    /// Peek at the pending bits without clearing them
    pub fn pending(&self) -> Mask {
        self.state.lock().mask
    }

    /// Width of the mask in bytes
    pub fn size(&self) -> usize {
        EVENT_MASK_WIDTH
    }

    /// Write a little-endian encoded mask; any width but 4 is a protocol error
    pub fn write_encoded<'a>(&self, buf: impl Into<BufferView<'a>>) -> Result<(), SyncError> {
        let mask = decode_mask(buf.into().as_slice())?;
        self.write(mask)
    }

    /// Read a mask and return it little-endian encoded in `width` bytes
    pub fn read_encoded(&self, width: usize) -> Result<Bytes, SyncError> {
        if width != EVENT_MASK_WIDTH {
            return Err(SyncError::ProtocolError {
                expected: EVENT_MASK_WIDTH,
                actual: width,
            });
        }
        let mask = self.read()?;
        Ok(Bytes::copy_from_slice(&mask.to_le_bytes()))
    }

    /// Refuse further writes and wake blocked readers. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            self.cond.notify_all();
            tracing::debug!("Event closed with pending mask {:#010x}", state.mask);
        }
    }

    /// Check if the event has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("pending", &format_args!("{:#010x}", self.pending()))
            .finish()
    }
}

fn decode_mask(bytes: &[u8]) -> Result<Mask, SyncError> {
    let raw: [u8; EVENT_MASK_WIDTH] = bytes.try_into().map_err(|_| SyncError::ProtocolError {
        expected: EVENT_MASK_WIDTH,
        actual: bytes.len(),
    })?;
    Ok(Mask::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_write_then_read_clears() {
        let event = Event::new();
        assert_eq!(event.pending(), 0);

        event.write(0x5).unwrap();
        assert_eq!(event.read().unwrap(), 0x5);
        assert_eq!(event.pending(), 0);
    }

    #[test]
    fn test_writes_merge() {
        let event = Event::new();
        event.write(0b0011).unwrap();
        event.write(0b1000).unwrap();
        assert_eq!(event.read().unwrap(), 0b1011);
    }

    #[test]
    fn test_read_mask_leaves_other_bits() {
        let event = Event::new();
        event.write(0b1110).unwrap();
        assert_eq!(event.read_mask(0b0110).unwrap(), 0b0110);
        assert_eq!(event.pending(), 0b1000);
        assert_eq!(event.try_read_mask(0b0001), 0);
    }

    #[test]
    fn test_reader_wakes_on_first_nonzero_write() {
        let event = Arc::new(Event::new());
        let reader = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.read())
        };

        thread::sleep(Duration::from_millis(30));
        event.write(0).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!reader.is_finished());

        event.write(0x80).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), 0x80);
    }

    #[test]
    fn test_size_and_encoding_width() {
        let event = Event::new();
        assert_eq!(event.size(), 4);

        assert_eq!(
            event.write_encoded(&[1u8, 0]).unwrap_err(),
            SyncError::ProtocolError { expected: 4, actual: 2 }
        );
        assert_eq!(
            event.read_encoded(8).unwrap_err(),
            SyncError::ProtocolError { expected: 4, actual: 8 }
        );

        event.write_encoded(&0x0102_0304u32.to_le_bytes()).unwrap();
        assert_eq!(&event.read_encoded(4).unwrap()[..], &[4, 3, 2, 1]);
    }

    #[test]
    fn test_close_wakes_reader() {
        let event = Arc::new(Event::new());
        let reader = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.read())
        };

        thread::sleep(Duration::from_millis(30));
        event.close();
        assert_eq!(reader.join().unwrap().unwrap_err(), SyncError::Closed);
        assert_eq!(event.write(1).unwrap_err(), SyncError::Closed);
    }
}
